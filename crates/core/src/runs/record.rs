//! In-memory state for a single execution.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;

use crate::runs::queue::{line_queue, LineQueue, LineSender};
use crate::types::{RunId, ScriptId, Timestamp};

/// Lifecycle of the child process behind a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// The launcher has not spawned the child yet (or spawning failed).
    NotStarted,
    /// The child is alive; `pid` is also its process group id.
    Running { pid: u32 },
    /// The child has been reaped. Its pid must not be signalled any more.
    Exited { pid: u32, exit_code: i32 },
}

/// One execution attempt of a stored script.
///
/// Created before the child exists and shared behind `Arc` between the
/// registry, the launcher task, stream publishers and stop requests. Only
/// the launcher mutates the process state and the `done` flag.
#[derive(Debug)]
pub struct RunRecord {
    run_id: RunId,
    script_id: ScriptId,
    queue: LineQueue,
    process: Mutex<ProcessState>,
    done: AtomicBool,
    started_at: Timestamp,
    finished_at: Mutex<Option<Timestamp>>,
}

/// Point-in-time view of a record, suitable for JSON responses.
#[derive(Debug, Clone, Serialize)]
pub struct RunSnapshot {
    pub run_id: RunId,
    pub script_id: ScriptId,
    pub pid: Option<u32>,
    pub done: bool,
    pub exit_code: Option<i32>,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

impl RunRecord {
    /// Build a record together with the producer half of its queue.
    ///
    /// The returned [`LineSender`] must be handed to exactly one launcher.
    pub fn new(run_id: RunId, script_id: ScriptId) -> (Self, LineSender) {
        let (sender, queue) = line_queue();
        let record = Self {
            run_id,
            script_id,
            queue,
            process: Mutex::new(ProcessState::NotStarted),
            done: AtomicBool::new(false),
            started_at: Utc::now(),
            finished_at: Mutex::new(None),
        };
        (record, sender)
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn script_id(&self) -> &str {
        &self.script_id
    }

    pub fn queue(&self) -> &LineQueue {
        &self.queue
    }

    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<Timestamp> {
        *lock(&self.finished_at)
    }

    /// Current process state.
    pub fn process(&self) -> ProcessState {
        *lock(&self.process)
    }

    /// Pid of the spawned child, if it was ever started.
    pub fn pid(&self) -> Option<u32> {
        match self.process() {
            ProcessState::NotStarted => None,
            ProcessState::Running { pid } | ProcessState::Exited { pid, .. } => Some(pid),
        }
    }

    /// Whether the child has exited and every output line has been enqueued.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Run `f` with the live pid while holding the process-state lock.
    ///
    /// Returns `None` without calling `f` when the child is not running.
    /// Holding the lock keeps the launcher from recording the exit while a
    /// signal is being sent. The launcher reaps before it takes this lock, so
    /// a signal can still land on a just-reaped pid in that short window.
    pub fn with_running_pid<T>(&self, f: impl FnOnce(u32) -> T) -> Option<T> {
        let state = lock(&self.process);
        match *state {
            ProcessState::Running { pid } => Some(f(pid)),
            _ => None,
        }
    }

    pub(crate) fn mark_running(&self, pid: u32) {
        *lock(&self.process) = ProcessState::Running { pid };
    }

    pub(crate) fn mark_exited(&self, exit_code: i32) {
        let mut state = lock(&self.process);
        if let ProcessState::Running { pid } = *state {
            *state = ProcessState::Exited { pid, exit_code };
        }
    }

    pub(crate) fn mark_done(&self) {
        *lock(&self.finished_at) = Some(Utc::now());
        self.done.store(true, Ordering::Release);
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let (pid, exit_code) = match self.process() {
            ProcessState::NotStarted => (None, None),
            ProcessState::Running { pid } => (Some(pid), None),
            ProcessState::Exited { pid, exit_code } => (Some(pid), Some(exit_code)),
        };
        RunSnapshot {
            run_id: self.run_id.clone(),
            script_id: self.script_id.clone(),
            pid,
            done: self.is_done(),
            exit_code,
            started_at: self.started_at,
            finished_at: self.finished_at(),
        }
    }
}

/// The guarded values are plain data, so a poisoned lock is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RunRecord {
        RunRecord::new("run-1".into(), "script-1".into()).0
    }

    #[test]
    fn new_record_has_no_pid_and_is_not_done() {
        let record = record();
        assert_eq!(record.pid(), None);
        assert!(!record.is_done());
        assert_eq!(record.process(), ProcessState::NotStarted);
        assert!(record.finished_at().is_none());
    }

    #[test]
    fn exit_keeps_pid_but_stops_signalling() {
        let record = record();
        record.mark_running(4242);
        assert_eq!(record.with_running_pid(|pid| pid), Some(4242));

        record.mark_exited(0);
        assert_eq!(record.pid(), Some(4242));
        assert_eq!(record.with_running_pid(|pid| pid), None);
    }

    #[test]
    fn exit_without_spawn_is_ignored() {
        let record = record();
        record.mark_exited(1);
        assert_eq!(record.process(), ProcessState::NotStarted);
    }

    #[test]
    fn snapshot_reflects_completion() {
        let record = record();
        record.mark_running(10);
        record.mark_exited(3);
        record.mark_done();

        let snap = record.snapshot();
        assert_eq!(snap.run_id, "run-1");
        assert_eq!(snap.script_id, "script-1");
        assert_eq!(snap.pid, Some(10));
        assert_eq!(snap.exit_code, Some(3));
        assert!(snap.done);
        assert!(snap.finished_at.is_some());
    }
}
