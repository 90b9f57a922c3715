//! Out-of-band termination of a run's process tree.
//!
//! Children are spawned as process group leaders, so signalling the group
//! reaches everything the script started as well.

use std::io;

use serde::Serialize;

use crate::runs::record::{ProcessState, RunRecord};

/// What a stop request actually did. Every variant is a success for callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StopOutcome {
    /// The signal was delivered to the group (or the leader).
    Signalled { pid: u32 },
    /// The child has not been spawned yet; nothing to signal.
    NotStarted,
    /// The child was already reaped.
    AlreadyExited,
    /// The process vanished or we lacked permission; swallowed.
    Undeliverable { pid: u32 },
}

/// Ask the run's process group to terminate (SIGTERM).
pub fn terminate(record: &RunRecord) -> StopOutcome {
    deliver(record, libc::SIGTERM)
}

/// Forcefully kill the run's process group (SIGKILL).
pub fn kill(record: &RunRecord) -> StopOutcome {
    deliver(record, libc::SIGKILL)
}

fn deliver(record: &RunRecord, signal: libc::c_int) -> StopOutcome {
    let delivered = record.with_running_pid(|pid| match signal_group(pid, signal) {
        Ok(()) => StopOutcome::Signalled { pid },
        Err(e) => {
            tracing::debug!(run_id = %record.run_id(), pid, signal, error = %e, "Signal not delivered");
            StopOutcome::Undeliverable { pid }
        }
    });

    delivered.unwrap_or_else(|| match record.process() {
        ProcessState::NotStarted => StopOutcome::NotStarted,
        _ => StopOutcome::AlreadyExited,
    })
}

/// Send `signal` to the process group led by `pid`.
///
/// Falls back to the single process when the group cannot be signalled.
pub fn signal_group(pid: u32, signal: libc::c_int) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .ok()
        .filter(|p| *p > 1)
        .ok_or_else(|| io::Error::from(io::ErrorKind::InvalidInput))?;

    // SAFETY: killpg/kill take plain integers and report failure via errno.
    if unsafe { libc::killpg(pid, signal) } == 0 {
        return Ok(());
    }
    let group_err = io::Error::last_os_error();
    tracing::debug!(pid, error = %group_err, "Process group signal failed, signalling leader");

    // SAFETY: as above.
    if unsafe { libc::kill(pid, signal) } == 0 {
        return Ok(());
    }
    Err(io::Error::last_os_error())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
