//! Child process launch and output drain.
//!
//! [`run`] is the body of the per-run task. It spawns the script as the
//! leader of a new process group, publishes the pid into the record, feeds
//! optional input on stdin, then forwards merged stdout/stderr to the run's
//! queue line by line. Every outcome, including launch and I/O failures,
//! ends up as ordinary output followed by the end-of-stream marker.

use std::io;
use std::os::fd::OwnedFd;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::pipe;
use tokio::process::{Child, ChildStdin, Command};

use crate::runs::cancel;
use crate::runs::queue::LineSender;
use crate::runs::record::RunRecord;

/// Advisory line queued before an elevated run is spawned.
pub const ELEVATION_NOTICE: &str =
    "[sudo mode enabled: requires passwordless sudo for this command]\n";

/// How scripts are invoked.
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    /// Interpreter the script path is passed to.
    pub interpreter: PathBuf,
    /// Privilege-elevation wrapper program.
    pub elevation_program: String,
    /// Arguments placed between the wrapper and the interpreter. `-n` makes
    /// sudo fail instead of prompting for a password.
    pub elevation_args: Vec<String>,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("/bin/bash"),
            elevation_program: "sudo".to_string(),
            elevation_args: vec!["-n".to_string()],
        }
    }
}

/// What to execute for one run.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub script_path: PathBuf,
    /// Text written to the child's stdin. Empty input is treated as none.
    pub input: Option<String>,
    /// Run through the elevation wrapper.
    pub elevate: bool,
}

/// Failures while starting or talking to the child process.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("failed to create output pipe: {0}")]
    Pipe(#[source] io::Error),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write input: {0}")]
    Stdin(#[source] io::Error),

    #[error("failed to read output: {0}")]
    Read(#[source] io::Error),

    #[error("failed to wait for process: {0}")]
    Wait(#[source] io::Error),
}

/// Build the command line for `request`, without any stdio wiring.
pub fn build_command(settings: &LaunchSettings, request: &LaunchRequest) -> Command {
    let mut cmd = if request.elevate {
        let mut cmd = Command::new(&settings.elevation_program);
        cmd.args(&settings.elevation_args).arg(&settings.interpreter);
        cmd
    } else {
        Command::new(&settings.interpreter)
    };
    cmd.arg(&request.script_path);
    cmd
}

/// Line reporting how the child exited.
pub fn exit_line(code: i32) -> String {
    format!("\n[Process exited with code {code}]\n")
}

/// Line reporting a launch or I/O failure.
pub fn error_line(err: &LaunchError) -> String {
    format!("\n[Error: {err}]\n")
}

/// Exit code, or the negated signal number when the child was killed.
pub fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| status.signal().map(|sig| -sig).unwrap_or(-1))
}

/// Execute one run to completion.
///
/// Sole writer of `sender`; marks the record done after the end-of-stream
/// marker has been queued.
pub async fn run(
    record: Arc<RunRecord>,
    sender: LineSender,
    request: LaunchRequest,
    settings: &LaunchSettings,
) {
    if request.elevate {
        sender.push(ELEVATION_NOTICE);
    }

    match execute(&record, &sender, &request, settings).await {
        Ok(status) => {
            let code = exit_code(status);
            tracing::info!(run_id = %record.run_id(), exit_code = code, "Run finished");
            sender.push(exit_line(code));
        }
        Err(e) => {
            tracing::warn!(run_id = %record.run_id(), error = %e, "Run failed");
            sender.push(error_line(&e));
        }
    }

    sender.finish();
    record.mark_done();
}

async fn execute(
    record: &RunRecord,
    sender: &LineSender,
    request: &LaunchRequest,
    settings: &LaunchSettings,
) -> Result<ExitStatus, LaunchError> {
    // stdout and stderr share one pipe so lines keep the order the child
    // wrote them in.
    let (reader, writer) = io::pipe().map_err(LaunchError::Pipe)?;
    let stderr_writer = writer.try_clone().map_err(LaunchError::Pipe)?;

    let mut cmd = build_command(settings, request);
    cmd.stdin(Stdio::piped())
        .stdout(writer)
        .stderr(stderr_writer)
        .process_group(0);

    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    let spawned = cmd.spawn();
    // The command still owns our copies of the write end; EOF only arrives
    // once they are closed.
    drop(cmd);
    let mut child = spawned.map_err(|source| LaunchError::Spawn { program, source })?;

    if let Some(pid) = child.id() {
        record.mark_running(pid);
        tracing::debug!(run_id = %record.run_id(), pid, "Child process spawned");
    }

    // Input is fed while output drains so a chatty child never blocks on a
    // full pipe before it gets to read stdin.
    let io = match pipe::Receiver::from_owned_fd(OwnedFd::from(reader)) {
        Ok(output) => {
            let (fed, drained) = tokio::join!(
                feed_stdin(child.stdin.take(), request.input.as_deref()),
                drain(output, sender),
            );
            fed.and(drained)
        }
        Err(e) => Err(LaunchError::Read(e)),
    };

    settle(record, child, io).await
}

/// Reap `child` and record its exit, whatever happened to its stdio.
///
/// After an I/O failure the process group is killed first so the wait
/// cannot hang. The record leaves `Running` on every path, so its pid is
/// not handed out for signalling once the child is gone.
async fn settle(
    record: &RunRecord,
    mut child: Child,
    io: Result<(), LaunchError>,
) -> Result<ExitStatus, LaunchError> {
    if io.is_err() {
        if let Some(pid) = child.id() {
            if let Err(e) = cancel::signal_group(pid, libc::SIGKILL) {
                tracing::debug!(
                    run_id = %record.run_id(),
                    pid,
                    error = %e,
                    "Kill after I/O failure not delivered"
                );
            }
        }
    }

    let waited = child.wait().await;
    match &waited {
        Ok(status) => record.mark_exited(exit_code(*status)),
        // Outcome unknown; never signal this pid again.
        Err(_) => record.mark_exited(-1),
    }

    io?;
    waited.map_err(LaunchError::Wait)
}

/// Write `input` (newline-terminated) to the child, then close stdin.
///
/// Stdin is closed even without input; some scripts block until it is. A
/// child that already closed its end is not an error.
async fn feed_stdin(stdin: Option<ChildStdin>, input: Option<&str>) -> Result<(), LaunchError> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };

    if let Some(text) = input.filter(|t| !t.is_empty()) {
        let mut payload = text.to_string();
        if !payload.ends_with('\n') {
            payload.push('\n');
        }
        let written = async {
            stdin.write_all(payload.as_bytes()).await?;
            stdin.flush().await
        }
        .await;
        match written {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                tracing::debug!("Child closed stdin before reading input");
            }
            Err(e) => return Err(LaunchError::Stdin(e)),
        }
    }

    drop(stdin);
    Ok(())
}

/// Forward every line from `output` to the queue until EOF.
///
/// Lines keep their trailing newline; invalid UTF-8 is replaced.
async fn drain(output: pipe::Receiver, sender: &LineSender) -> Result<(), LaunchError> {
    let mut reader = BufReader::new(output);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(LaunchError::Read)?;
        if n == 0 {
            return Ok(());
        }
        sender.push(String::from_utf8_lossy(&buf).into_owned());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;
    use std::time::Duration;

    use super::*;
    use crate::runs::queue::Received;
    use crate::runs::record::ProcessState;

    fn request(path: &str, elevate: bool) -> LaunchRequest {
        LaunchRequest {
            script_path: PathBuf::from(path),
            input: None,
            elevate,
        }
    }

    fn args(cmd: &Command) -> Vec<&OsStr> {
        cmd.as_std().get_args().collect()
    }

    #[test]
    fn plain_command_uses_interpreter() {
        let cmd = build_command(&LaunchSettings::default(), &request("/tmp/s/script", false));
        assert_eq!(cmd.as_std().get_program(), "/bin/bash");
        assert_eq!(args(&cmd), ["/tmp/s/script"]);
    }

    #[test]
    fn elevated_command_is_non_interactive_sudo() {
        let cmd = build_command(&LaunchSettings::default(), &request("/tmp/s/script", true));
        assert_eq!(cmd.as_std().get_program(), "sudo");
        assert_eq!(args(&cmd), ["-n", "/bin/bash", "/tmp/s/script"]);
    }

    #[test]
    fn formats_exit_and_error_lines() {
        assert_eq!(exit_line(0), "\n[Process exited with code 0]\n");
        let err = LaunchError::Stdin(io::Error::other("boom"));
        assert_eq!(error_line(&err), "\n[Error: failed to write input: boom]\n");
    }

    #[tokio::test]
    async fn missing_interpreter_becomes_error_line() {
        let (record, sender) = RunRecord::new("r".into(), "s".into());
        let record = Arc::new(record);
        let settings = LaunchSettings {
            interpreter: PathBuf::from("/nonexistent/interpreter"),
            ..LaunchSettings::default()
        };

        run(Arc::clone(&record), sender, request("/tmp/x", false), &settings).await;

        let wait = Duration::from_secs(1);
        match record.queue().recv_timeout(wait).await {
            Received::Line(line) => {
                assert!(line.starts_with("\n[Error: failed to start /nonexistent/interpreter"));
            }
            other => panic!("expected error line, got {other:?}"),
        }
        assert_eq!(record.queue().recv_timeout(wait).await, Received::End);
        assert!(record.is_done());
        assert_eq!(record.pid(), None);
    }

    #[tokio::test]
    async fn elevation_notice_precedes_output() {
        let (record, sender) = RunRecord::new("r".into(), "s".into());
        let record = Arc::new(record);
        let settings = LaunchSettings {
            elevation_program: "/nonexistent/sudo".to_string(),
            ..LaunchSettings::default()
        };

        run(Arc::clone(&record), sender, request("/tmp/x", true), &settings).await;

        let wait = Duration::from_secs(1);
        assert_eq!(
            record.queue().recv_timeout(wait).await,
            Received::Line(ELEVATION_NOTICE.to_string())
        );
        assert!(matches!(
            record.queue().recv_timeout(wait).await,
            Received::Line(l) if l.contains("[Error:")
        ));
        assert_eq!(record.queue().recv_timeout(wait).await, Received::End);
    }

    #[tokio::test]
    async fn io_failure_kills_and_reaps_child() {
        let (record, _sender) = RunRecord::new("r".into(), "s".into());
        let mut cmd = Command::new("sleep");
        cmd.arg("30").process_group(0);
        let child = cmd.spawn().expect("spawn sleep");
        let pid = child.id().expect("pid");
        record.mark_running(pid);

        let err = settle(&record, child, Err(LaunchError::Read(io::Error::other("boom"))))
            .await
            .unwrap_err();

        assert!(matches!(err, LaunchError::Read(_)));
        assert_eq!(
            record.process(),
            ProcessState::Exited { pid, exit_code: -libc::SIGKILL }
        );
        assert_eq!(
            cancel::terminate(&record),
            cancel::StopOutcome::AlreadyExited
        );
    }

    #[tokio::test]
    async fn clean_io_reaps_with_real_exit_code() {
        let (record, _sender) = RunRecord::new("r".into(), "s".into());
        let mut cmd = Command::new("/bin/bash");
        cmd.args(["-c", "exit 4"]);
        let child = cmd.spawn().expect("spawn bash");
        let pid = child.id().expect("pid");
        record.mark_running(pid);

        let status = settle(&record, child, Ok(())).await.expect("settle");

        assert_eq!(exit_code(status), 4);
        assert_eq!(record.process(), ProcessState::Exited { pid, exit_code: 4 });
    }
}
