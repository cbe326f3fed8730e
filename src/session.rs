/// Run one child command under a watchdog: spawn it with inherited stdio,
/// report on it while it runs, return its exit code and duration.
use crate::policy::IntervalPolicy;
use crate::report::Reporter;
use crate::state::ProcessProbe;
use crate::watchdog::Watchdog;
use std::sync::Arc;
use std::time::Instant;
use tokio::process::Command;

/// Result of a completed command.
#[derive(Debug)]
pub struct SessionResult {
    /// Process exit code (None if killed by signal).
    pub exit_code: Option<i32>,
    /// Wall-clock duration of the command.
    pub duration: std::time::Duration,
    /// Child PID (for logging/diagnostics).
    pub pid: u32,
}

/// Errors that can occur while running a watched command.
#[derive(Debug)]
pub enum SessionError {
    /// No program was given.
    EmptyCommand,
    /// Failed to spawn the child process.
    Spawn {
        program: String,
        source: std::io::Error,
    },
    /// Failed while waiting for the child.
    Io { source: std::io::Error },
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::EmptyCommand => write!(f, "no command to run"),
            SessionError::Spawn { program, source } => {
                write!(f, "failed to spawn {}: {}", program, source)
            }
            SessionError::Io { source } => {
                write!(f, "I/O error while waiting for command: {}", source)
            }
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::EmptyCommand => None,
            SessionError::Spawn { source, .. } => Some(source),
            SessionError::Io { source } => Some(source),
        }
    }
}

/// Label for a command when none is given: the command line itself.
pub fn default_label(command: &[String]) -> String {
    command.join(" ")
}

/// Spawn `command`, watch it until it exits, and return the result.
///
/// The watchdog queries the child's process state on each wake-up and is
/// fully stopped before this returns, so no status line follows the exit.
pub async fn run_watched(
    command: &[String],
    label: &str,
    policy: IntervalPolicy,
    reporter: Arc<dyn Reporter>,
) -> Result<SessionResult, SessionError> {
    let (program, args) = command.split_first().ok_or(SessionError::EmptyCommand)?;

    tracing::info!(program = %program, args = ?args, label, "spawning watched command");

    let start = Instant::now();
    let mut child = Command::new(program)
        .args(args)
        .spawn()
        .map_err(|e| SessionError::Spawn {
            program: program.clone(),
            source: e,
        })?;

    let pid = child.id().unwrap_or(0);
    let mut watchdog =
        Watchdog::new(policy, Arc::new(ProcessProbe::new(pid))).with_reporter(reporter);
    watchdog.start(label);
    tracing::debug!(pid, "command started");

    let status = child.wait().await;

    // Joining is quick (the stop signal wakes the loop) but blocking.
    if tokio::task::spawn_blocking(move || watchdog.stop_and_join())
        .await
        .is_err()
    {
        tracing::debug!("watchdog join task failed");
    }

    let status = status.map_err(|e| SessionError::Io { source: e })?;
    let duration = start.elapsed();
    let exit_code = status.code();
    tracing::info!(
        exit_code = ?exit_code,
        duration_ms = duration.as_millis() as u64,
        "watched command completed"
    );

    Ok(SessionResult {
        exit_code,
        duration,
        pid,
    })
}
