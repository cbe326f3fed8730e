/// Execution state of the observed unit, and the probes that answer it.
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Runtime status of the observed unit's thread of control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// Created but not yet executing.
    NotStarted,
    /// Actively executing.
    Running,
    /// Blocked on a contended resource.
    Blocked,
    /// Suspended until a condition or timeout.
    Waiting,
    /// Finished executing.
    Terminated,
    /// Anything the probe could not classify.
    Unknown,
}

impl ExecutionState {
    /// Stable code used by [`UnitProbe`].
    pub fn code(self) -> u8 {
        match self {
            ExecutionState::NotStarted => 0,
            ExecutionState::Running => 1,
            ExecutionState::Blocked => 2,
            ExecutionState::Waiting => 3,
            ExecutionState::Terminated => 4,
            ExecutionState::Unknown => u8::MAX,
        }
    }

    /// Inverse of [`ExecutionState::code`]; unrecognized codes are `Unknown`.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => ExecutionState::NotStarted,
            1 => ExecutionState::Running,
            2 => ExecutionState::Blocked,
            3 => ExecutionState::Waiting,
            4 => ExecutionState::Terminated,
            _ => ExecutionState::Unknown,
        }
    }

    /// Human-readable phrase for a status line.
    pub fn phrase(self, label: &str) -> String {
        match self {
            ExecutionState::NotStarted => format!("We just started {label}"),
            ExecutionState::Running => format!("We're still running {label}"),
            ExecutionState::Blocked => format!("We're blocked at {label}"),
            ExecutionState::Waiting => format!("We're waiting at {label}"),
            ExecutionState::Terminated => format!("The test {label} is terminated"),
            ExecutionState::Unknown => format!("We're lost at {label}"),
        }
    }
}

/// Answers "what is the observed unit doing right now?".
///
/// Queried once per watchdog wake-up, from the watchdog's own thread.
pub trait StateSource: Send + Sync {
    fn state(&self) -> ExecutionState;
}

/// Shared, driver-updated state of an in-process unit.
///
/// Cloning yields another handle to the same state. The lifecycle driver
/// marks the unit running and terminated; the unit itself may report
/// `Blocked` or `Waiting` around long waits.
#[derive(Debug, Clone)]
pub struct UnitProbe {
    code: Arc<AtomicU8>,
}

impl UnitProbe {
    pub fn new() -> Self {
        Self {
            code: Arc::new(AtomicU8::new(ExecutionState::NotStarted.code())),
        }
    }

    pub fn set(&self, state: ExecutionState) {
        self.code.store(state.code(), Ordering::Release);
    }

    /// Store a raw code. Codes outside the known set read back as `Unknown`.
    pub fn set_code(&self, code: u8) {
        self.code.store(code, Ordering::Release);
    }
}

impl Default for UnitProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl StateSource for UnitProbe {
    fn state(&self) -> ExecutionState {
        ExecutionState::from_code(self.code.load(Ordering::Acquire))
    }
}

/// Reads the state of a child process from `/proc/{pid}/stat`.
///
/// Off Linux, or once the process is reaped, the state is `Unknown`.
#[derive(Debug, Clone)]
pub struct ProcessProbe {
    stat_path: PathBuf,
}

impl ProcessProbe {
    pub fn new(pid: u32) -> Self {
        Self {
            stat_path: PathBuf::from(format!("/proc/{pid}/stat")),
        }
    }

    #[cfg(test)]
    fn at(stat_path: PathBuf) -> Self {
        Self { stat_path }
    }
}

impl StateSource for ProcessProbe {
    fn state(&self) -> ExecutionState {
        match std::fs::read_to_string(&self.stat_path) {
            Ok(stat) => state_from_stat(&stat),
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    path = %self.stat_path.display(),
                    "failed to read process stat"
                );
                ExecutionState::Unknown
            }
        }
    }
}

/// Map the state letter of a `/proc/{pid}/stat` line.
///
/// The command name sits in parentheses and may itself contain spaces or
/// parentheses, so the letter is the first field after the last `)`.
fn state_from_stat(stat: &str) -> ExecutionState {
    let letter = stat
        .rfind(')')
        .and_then(|idx| stat[idx + 1..].split_whitespace().next())
        .and_then(|field| field.chars().next());
    match letter {
        Some('R') => ExecutionState::Running,
        Some('S') => ExecutionState::Waiting,
        Some('D') => ExecutionState::Blocked,
        Some('Z') | Some('X') | Some('x') => ExecutionState::Terminated,
        _ => ExecutionState::Unknown,
    }
}
