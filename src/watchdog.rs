/// Liveness watchdog for a single observed unit.
///
/// Runs alongside the unit on its own thread, sleeping for an escalating
/// interval and emitting one status line per wake-up until stopped. It never
/// touches the unit itself.
use crate::policy::{IntervalPolicy, Reporting};
use crate::report::{Reporter, Status, TracingReporter};
use crate::state::{ExecutionState, StateSource};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Label used when `start` gets a blank one.
const UNNAMED: &str = "unnamed";

enum Task {
    /// Constructed, not yet started.
    Idle,
    Running {
        shutdown: watch::Sender<bool>,
        thread: JoinHandle<()>,
    },
    /// Stopped, or failed to start. Terminal.
    Stopped,
}

/// Owns at most one background task for one observed unit.
///
/// Single-use: once started and stopped it stays stopped. Dropping a running
/// watchdog stops it.
pub struct Watchdog {
    policy: IntervalPolicy,
    source: Arc<dyn StateSource>,
    reporter: Arc<dyn Reporter>,
    observed: Option<(String, Instant)>,
    task: Task,
}

impl Watchdog {
    /// Watchdog that reports through `tracing` at WARN level.
    pub fn new(policy: IntervalPolicy, source: Arc<dyn StateSource>) -> Self {
        Self {
            policy,
            source,
            reporter: Arc::new(TracingReporter),
            observed: None,
            task: Task::Idle,
        }
    }

    /// Replace the sink for status lines.
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Begin observing. Returns as soon as the background thread is spawned.
    ///
    /// Ignored if this watchdog was already started. Setup failures are
    /// logged and leave the watchdog silent; they never reach the caller.
    pub fn start(&mut self, label: &str) {
        if !matches!(self.task, Task::Idle) {
            tracing::debug!(label, "watchdog already used, ignoring start");
            return;
        }

        let label = if label.trim().is_empty() {
            UNNAMED.to_string()
        } else {
            label.to_string()
        };
        let started = Instant::now();
        self.observed = Some((label.clone(), started));

        let (shutdown, shutdown_rx) = watch::channel(false);
        let escalation = Escalation {
            label: label.clone(),
            started,
            policy: self.policy,
            source: Arc::clone(&self.source),
            reporter: Arc::clone(&self.reporter),
        };

        let spawned = std::thread::Builder::new()
            .name("maybe-slow".to_string())
            .spawn(move || escalation.run_on_own_runtime(shutdown_rx));

        match spawned {
            Ok(thread) => {
                tracing::debug!(
                    label = %label,
                    base_ms = self.policy.base.as_millis() as u64,
                    cap_ms = self.policy.cap.as_millis() as u64,
                    "watchdog started"
                );
                self.task = Task::Running { shutdown, thread };
            }
            Err(e) => {
                tracing::error!(label = %label, error = %e, "failed to spawn watchdog thread");
                self.task = Task::Stopped;
            }
        }
    }

    /// Signal the background task to exit and return without waiting.
    ///
    /// A no-op when not running, so stopping twice or before `start` is fine.
    pub fn stop(&mut self) {
        self.halt();
    }

    /// Like [`Watchdog::stop`], then wait for the background thread to exit.
    ///
    /// The thread is woken by the signal, so this returns promptly. After it
    /// returns no further status line can appear.
    pub fn stop_and_join(&mut self) {
        if let Some(thread) = self.halt() {
            if thread.join().is_err() {
                tracing::debug!("watchdog thread ended abnormally");
            }
        }
    }

    /// True between a successful `start` and `stop`.
    pub fn is_running(&self) -> bool {
        matches!(self.task, Task::Running { .. })
    }

    /// Label of the observed unit, once started.
    pub fn label(&self) -> Option<&str> {
        self.observed.as_ref().map(|(label, _)| label.as_str())
    }

    /// Time since `start`, if started.
    pub fn elapsed(&self) -> Option<Duration> {
        self.observed.as_ref().map(|(_, started)| started.elapsed())
    }

    fn halt(&mut self) -> Option<JoinHandle<()>> {
        match std::mem::replace(&mut self.task, Task::Stopped) {
            Task::Running { shutdown, thread } => {
                // Err only means the loop already exited.
                let _ = shutdown.send(true);
                tracing::debug!(label = ?self.label(), "watchdog stop requested");
                Some(thread)
            }
            Task::Idle => {
                self.task = Task::Idle;
                None
            }
            Task::Stopped => None,
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.halt();
    }
}

/// Everything the background loop needs, moved onto its thread at start.
struct Escalation {
    label: String,
    started: Instant,
    policy: IntervalPolicy,
    source: Arc<dyn StateSource>,
    reporter: Arc<dyn Reporter>,
}

impl Escalation {
    /// Thread body: a private current-thread runtime, so the loop keeps
    /// ticking even when the observed unit blocks its own thread or runtime.
    fn run_on_own_runtime(self, shutdown: watch::Receiver<bool>) {
        let label = self.label.clone();
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!(label = %label, error = %e, "failed to build watchdog runtime");
                return;
            }
        };

        let outcome =
            std::panic::catch_unwind(AssertUnwindSafe(|| runtime.block_on(self.run(shutdown))));
        if outcome.is_err() {
            tracing::error!(label = %label, "watchdog loop panicked, no further status lines");
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut cycle: u32 = 1;
        loop {
            let wait = self.policy.interval(cycle);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                // A send or a dropped sender both mean stop.
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }
            let status = self.status();
            // Querying the state may take a while; a stop in the meantime wins.
            if *shutdown.borrow() {
                break;
            }
            self.reporter.report(&status);
            cycle = cycle.saturating_add(1);
        }
        tracing::debug!(label = %self.label, cycles = cycle - 1, "watchdog stopped");
    }

    fn status(&self) -> Status {
        let state = match self.policy.reporting {
            Reporting::Detailed => self.source.state(),
            Reporting::Generic => ExecutionState::Running,
        };
        Status {
            phrase: state.phrase(&self.label),
            label: self.label.clone(),
            elapsed: self.started.elapsed(),
        }
    }
}
