/// Status lines and the sink that receives them.
use std::time::Duration;

/// One status line about an observed unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Liveness phrase, already containing the label.
    pub phrase: String,
    pub label: String,
    /// Time since observation began.
    pub elapsed: Duration,
}

impl Status {
    /// Full text, e.g. `We're still running slow_test (6.0s), please wait...`.
    pub fn line(&self) -> String {
        format!(
            "{} ({}), please wait...",
            self.phrase,
            format_elapsed(self.elapsed)
        )
    }
}

/// Receives status lines from the watchdog thread.
///
/// Implementations must not block for long: the watchdog calls this between
/// sleeps and does nothing else.
pub trait Reporter: Send + Sync {
    fn report(&self, status: &Status);
}

/// Emits each status line as a `WARN` event on the `maybe_slow` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, status: &Status) {
        tracing::warn!(
            target: "maybe_slow",
            label = %status.label,
            elapsed_ms = status.elapsed.as_millis() as u64,
            "{}",
            status.line()
        );
    }
}

/// Render a duration for humans: `850ms`, `2.0s`, `1min 5s`, `2h 3min`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let ms = elapsed.as_millis();
    if ms < 1_000 {
        return format!("{ms}ms");
    }
    if ms < 60_000 {
        let tenths = ms / 100;
        return format!("{}.{}s", tenths / 10, tenths % 10);
    }
    let secs = elapsed.as_secs();
    if secs < 3_600 {
        let (min, sec) = (secs / 60, secs % 60);
        return if sec == 0 {
            format!("{min}min")
        } else {
            format!("{min}min {sec}s")
        };
    }
    let (hours, min) = (secs / 3_600, (secs % 3_600) / 60);
    if min == 0 {
        format!("{hours}h")
    } else {
        format!("{hours}h {min}min")
    }
}
