use serde::Deserialize;
use std::time::Duration;

/// Base interval of the detailed policy.
pub const DETAILED_BASE: Duration = Duration::from_millis(2_000);
/// Base interval of the generic policy.
pub const GENERIC_BASE: Duration = Duration::from_millis(5_000);
/// Upper bound on any single wait, whatever the policy.
pub const DEFAULT_CAP: Duration = Duration::from_millis(60_000);
/// Floor on any single wait, so a zero base or cap cannot spin the loop.
pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// What each status line says about the observed unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reporting {
    /// Phrase depends on the unit's current execution state.
    #[default]
    Detailed,
    /// Always "We're still running", state is never queried.
    Generic,
}

/// Escalating wait schedule for the watchdog loop.
///
/// The wait before status line `cycle` (1-based) is `base * cycle`, capped at
/// `cap`. Short overruns get quick feedback, long runs settle into one line
/// per `cap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub reporting: Reporting,
}

impl IntervalPolicy {
    /// 2s base, 60s cap, per-state phrases.
    pub fn detailed() -> Self {
        Self {
            base: DETAILED_BASE,
            cap: DEFAULT_CAP,
            reporting: Reporting::Detailed,
        }
    }

    /// 5s base, 60s cap, a single generic phrase.
    pub fn generic() -> Self {
        Self {
            base: GENERIC_BASE,
            cap: DEFAULT_CAP,
            reporting: Reporting::Generic,
        }
    }

    pub fn with_base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    pub fn with_cap(mut self, cap: Duration) -> Self {
        self.cap = cap;
        self
    }

    /// Wait before the status line of the given cycle.
    ///
    /// Cycle 0 is treated as cycle 1. Saturates instead of overflowing and
    /// never drops below [`MIN_INTERVAL`].
    pub fn interval(&self, cycle: u32) -> Duration {
        self.base
            .saturating_mul(cycle.max(1))
            .min(self.cap)
            .max(MIN_INTERVAL)
    }
}

impl Default for IntervalPolicy {
    fn default() -> Self {
        Self::detailed()
    }
}
