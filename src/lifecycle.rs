/// Wiring between a test harness and the watchdog.
///
/// A harness calls [`MayBeSlow::before_each`] right before a unit runs and
/// [`MayBeSlow::after_each`] right after, on every outcome. Code that owns
/// the unit can use [`observe`] / [`observe_async`] instead, which guarantee
/// the stop even when the unit panics or its future is dropped.
use crate::label::UnitContext;
use crate::policy::IntervalPolicy;
use crate::report::{Reporter, TracingReporter};
use crate::state::{ExecutionState, UnitProbe};
use crate::watchdog::Watchdog;
use std::future::Future;
use std::sync::Arc;

/// Per-test extension: one fresh watchdog per observed unit.
pub struct MayBeSlow {
    policy: IntervalPolicy,
    reporter: Arc<dyn Reporter>,
    current: Option<WatchGuard>,
}

impl MayBeSlow {
    pub fn new(policy: IntervalPolicy) -> Self {
        Self {
            policy,
            reporter: Arc::new(TracingReporter),
            current: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Start watching the unit described by `ctx`.
    pub fn before_each(&mut self, ctx: &UnitContext) {
        if let Some(previous) = self.current.take() {
            tracing::debug!(
                label = previous.label(),
                "previous unit was never finished, stopping it"
            );
        }
        self.current = Some(self.watch(ctx));
    }

    /// Stop watching. Without a matching `before_each` this does nothing.
    pub fn after_each(&mut self, ctx: &UnitContext) {
        match self.current.take() {
            Some(guard) => guard.finish(),
            None => tracing::debug!(name = %ctx.name, "after_each without before_each"),
        }
    }

    /// Start a watchdog for `ctx` and hand back a guard that stops it on drop.
    ///
    /// The probe is marked running before this returns.
    pub fn watch(&self, ctx: &UnitContext) -> WatchGuard {
        let probe = UnitProbe::new();
        let mut watchdog = Watchdog::new(self.policy, Arc::new(probe.clone()))
            .with_reporter(Arc::clone(&self.reporter));
        watchdog.start(&ctx.label());
        probe.set(ExecutionState::Running);
        WatchGuard { watchdog, probe }
    }

    /// Run `unit` under a watchdog.
    pub fn observe<T>(&self, ctx: &UnitContext, unit: impl FnOnce() -> T) -> T {
        let _guard = self.watch(ctx);
        unit()
    }

    /// Await `unit` under a watchdog. Dropping the returned future stops it too.
    pub async fn observe_async<F: Future>(&self, ctx: &UnitContext, unit: F) -> F::Output {
        let _guard = self.watch(ctx);
        unit.await
    }
}

impl Default for MayBeSlow {
    fn default() -> Self {
        Self::new(IntervalPolicy::default())
    }
}

/// Keeps a watchdog alive for the duration of a unit.
#[must_use = "the watchdog stops as soon as the guard is dropped"]
pub struct WatchGuard {
    watchdog: Watchdog,
    probe: UnitProbe,
}

impl WatchGuard {
    /// Handle the unit can use to report `Blocked` or `Waiting`.
    pub fn probe(&self) -> &UnitProbe {
        &self.probe
    }

    pub fn label(&self) -> &str {
        self.watchdog.label().unwrap_or_default()
    }

    /// Mark the unit terminated and stop the watchdog.
    pub fn finish(self) {
        drop(self);
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.probe.set(ExecutionState::Terminated);
        self.watchdog.stop();
    }
}

/// [`MayBeSlow::observe`] with the default policy and tracing output.
pub fn observe<T>(ctx: &UnitContext, unit: impl FnOnce() -> T) -> T {
    MayBeSlow::default().observe(ctx, unit)
}

/// [`MayBeSlow::observe_async`] with the default policy and tracing output.
pub async fn observe_async<F: Future>(ctx: &UnitContext, unit: F) -> F::Output {
    MayBeSlow::default().observe_async(ctx, unit).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::testing::Recorder;
    use crate::state::StateSource;
    use std::thread::sleep;
    use std::time::Duration;

    fn extension(base_ms: u64) -> (MayBeSlow, Recorder) {
        let recorder = Recorder::default();
        let policy = IntervalPolicy::detailed().with_base(Duration::from_millis(base_ms));
        let ext = MayBeSlow::new(policy).with_reporter(Arc::new(recorder.clone()));
        (ext, recorder)
    }

    #[test]
    fn test_before_and_after_each() {
        let (mut ext, recorder) = extension(150);
        let ctx = UnitContext::new("slowTest");
        ext.before_each(&ctx);
        // Wakes at 150 and 450ms.
        sleep(Duration::from_millis(300));
        ext.after_each(&ctx);
        sleep(Duration::from_millis(300));

        let statuses = recorder.statuses();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].phrase, "We're still running slowTest");
    }

    #[test]
    fn test_after_each_without_before_each() {
        let (mut ext, recorder) = extension(10);
        ext.after_each(&UnitContext::new("orphan"));
        ext.after_each(&UnitContext::new("orphan"));
        sleep(Duration::from_millis(40));
        assert_eq!(recorder.count(), 0);
    }

    #[test]
    fn test_parameterized_invocation_label() {
        let (mut ext, recorder) = extension(100);
        let ctx = UnitContext::new("sleepsFewSeconds").with_unique_id(
            "[engine:junit-jupiter]/[class:Slow]/[test-template:sleepsFewSeconds(int)]/[test-template-invocation:#3]",
        );
        ext.before_each(&ctx);
        sleep(Duration::from_millis(200));
        ext.after_each(&ctx);

        let statuses = recorder.statuses();
        assert!(!statuses.is_empty());
        assert_eq!(statuses[0].label, "sleepsFewSeconds[#3]");
        assert_eq!(
            statuses[0].phrase,
            "We're still running sleepsFewSeconds[#3]"
        );
    }

    #[test]
    fn test_before_each_twice_replaces_previous() {
        let (mut ext, recorder) = extension(150);
        ext.before_each(&UnitContext::new("first"));
        ext.before_each(&UnitContext::new("second"));
        // Wakes at 150 and 450ms.
        sleep(Duration::from_millis(300));
        ext.after_each(&UnitContext::new("second"));

        let statuses = recorder.statuses();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].label, "second");
    }

    #[test]
    fn test_guard_marks_probe_terminated() {
        let (ext, _recorder) = extension(1_000);
        let guard = ext.watch(&UnitContext::new("probe"));
        let probe = guard.probe().clone();
        assert_eq!(probe.state(), ExecutionState::Running);
        assert_eq!(guard.label(), "probe");
        guard.finish();
        assert_eq!(probe.state(), ExecutionState::Terminated);
    }

    #[test]
    fn test_unit_reports_waiting_through_guard() {
        let (ext, recorder) = extension(100);
        let guard = ext.watch(&UnitContext::new("poller"));
        guard.probe().set(ExecutionState::Waiting);
        sleep(Duration::from_millis(200));
        guard.finish();

        let statuses = recorder.statuses();
        assert!(!statuses.is_empty());
        assert_eq!(statuses[0].phrase, "We're waiting at poller");
    }

    #[test]
    fn test_observe_returns_unit_value() {
        let (ext, recorder) = extension(1_000);
        let value = ext.observe(&UnitContext::new("fast"), || 6 * 7);
        assert_eq!(value, 42);
        assert_eq!(recorder.count(), 0);
    }

    #[test]
    fn test_observe_default_extension() {
        assert_eq!(observe(&UnitContext::new("fast"), || "done"), "done");
    }

    #[test]
    fn test_panicking_unit_still_stops_watchdog() {
        let (ext, recorder) = extension(100);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            ext.observe(&UnitContext::new("explodes"), || {
                sleep(Duration::from_millis(200));
                panic!("unit failed");
            })
        }));
        assert!(result.is_err());
        assert_eq!(recorder.count(), 1);
        // Without the stop the next line would land at 300ms.
        sleep(Duration::from_millis(400));
        assert_eq!(recorder.count(), 1);
    }

    #[tokio::test]
    async fn test_observe_async_with_async_unit() {
        let (ext, recorder) = extension(100);
        let value = ext
            .observe_async(&UnitContext::new("async_unit"), async {
                // Wakes at 100 and 300ms.
                tokio::time::sleep(Duration::from_millis(200)).await;
                "finished"
            })
            .await;
        assert_eq!(value, "finished");
        assert_eq!(recorder.count(), 1);
    }

    #[tokio::test]
    async fn test_observe_async_reports_while_unit_blocks_runtime() {
        let (ext, recorder) = extension(100);
        ext.observe_async(&UnitContext::new("hog"), async {
            // Blocks the test's only runtime thread.
            std::thread::sleep(Duration::from_millis(250));
        })
        .await;
        assert!(recorder.count() >= 1);
    }

    #[tokio::test]
    async fn test_observe_async_default_extension() {
        let value = observe_async(&UnitContext::new("fast"), async { 7 }).await;
        assert_eq!(value, 7);
    }
}
