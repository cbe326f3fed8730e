//! A watchdog for slow tests and commands.
//!
//! While an observed unit runs, a background thread waits 2s, then 4s, then
//! 6s, ... (capped at 60s between lines) and after each wait logs a WARN
//! line such as
//! `We're still running slowTest (6.0s), please wait...`, so a long run is
//! never mistaken for a hang. The watchdog only observes; it never touches
//! the unit or its outcome.
//!
//! ```no_run
//! use maybe_slow::{observe, UnitContext};
//!
//! let answer = observe(&UnitContext::new("slow_sum"), || {
//!     std::thread::sleep(std::time::Duration::from_secs(5));
//!     42
//! });
//! assert_eq!(answer, 42);
//! ```

pub mod config;
pub mod label;
pub mod lifecycle;
pub mod policy;
pub mod report;
pub mod session;
pub mod state;
pub mod watchdog;

pub use label::UnitContext;
pub use lifecycle::{observe, observe_async, MayBeSlow, WatchGuard};
pub use policy::{IntervalPolicy, Reporting};
pub use report::{format_elapsed, Reporter, Status, TracingReporter};
pub use state::{ExecutionState, ProcessProbe, StateSource, UnitProbe};
pub use watchdog::Watchdog;
