/// Monitoring engine module - runs checks and tracks their state
///
/// This module is responsible for:
/// - Executing probe commands and mapping exit codes to states
/// - Detecting state transitions and selecting polling intervals
/// - Scheduling every check on its own independent loop
pub mod check;
pub mod executor;
pub mod interval;
pub mod scheduler;
pub mod types;

pub use check::{Check, CheckError, build_checks};
pub use executor::{CommandExecutor, ProbeExecutor, ProbeOutput};
pub use interval::{CheckIntervals, IntervalPolicy};
pub use scheduler::{CheckHandle, CheckRegistry, ScheduledChecks, Scheduler, Trigger};
pub use types::{CheckStatus, ServiceState, Transition};
