/// Monitoring module - turns monitor configurations into check results
///
/// This module is responsible for:
/// - Probing targets over HTTP, TCP, and status APIs
/// - Bounding every probe with a hard timeout
/// - Driving the engine on a fixed tick
pub mod checker;
pub mod executor;
pub mod messages;
pub mod scheduler;
pub mod types;

pub use executor::MonitoringExecutor;
pub use messages::Locale;
pub use scheduler::TickScheduler;
pub use types::{CheckResult, CheckType, MonitorStatus};
