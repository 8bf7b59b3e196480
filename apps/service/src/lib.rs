//! PulseWatch engine: probes monitors, tracks incidents and sends webhook
//! notifications on state transitions.

pub mod config;
pub mod database;
pub mod engine;
pub mod incidents;
pub mod monitoring;
pub mod notifications;
pub mod pool;

pub use engine::{EngineError, MonitorEngine, TickSummary};
