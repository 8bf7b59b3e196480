use anyhow::Result;
use std::time::Duration;

use super::messages::Locale;
use super::types::ProbeOutcome;
use crate::database::models::Monitor;

mod http;
mod status_api;
mod tcp;

pub use http::HttpChecker;
pub use status_api::{ServerReport, StatusApiChecker, StatusApiResponse};
pub use tcp::TcpChecker;

/// User agent sent with every probe
pub const USER_AGENT: &str = concat!("PulseWatch/", env!("CARGO_PKG_VERSION"), " (uptime monitor)");

/// Per-probe settings handed to a checker
#[derive(Debug, Clone, Copy)]
pub struct CheckContext {
    pub timeout: Duration,
    pub locale: Locale,
}

impl CheckContext {
    pub fn timeout_secs(&self) -> u64 {
        self.timeout.as_secs()
    }
}

/// Checker trait for the different types of monitoring checks
///
/// A checker turns a monitor configuration into a verdict. Returning `Err`
/// is allowed; the executor records it as a `down` result.
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, monitor: &Monitor, ctx: &CheckContext) -> Result<ProbeOutcome>;
}

/// Shared reqwest client used by the HTTP based checkers
pub(crate) fn probe_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()?;

    Ok(client)
}

/// Render an error with its source chain, e.g. `error sending request: connection refused`
pub(crate) fn describe_error(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}
