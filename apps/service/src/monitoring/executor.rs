use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::checker::{CheckContext, Checker, HttpChecker, StatusApiChecker, TcpChecker};
use super::messages::Locale;
use super::types::{CheckResult, CheckType, ProbeOutcome};
use crate::database::models::{DEFAULT_TIMEOUT_SECONDS, Monitor};

/// Slack on top of the monitor timeout so a checker's own timeout, with its
/// more specific message, fires before the hard deadline.
const TIMEOUT_GRACE: Duration = Duration::from_millis(500);

/// Monitoring executor - executes individual monitoring checks
pub struct MonitoringExecutor {
    http_checker: Arc<dyn Checker>,
    tcp_checker: Arc<dyn Checker>,
    status_api_checker: Arc<dyn Checker>,
    locale: Locale,
    /// Used for monitors without a timeout of their own
    default_timeout: Duration,
}

impl MonitoringExecutor {
    /// Create a new monitoring executor
    pub fn new(locale: Locale) -> Result<Self> {
        Ok(Self::with_checkers(
            Arc::new(HttpChecker::new()?),
            Arc::new(TcpChecker::new()),
            Arc::new(StatusApiChecker::new()?),
            locale,
        ))
    }

    pub fn with_checkers(
        http_checker: Arc<dyn Checker>,
        tcp_checker: Arc<dyn Checker>,
        status_api_checker: Arc<dyn Checker>,
        locale: Locale,
    ) -> Self {
        Self {
            http_checker,
            tcp_checker,
            status_api_checker,
            locale,
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }

    pub fn with_default_timeout(mut self, default_timeout: Duration) -> Self {
        self.default_timeout = default_timeout;
        self
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Execute a monitoring check. Never fails: every error becomes a `down` result.
    pub async fn execute(&self, monitor: &Monitor) -> CheckResult {
        let timeout_duration =
            if monitor.timeout_seconds == 0 { self.default_timeout } else { monitor.timeout() };
        let ctx = CheckContext { timeout: timeout_duration, locale: self.locale };

        let checker = match monitor.check_type {
            CheckType::Http => &self.http_checker,
            CheckType::Tcp => &self.tcp_checker,
            CheckType::StatusApi => &self.status_api_checker,
        };

        let start = Instant::now();
        let outcome = match timeout(ctx.timeout + TIMEOUT_GRACE, checker.check(monitor, &ctx)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!("Check for monitor {} ({}) failed: {:#}", monitor.name, monitor.uuid, e);
                ProbeOutcome::down(0, format!("{e:#}"))
            }
            Err(_) => ProbeOutcome::down(0, self.locale.timeout(ctx.timeout_secs())),
        };
        let response_time_ms = start.elapsed().as_millis() as u64;

        debug!(
            "Checked {} [{}] -> {} in {}ms",
            monitor.name, monitor.check_type, outcome.status, response_time_ms
        );

        CheckResult::from_outcome(monitor.uuid, outcome, response_time_ms)
    }
}
