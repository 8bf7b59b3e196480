use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Status of a monitoring check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Up,
    Down,
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorStatus::Up => write!(f, "up"),
            MonitorStatus::Down => write!(f, "down"),
        }
    }
}

impl FromStr for MonitorStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(MonitorStatus::Up),
            "down" => Ok(MonitorStatus::Down),
            other => Err(anyhow::anyhow!("Unknown monitor status: {}", other)),
        }
    }
}

/// Type of monitoring check to perform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckType {
    #[default]
    Http,
    Tcp,
    StatusApi,
}

impl CheckType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckType::Http => "http",
            CheckType::Tcp => "tcp",
            CheckType::StatusApi => "status-api",
        }
    }

    /// Parse a stored check type. Unset or unknown values fall back to HTTP.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("tcp") => CheckType::Tcp,
            Some("status-api") | Some("status_api") | Some("statusapi") => CheckType::StatusApi,
            _ => CheckType::Http,
        }
    }
}

impl std::fmt::Display for CheckType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a monitoring check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// UUID of the monitor that was checked
    pub monitor_id: Uuid,

    /// Status of the check (up/down)
    pub status: MonitorStatus,

    /// Wall-clock milliseconds from dispatch to verdict
    #[serde(rename = "response_time")]
    pub response_time_ms: u64,

    /// HTTP status code, 0 when not applicable or unreachable
    pub status_code: u16,

    /// Empty on success
    pub error_message: String,

    /// When the verdict was reached
    pub checked_at: DateTime<Utc>,
}

impl CheckResult {
    /// Create a check result from a strategy outcome
    pub fn from_outcome(monitor_id: Uuid, outcome: ProbeOutcome, response_time_ms: u64) -> Self {
        Self {
            monitor_id,
            status: outcome.status,
            response_time_ms,
            status_code: outcome.status_code,
            error_message: outcome.error_message,
            checked_at: Utc::now(),
        }
    }

    /// Synthetic result attached to a `recovered` notification.
    pub fn recovered(monitor_id: Uuid, resolved_at: DateTime<Utc>) -> Self {
        Self {
            monitor_id,
            status: MonitorStatus::Up,
            response_time_ms: 0,
            status_code: 200,
            error_message: String::new(),
            checked_at: resolved_at,
        }
    }

    /// Synthetic result used when testing a webhook.
    pub fn webhook_test(monitor_id: Uuid) -> Self {
        Self {
            monitor_id,
            status: MonitorStatus::Up,
            response_time_ms: 123,
            status_code: 200,
            error_message: String::new(),
            checked_at: Utc::now(),
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == MonitorStatus::Up
    }
}

/// Verdict produced by a single checker, before timing is attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status: MonitorStatus,
    pub status_code: u16,
    pub error_message: String,
}

impl ProbeOutcome {
    pub fn up(status_code: u16) -> Self {
        Self { status: MonitorStatus::Up, status_code, error_message: String::new() }
    }

    pub fn down(status_code: u16, error: impl Into<String>) -> Self {
        Self { status: MonitorStatus::Down, status_code, error_message: error.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_type_defaults_to_http() {
        assert_eq!(CheckType::from_stored(None), CheckType::Http);
        assert_eq!(CheckType::from_stored(Some("")), CheckType::Http);
        assert_eq!(CheckType::from_stored(Some("icmp")), CheckType::Http);
        assert_eq!(CheckType::from_stored(Some("TCP")), CheckType::Tcp);
        assert_eq!(CheckType::from_stored(Some("status-api")), CheckType::StatusApi);
    }

    #[test]
    fn recovered_result_is_synthetic() {
        let id = Uuid::new_v4();
        let at = Utc::now();
        let result = CheckResult::recovered(id, at);
        assert!(result.is_up());
        assert_eq!(result.response_time_ms, 0);
        assert_eq!(result.status_code, 200);
        assert_eq!(result.checked_at, at);
        assert!(result.error_message.is_empty());
    }

    #[test]
    fn status_round_trips_through_storage_text() {
        assert_eq!("down".parse::<MonitorStatus>().unwrap(), MonitorStatus::Down);
        assert_eq!(MonitorStatus::Up.to_string(), "up");
        assert!("degraded".parse::<MonitorStatus>().is_err());
    }
}
