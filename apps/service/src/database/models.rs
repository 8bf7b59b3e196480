use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::monitoring::types::CheckType;

pub const DEFAULT_METHOD: &str = "GET";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_EXPECTED_STATUS_CODES: &str = "200,201,204,301,302";
pub const DEFAULT_OFFLINE_THRESHOLD_MINUTES: u64 = 3;
pub const DEFAULT_WEBHOOK_CONTENT_TYPE: &str = "application/json";

/// Monitor model - represents a monitoring target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monitor {
    pub id: Option<i64>,
    pub uuid: Uuid,
    pub name: String,
    pub target: String,
    pub check_type: CheckType,
    pub method: String,
    pub timeout_seconds: u64,
    /// Comma separated list, e.g. `200,201,204`
    pub expected_status_codes: String,
    pub keyword: Option<String>,
    pub forbidden_keyword: Option<String>,
    pub offline_threshold_minutes: u64,
    /// Comma separated server names for status-API monitors
    pub target_servers: Option<String>,
    pub webhook_url: Option<String>,
    pub webhook_content_type: Option<String>,
    /// JSON object of extra headers
    pub webhook_headers: Option<String>,
    /// JSON body template
    pub webhook_body: Option<String>,
    pub webhook_username: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Monitor {
    /// Create a new monitor
    pub fn new(name: String, target: String, check_type: CheckType) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            uuid: Uuid::new_v4(),
            name,
            target,
            check_type,
            method: DEFAULT_METHOD.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            expected_status_codes: DEFAULT_EXPECTED_STATUS_CODES.to_string(),
            keyword: None,
            forbidden_keyword: None,
            offline_threshold_minutes: DEFAULT_OFFLINE_THRESHOLD_MINUTES,
            target_servers: None,
            webhook_url: None,
            webhook_content_type: None,
            webhook_headers: None,
            webhook_body: None,
            webhook_username: None,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Accepted status codes. Entries that do not parse are ignored.
    pub fn accepted_status_codes(&self) -> Vec<u16> {
        let raw = if self.expected_status_codes.trim().is_empty() {
            DEFAULT_EXPECTED_STATUS_CODES
        } else {
            self.expected_status_codes.as_str()
        };

        raw.split(',').filter_map(|code| code.trim().parse().ok()).collect()
    }

    /// Required keyword, ignoring blank values
    pub fn required_keyword(&self) -> Option<&str> {
        non_blank(self.keyword.as_deref())
    }

    /// Forbidden keyword, ignoring blank values
    pub fn forbidden_keyword(&self) -> Option<&str> {
        non_blank(self.forbidden_keyword.as_deref())
    }

    /// Configured webhook URL, ignoring blank values
    pub fn webhook_url(&self) -> Option<&str> {
        non_blank(self.webhook_url.as_deref())
    }

    /// Status-API server allow-list, `None` when no filter applies
    pub fn target_server_names(&self) -> Option<Vec<&str>> {
        let names: Vec<&str> = non_blank(self.target_servers.as_deref())?
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();

        if names.is_empty() { None } else { Some(names) }
    }

    /// Probe timeout, falling back to the default when unset
    pub fn timeout(&self) -> std::time::Duration {
        let seconds = if self.timeout_seconds == 0 { DEFAULT_TIMEOUT_SECONDS } else { self.timeout_seconds };
        std::time::Duration::from_secs(seconds)
    }

    /// Offline threshold in milliseconds for status-API monitors
    pub fn offline_threshold_ms(&self) -> i64 {
        let minutes = if self.offline_threshold_minutes == 0 {
            DEFAULT_OFFLINE_THRESHOLD_MINUTES
        } else {
            self.offline_threshold_minutes
        };
        minutes as i64 * 60 * 1000
    }

    /// Convert a timestamp to Unix milliseconds for storage
    pub fn timestamp_to_i64(time: DateTime<Utc>) -> i64 {
        time.timestamp_millis()
    }

    /// Convert stored Unix milliseconds back to a timestamp
    pub fn i64_to_timestamp(timestamp: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(timestamp).single().unwrap_or_default()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Incident model - a contiguous interval during which a monitor was down
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: i64,
    pub monitor_uuid: Uuid,
    pub started_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
}

impl Incident {
    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }
}

/// Aggregated figures over every stored check of a monitor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorStats {
    pub total_checks: i64,
    pub uptime_percentage: f64,
    pub average_response_time: f64,
}

impl MonitorStats {
    pub fn from_counts(total_checks: i64, up_checks: i64, average_response_time: Option<f64>) -> Self {
        let uptime_percentage =
            if total_checks > 0 { up_checks as f64 / total_checks as f64 * 100.0 } else { 0.0 };

        Self { total_checks, uptime_percentage, average_response_time: average_response_time.unwrap_or(0.0) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> Monitor {
        Monitor::new("API".to_string(), "https://example.com".to_string(), CheckType::Http)
    }

    #[test]
    fn default_status_codes_are_parsed() {
        assert_eq!(monitor().accepted_status_codes(), vec![200, 201, 204, 301, 302]);
    }

    #[test]
    fn status_codes_tolerate_whitespace_and_garbage() {
        let mut m = monitor();
        m.expected_status_codes = " 200, 418 ,abc,".to_string();
        assert_eq!(m.accepted_status_codes(), vec![200, 418]);
    }

    #[test]
    fn blank_keywords_are_ignored() {
        let mut m = monitor();
        m.keyword = Some("  ".to_string());
        m.forbidden_keyword = Some("error".to_string());
        assert_eq!(m.required_keyword(), None);
        assert_eq!(m.forbidden_keyword(), Some("error"));
    }

    #[test]
    fn target_servers_split_on_commas() {
        let mut m = monitor();
        assert!(m.target_server_names().is_none());
        m.target_servers = Some("hk-1, jp-2,,".to_string());
        assert_eq!(m.target_server_names(), Some(vec!["hk-1", "jp-2"]));
    }

    #[test]
    fn threshold_and_timeout_defaults() {
        let mut m = monitor();
        m.timeout_seconds = 0;
        m.offline_threshold_minutes = 0;
        assert_eq!(m.timeout().as_secs(), 30);
        assert_eq!(m.offline_threshold_ms(), 3 * 60 * 1000);
    }

    #[test]
    fn stats_without_checks_report_zero_uptime() {
        let stats = MonitorStats::from_counts(0, 0, None);
        assert_eq!(stats.uptime_percentage, 0.0);
        assert_eq!(stats.average_response_time, 0.0);

        let stats = MonitorStats::from_counts(4, 3, Some(120.5));
        assert_eq!(stats.uptime_percentage, 75.0);
    }

    #[test]
    fn timestamps_keep_millisecond_precision() {
        let now = Utc::now();
        let stored = Monitor::timestamp_to_i64(now);
        assert_eq!(Monitor::i64_to_timestamp(stored).timestamp_millis(), now.timestamp_millis());
    }
}
