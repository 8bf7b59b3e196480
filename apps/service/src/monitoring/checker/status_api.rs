use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::{CheckContext, Checker, describe_error, probe_client};
use crate::database::models::Monitor;
use crate::monitoring::messages::Locale;
use crate::monitoring::types::ProbeOutcome;

/// Body returned by a server status API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusApiResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Vec<ServerReport>>,
}

/// One server entry reported by a status API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerReport {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub region: String,
    /// RFC 3339 string, `YYYY-MM-DD HH:MM:SS` (UTC), or unix seconds/milliseconds
    #[serde(default)]
    pub updated_at: Value,
}

impl ServerReport {
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        parse_updated_at(&self.updated_at)
    }
}

/// Numbers above this are read as milliseconds
const MILLIS_CUTOFF: i64 = 100_000_000_000;

fn from_unix(value: i64) -> Option<DateTime<Utc>> {
    if value.abs() >= MILLIS_CUTOFF {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

fn parse_updated_at(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => {
            let raw = raw.trim();
            if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
                return Some(time.with_timezone(&Utc));
            }
            if let Ok(time) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
                return Some(time.and_utc());
            }
            raw.parse::<i64>().ok().and_then(from_unix)
        }
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|f| f as i64))
            .and_then(from_unix),
        _ => None,
    }
}

/// Descriptors for every server whose last report is older than `threshold_ms`.
///
/// Servers outside `allow_list` are skipped. Servers without a readable
/// `updated_at` are never reported offline.
pub fn find_offline_servers(
    servers: &[ServerReport],
    allow_list: Option<&[&str]>,
    threshold_ms: i64,
    now: DateTime<Utc>,
    locale: Locale,
) -> Vec<String> {
    servers
        .iter()
        .filter(|server| allow_list.is_none_or(|names| names.contains(&server.name.as_str())))
        .filter_map(|server| {
            let Some(last_seen) = server.last_seen() else {
                warn!("Server {} reported an unreadable updated_at: {}", server.name, server.updated_at);
                return None;
            };

            let elapsed_ms = (now - last_seen).num_milliseconds();
            (elapsed_ms > threshold_ms)
                .then(|| locale.offline_server(&server.region, &server.name, elapsed_ms / 60_000))
        })
        .collect()
}

/// Checker for status APIs that report per-server heartbeats
pub struct StatusApiChecker {
    client: reqwest::Client,
}

impl StatusApiChecker {
    pub fn new() -> Result<Self> {
        Ok(Self { client: probe_client()? })
    }
}

fn api_failure(status_code: u16, message: Option<String>) -> ProbeOutcome {
    let message = message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("HTTP {status_code}"));
    ProbeOutcome::down(status_code, message)
}

#[async_trait::async_trait]
impl Checker for StatusApiChecker {
    async fn check(&self, monitor: &Monitor, ctx: &CheckContext) -> Result<ProbeOutcome> {
        let response = match self.client.get(&monitor.target).timeout(ctx.timeout).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Ok(ProbeOutcome::down(0, ctx.locale.timeout(ctx.timeout_secs())));
            }
            Err(e) => return Ok(ProbeOutcome::down(0, ctx.locale.request_failed(&describe_error(&e)))),
        };

        let status = response.status();
        let status_code = status.as_u16();
        let body = response.text().await.context("Failed to read status API response")?;

        if !status.is_success() {
            let message = serde_json::from_str::<StatusApiResponse>(&body).ok().and_then(|r| r.message);
            return Ok(api_failure(status_code, message));
        }

        let report: StatusApiResponse =
            serde_json::from_str(&body).context("Status API returned malformed JSON")?;
        if report.status != "success" {
            return Ok(api_failure(status_code, report.message));
        }

        let allow_list = monitor.target_server_names();
        let offline = find_offline_servers(
            report.data.as_deref().unwrap_or_default(),
            allow_list.as_deref(),
            monitor.offline_threshold_ms(),
            Utc::now(),
            ctx.locale,
        );

        if offline.is_empty() {
            Ok(ProbeOutcome::up(status_code))
        } else {
            Ok(ProbeOutcome::down(status_code, ctx.locale.servers_offline(&offline)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::{CheckType, MonitorStatus};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ctx() -> CheckContext {
        CheckContext { timeout: Duration::from_secs(5), locale: Locale::Zh }
    }

    fn report(name: &str, region: &str, updated_at: Value) -> ServerReport {
        ServerReport { uuid: format!("{name}-id"), name: name.to_string(), region: region.to_string(), updated_at }
    }

    async fn serve(status: u16, body: Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn test_updated_at_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(parse_updated_at(&json!("2024-05-01T12:00:00Z")), Some(expected));
        assert_eq!(parse_updated_at(&json!("2024-05-01T20:00:00+08:00")), Some(expected));
        assert_eq!(parse_updated_at(&json!("2024-05-01 12:00:00")), Some(expected));
        assert_eq!(parse_updated_at(&json!(expected.timestamp())), Some(expected));
        assert_eq!(parse_updated_at(&json!(expected.timestamp_millis())), Some(expected));
        assert_eq!(parse_updated_at(&json!("yesterday")), None);
        assert_eq!(parse_updated_at(&Value::Null), None);
    }

    #[test]
    fn test_offline_detection() {
        let now = Utc::now();
        let servers = vec![
            report("n1", "", json!((now - chrono::Duration::minutes(5)).to_rfc3339())),
            report("n2", "HK", json!((now - chrono::Duration::seconds(30)).to_rfc3339())),
        ];

        let offline = find_offline_servers(&servers, None, 3 * 60_000, now, Locale::Zh);
        assert_eq!(offline, vec!["n1(5分钟)".to_string()]);

        let offline = find_offline_servers(&servers, None, 10 * 60_000, now, Locale::Zh);
        assert!(offline.is_empty());
    }

    #[test]
    fn test_allow_list_filters_servers() {
        let now = Utc::now();
        let stale = json!((now - chrono::Duration::minutes(20)).timestamp_millis());
        let servers = vec![report("web-1", "JP", stale.clone()), report("web-10", "US", stale)];

        let offline = find_offline_servers(&servers, Some(&["web-1"][..]), 3 * 60_000, now, Locale::Zh);
        assert_eq!(offline, vec!["JPweb-1(20分钟)".to_string()]);
    }

    #[test]
    fn test_unreadable_timestamp_is_not_offline() {
        let servers = vec![report("n1", "", Value::Null)];
        assert!(find_offline_servers(&servers, None, 0, Utc::now(), Locale::Zh).is_empty());
    }

    #[tokio::test]
    async fn test_stale_server_is_down() {
        let updated_at = (Utc::now() - chrono::Duration::minutes(5)).to_rfc3339();
        let server = serve(
            200,
            json!({"status": "success", "data": [{"uuid": "a", "name": "n1", "region": "", "updated_at": updated_at}]}),
        )
        .await;

        let mut monitor = Monitor::new("fleet".to_string(), server.uri(), CheckType::StatusApi);
        let checker = StatusApiChecker::new().unwrap();

        let outcome = checker.check(&monitor, &ctx()).await.unwrap();
        assert_eq!(outcome, ProbeOutcome::down(200, "服务器离线: n1(5分钟)"));

        monitor.offline_threshold_minutes = 10;
        let outcome = checker.check(&monitor, &ctx()).await.unwrap();
        assert_eq!(outcome, ProbeOutcome::up(200));
    }

    #[tokio::test]
    async fn test_api_failure_uses_api_message() {
        let server = serve(200, json!({"status": "error", "message": "token expired"})).await;
        let monitor = Monitor::new("fleet".to_string(), server.uri(), CheckType::StatusApi);

        let outcome = StatusApiChecker::new().unwrap().check(&monitor, &ctx()).await.unwrap();
        assert_eq!(outcome, ProbeOutcome::down(200, "token expired"));
    }

    #[tokio::test]
    async fn test_http_failure_without_message() {
        let server = serve(503, json!({})).await;
        let monitor = Monitor::new("fleet".to_string(), server.uri(), CheckType::StatusApi);

        let outcome = StatusApiChecker::new().unwrap().check(&monitor, &ctx()).await.unwrap();
        assert_eq!(outcome.status, MonitorStatus::Down);
        assert_eq!(outcome.error_message, "HTTP 503");
    }
}
