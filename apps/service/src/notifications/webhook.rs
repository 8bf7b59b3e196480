use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::{debug, warn};

use super::template::{TemplateVariables, render_template};
use super::{NotifyError, Transition};
use crate::database::models::{DEFAULT_WEBHOOK_CONTENT_TYPE, Monitor};
use crate::monitoring::types::CheckResult;

/// A fully rendered webhook request
#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    pub url: String,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Sends incident notifications to a monitor's webhook.
pub struct WebhookNotifier {
    client: Client,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn header_value(value: &str) -> Result<HeaderValue, NotifyError> {
    HeaderValue::from_str(value)
        .map_err(|e| NotifyError::InvalidConfiguration(format!("Invalid header value: {}", e)))
}

fn build_headers(monitor: &Monitor) -> Result<HeaderMap, NotifyError> {
    let mut headers = HeaderMap::new();

    let content_type =
        non_blank(monitor.webhook_content_type.as_deref()).unwrap_or(DEFAULT_WEBHOOK_CONTENT_TYPE);
    headers.insert(CONTENT_TYPE, header_value(content_type)?);

    // Custom headers override the defaults; header names are case-insensitive
    if let Some(raw) = non_blank(monitor.webhook_headers.as_deref()) {
        let custom: Map<String, Value> = serde_json::from_str(raw)
            .map_err(|source| NotifyError::MalformedJson { field: "webhook_headers", source })?;

        for (name, value) in custom {
            let value = match value {
                Value::Null => continue,
                Value::String(value) => value,
                other => other.to_string(),
            };
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| NotifyError::InvalidConfiguration(format!("Invalid header name: {}", e)))?;
            headers.insert(name, header_value(&value)?);
        }
    }

    // Username-only basic auth, the password is always empty
    if let Some(username) = non_blank(monitor.webhook_username.as_deref()) {
        let encoded = STANDARD.encode(format!("{username}:"));
        headers.insert(AUTHORIZATION, header_value(&format!("Basic {encoded}"))?);
    }

    Ok(headers)
}

impl WebhookNotifier {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Payload sent when the monitor has no body template. The message text is
    /// fixed, whatever locale the probes report in.
    fn default_payload(monitor: &Monitor, result: &CheckResult, transition: Transition, timestamp: &str) -> Value {
        let message = match transition {
            Transition::Down => format!("🚨 {} is DOWN! {}", monitor.name, result.error_message),
            Transition::Recovered => format!("✅ {} is back UP!", monitor.name),
        };

        json!({
            "monitor": monitor.name,
            "url": monitor.target,
            "status": transition.as_str(),
            "timestamp": timestamp,
            "response_time": result.response_time_ms,
            "status_code": result.status_code,
            "error": result.error_message,
            "message": message,
        })
    }

    /// Render the request for a transition without sending it
    pub fn build_delivery(
        &self,
        monitor: &Monitor,
        result: &CheckResult,
        transition: Transition,
    ) -> Result<WebhookDelivery, NotifyError> {
        let url = monitor.webhook_url().ok_or(NotifyError::NotConfigured)?.trim().to_string();
        let headers = build_headers(monitor)?;
        let variables = TemplateVariables::new(monitor, result, transition);

        let body = match non_blank(monitor.webhook_body.as_deref()) {
            Some(raw) => {
                let template: Value = serde_json::from_str(raw)
                    .map_err(|source| NotifyError::MalformedJson { field: "webhook_body", source })?;
                render_template(&template, &variables)
            }
            None => Self::default_payload(monitor, result, transition, &variables.timestamp),
        };

        Ok(WebhookDelivery { url, headers, body })
    }

    /// POST a rendered delivery once. Non-2xx responses are errors.
    pub async fn deliver(&self, delivery: &WebhookDelivery) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&delivery.url)
            .headers(delivery.headers.clone())
            .body(delivery.body.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status));
        }

        Ok(())
    }

    /// Build and deliver, surfacing every failure
    pub async fn send(&self, monitor: &Monitor, result: &CheckResult, transition: Transition) -> Result<(), NotifyError> {
        let delivery = self.build_delivery(monitor, result, transition)?;
        self.deliver(&delivery).await?;
        debug!("Delivered {} webhook for monitor {}", transition, monitor.name);
        Ok(())
    }

    /// Fire-and-forget notification. A missing webhook is a no-op and every
    /// failure is logged and discarded; nothing is retried.
    pub async fn notify(&self, monitor: &Monitor, result: &CheckResult, transition: Transition) {
        if monitor.webhook_url().is_none() {
            return;
        }

        if let Err(e) = self.send(monitor, result, transition).await {
            warn!("Failed to send {} webhook for monitor {}: {}", transition, monitor.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::CheckType;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn monitor(webhook_url: Option<String>) -> Monitor {
        let mut monitor = Monitor::new("API".to_string(), "https://api.example.com".to_string(), CheckType::Http);
        monitor.webhook_url = webhook_url;
        monitor
    }

    fn down_result(monitor: &Monitor) -> CheckResult {
        let mut result = CheckResult::webhook_test(monitor.uuid);
        result.error_message = "超时 (30s)".to_string();
        result.status_code = 0;
        result
    }

    fn notifier() -> WebhookNotifier {
        WebhookNotifier::new(Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_default_headers() {
        let headers = build_headers(&monitor(None)).unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_custom_headers_override_defaults() {
        let mut m = monitor(None);
        m.webhook_content_type = Some("text/plain".to_string());
        m.webhook_headers = Some(r#"{"content-type": "application/x-custom", "X-Token": "abc", "X-Retry": 3}"#.to_string());
        m.webhook_username = Some("alice".to_string());

        let headers = build_headers(&m).unwrap();
        assert_eq!(headers[CONTENT_TYPE], "application/x-custom");
        assert_eq!(headers["x-token"], "abc");
        assert_eq!(headers["x-retry"], "3");
        assert_eq!(headers[AUTHORIZATION], "Basic YWxpY2U6");
    }

    #[test]
    fn test_malformed_headers_are_rejected() {
        let mut m = monitor(None);
        m.webhook_headers = Some("{not json".to_string());
        assert!(matches!(build_headers(&m), Err(NotifyError::MalformedJson { field: "webhook_headers", .. })));

        m.webhook_headers = Some(r#"{"bad header": "x"}"#.to_string());
        assert!(matches!(build_headers(&m), Err(NotifyError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_default_payload() {
        let m = monitor(Some("https://hooks.example.com".to_string()));
        let result = down_result(&m);

        // Probe diagnostics stay localized, the surrounding message does not
        let delivery = notifier().build_delivery(&m, &result, Transition::Down).unwrap();
        assert_eq!(delivery.url, "https://hooks.example.com");
        assert_eq!(delivery.body["monitor"], "API");
        assert_eq!(delivery.body["url"], "https://api.example.com");
        assert_eq!(delivery.body["status"], "down");
        assert_eq!(delivery.body["response_time"], 123);
        assert_eq!(delivery.body["status_code"], 0);
        assert_eq!(delivery.body["error"], "超时 (30s)");
        assert_eq!(delivery.body["message"], "🚨 API is DOWN! 超时 (30s)");

        let recovered = CheckResult::recovered(m.uuid, chrono::Utc::now());
        let delivery = notifier().build_delivery(&m, &recovered, Transition::Recovered).unwrap();
        assert_eq!(delivery.body["status"], "recovered");
        assert_eq!(delivery.body["message"], "✅ API is back UP!");
    }

    #[test]
    fn test_templated_payload() {
        let mut m = monitor(Some("https://hooks.example.com".to_string()));
        m.webhook_body = Some(r#"{"text": "{{monitor_name}} is {{status}}", "meta": {"code": "{{status_code}}", "n": 1}}"#.to_string());

        let delivery = notifier().build_delivery(&m, &down_result(&m), Transition::Down).unwrap();
        assert_eq!(delivery.body, json!({"text": "API is down", "meta": {"code": "0", "n": 1}}));
    }

    #[test]
    fn test_malformed_body_template() {
        let mut m = monitor(Some("https://hooks.example.com".to_string()));
        m.webhook_body = Some("{\"text\": ".to_string());

        let result = notifier().build_delivery(&m, &down_result(&m), Transition::Down);
        assert!(matches!(result, Err(NotifyError::MalformedJson { field: "webhook_body", .. })));
    }

    #[tokio::test]
    async fn test_delivery_posts_rendered_payload() {
        let server = MockServer::start().await;
        let m = {
            let mut m = monitor(Some(format!("{}/hook", server.uri())));
            m.webhook_username = Some("alice".to_string());
            m.webhook_body = Some(r#"{"msg": "{{monitor_name}} is {{status}}"}"#.to_string());
            m
        };

        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .and(header("authorization", "Basic YWxpY2U6"))
            .and(body_json(json!({"msg": "API is down"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        notifier().send(&m, &down_result(&m), Transition::Down).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_delivery() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let m = monitor(Some(server.uri()));
        let notifier = notifier();
        let result = notifier.send(&m, &down_result(&m), Transition::Down).await;
        assert!(matches!(result, Err(NotifyError::Rejected(status)) if status.as_u16() == 500));

        // notify swallows the same failure
        notifier.notify(&m, &down_result(&m), Transition::Down).await;
    }

    #[tokio::test]
    async fn test_missing_webhook() {
        let m = monitor(Some("   ".to_string()));
        let notifier = notifier();

        assert!(matches!(
            notifier.send(&m, &down_result(&m), Transition::Down).await,
            Err(NotifyError::NotConfigured)
        ));
        notifier.notify(&m, &down_result(&m), Transition::Down).await;
    }
}
