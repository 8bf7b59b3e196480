use anyhow::{Result, anyhow};
use reqwest::Method;

use super::{CheckContext, Checker, describe_error, probe_client};
use crate::database::models::{DEFAULT_METHOD, Monitor};
use crate::monitoring::messages::Locale;
use crate::monitoring::types::ProbeOutcome;

/// HTTP/HTTPS checker
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new() -> Result<Self> {
        Ok(Self { client: probe_client()? })
    }
}

fn parse_method(method: &str) -> Result<Method> {
    let method = method.trim();
    let method = if method.is_empty() { DEFAULT_METHOD } else { method };

    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| anyhow!("Unsupported HTTP method: {}", method))
}

/// Keyword policy, forbidden keyword first
fn evaluate_keywords(
    body: &str,
    forbidden: Option<&str>,
    required: Option<&str>,
    status_code: u16,
    locale: Locale,
) -> ProbeOutcome {
    if let Some(forbidden) = forbidden {
        if body.contains(forbidden) {
            return ProbeOutcome::down(status_code, locale.forbidden_keyword());
        }
        return ProbeOutcome::up(status_code);
    }

    if let Some(required) = required {
        if !body.contains(required) {
            return ProbeOutcome::down(status_code, locale.keyword_missing());
        }
    }

    ProbeOutcome::up(status_code)
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, monitor: &Monitor, ctx: &CheckContext) -> Result<ProbeOutcome> {
        let method = parse_method(&monitor.method)?;

        let response = match self
            .client
            .request(method.clone(), &monitor.target)
            .timeout(ctx.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Ok(ProbeOutcome::down(0, ctx.locale.timeout(ctx.timeout_secs())));
            }
            Err(e) => return Ok(ProbeOutcome::down(0, ctx.locale.request_failed(&describe_error(&e)))),
        };

        let status_code = response.status().as_u16();
        if !monitor.accepted_status_codes().contains(&status_code) {
            return Ok(ProbeOutcome::down(status_code, ctx.locale.status_not_expected(status_code)));
        }

        let forbidden = monitor.forbidden_keyword();
        let required = monitor.required_keyword();
        if forbidden.is_none() && required.is_none() {
            return Ok(ProbeOutcome::up(status_code));
        }

        // Only buffer the body when a keyword has to be searched for
        let body = if method == Method::HEAD {
            String::new()
        } else {
            match response.text().await {
                Ok(body) => body,
                Err(e) if e.is_timeout() => {
                    return Ok(ProbeOutcome::down(status_code, ctx.locale.timeout(ctx.timeout_secs())));
                }
                Err(e) => return Err(e.into()),
            }
        };

        Ok(evaluate_keywords(&body, forbidden, required, status_code, ctx.locale))
    }
}
