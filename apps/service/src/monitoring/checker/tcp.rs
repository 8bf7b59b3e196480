use anyhow::{Result, anyhow};
use std::future::Future;
use std::io;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

use super::{CheckContext, Checker};
use crate::database::models::Monitor;
use crate::monitoring::types::ProbeOutcome;

/// TCP port reachability checker
pub struct TcpChecker;

impl TcpChecker {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TcpChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract `(host, port)` from a target. Targets without a scheme are read as
/// `https://`, and a missing port falls back to the scheme's default.
fn parse_target(target: &str) -> Result<(String, u16)> {
    let target = target.trim();
    let url = if target.contains("://") {
        Url::parse(target)?
    } else {
        Url::parse(&format!("https://{target}"))?
    };

    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| anyhow!("Target has no host: {}", target))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| anyhow!("Cannot infer port for target: {}", target))?;

    Ok((host.trim_start_matches('[').trim_end_matches(']').to_string(), port))
}

/// Map a failed connect to a verdict. Network-level failures are down; any
/// other error still proves something answered on the port.
fn classify_connect_error(error: &io::Error, ctx: &CheckContext) -> ProbeOutcome {
    match error.kind() {
        io::ErrorKind::TimedOut => ProbeOutcome::down(0, ctx.locale.connection_timeout(ctx.timeout_secs())),
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NetworkUnreachable
        | io::ErrorKind::HostUnreachable
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::NotFound => ProbeOutcome::down(0, ctx.locale.connection_failed()),
        _ => {
            debug!("Treating connect error as reachable: {}", error);
            ProbeOutcome::up(0)
        }
    }
}

async fn connect(host: &str, port: u16, ctx: &CheckContext) -> ProbeOutcome {
    // Resolution failures are network failures, whatever kind the resolver reports
    let addresses: Vec<_> = match tokio::net::lookup_host((host, port)).await {
        Ok(addresses) => addresses.collect(),
        Err(e) => {
            debug!("Failed to resolve {}: {}", host, e);
            return ProbeOutcome::down(0, ctx.locale.connection_failed());
        }
    };

    if addresses.is_empty() {
        return ProbeOutcome::down(0, ctx.locale.connection_failed());
    }

    match tokio::net::TcpStream::connect(addresses.as_slice()).await {
        Ok(_stream) => ProbeOutcome::up(0),
        Err(e) => classify_connect_error(&e, ctx),
    }
}

/// Bound resolution plus connect by the monitor timeout
async fn within_deadline<F>(ctx: &CheckContext, probe: F) -> ProbeOutcome
where
    F: Future<Output = ProbeOutcome>,
{
    match timeout(ctx.timeout, probe).await {
        Ok(outcome) => outcome,
        Err(_) => ProbeOutcome::down(0, ctx.locale.connection_timeout(ctx.timeout_secs())),
    }
}

#[async_trait::async_trait]
impl Checker for TcpChecker {
    async fn check(&self, monitor: &Monitor, ctx: &CheckContext) -> Result<ProbeOutcome> {
        let (host, port) = parse_target(&monitor.target)?;
        Ok(within_deadline(ctx, connect(&host, port, ctx)).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::messages::Locale;
    use crate::monitoring::types::{CheckType, MonitorStatus};
    use std::time::Duration;

    fn ctx() -> CheckContext {
        CheckContext { timeout: Duration::from_secs(2), locale: Locale::Zh }
    }

    fn monitor(target: String) -> Monitor {
        Monitor::new("tcp".to_string(), target, CheckType::Tcp)
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("example.com").unwrap(), ("example.com".to_string(), 443));
        assert_eq!(parse_target("example.com:22").unwrap(), ("example.com".to_string(), 22));
        assert_eq!(parse_target("http://example.com").unwrap(), ("example.com".to_string(), 80));
        assert_eq!(parse_target("https://example.com:8443/path").unwrap(), ("example.com".to_string(), 8443));
        assert_eq!(parse_target("http://[::1]:9000").unwrap(), ("::1".to_string(), 9000));
        assert!(parse_target("tcp://example.com").is_err());
    }

    #[test]
    fn test_classify_connect_error() {
        let ctx = ctx();
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(classify_connect_error(&refused, &ctx), ProbeOutcome::down(0, "连接失败"));

        let timed_out = io::Error::from(io::ErrorKind::TimedOut);
        assert_eq!(classify_connect_error(&timed_out, &ctx), ProbeOutcome::down(0, "连接超时 (2s)"));

        let other = io::Error::other("protocol rejected");
        assert_eq!(classify_connect_error(&other, &ctx).status, MonitorStatus::Up);
    }

    #[tokio::test]
    async fn test_open_port_is_up() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let outcome = TcpChecker::new().check(&monitor(format!("127.0.0.1:{port}")), &ctx()).await.unwrap();
        assert_eq!(outcome, ProbeOutcome::up(0));
    }

    #[tokio::test]
    async fn test_refused_port_is_down() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let outcome = TcpChecker::new().check(&monitor(format!("http://127.0.0.1:{port}")), &ctx()).await.unwrap();
        assert_eq!(outcome, ProbeOutcome::down(0, "连接失败"));
    }

    #[tokio::test]
    async fn test_stalled_connect_hits_deadline() {
        let ctx = CheckContext { timeout: Duration::from_secs(1), locale: Locale::Zh };

        let start = std::time::Instant::now();
        let outcome = within_deadline(&ctx, std::future::pending()).await;
        assert_eq!(outcome, ProbeOutcome::down(0, "连接超时 (1s)"));
        assert!(start.elapsed() < Duration::from_secs(2));

        let answered = within_deadline(&ctx, async { ProbeOutcome::up(0) }).await;
        assert_eq!(answered, ProbeOutcome::up(0));
    }

    #[tokio::test]
    async fn test_unparseable_target_is_error() {
        let result = TcpChecker::new().check(&monitor("https://".to_string()), &ctx()).await;
        assert!(result.is_err());
    }
}
