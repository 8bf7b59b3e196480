use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Row, params};
use std::time::Duration;
use uuid::Uuid;

use super::models::{Incident, Monitor, MonitorStats};
use crate::monitoring::types::{CheckResult, CheckType};
use crate::pool::LibsqlPool;

/// Number of results returned by the result-listing interface
pub const RECENT_RESULTS_LIMIT: usize = 100;

/// Database trait for abstracting database operations
#[async_trait]
pub trait Database: Send + Sync {
    /// Get all enabled monitors
    async fn get_enabled_monitors(&self) -> Result<Vec<Monitor>>;

    /// Get a monitor by UUID
    async fn get_monitor_by_uuid(&self, uuid: Uuid) -> Result<Option<Monitor>>;

    /// Save a monitor, returning its row id
    async fn save_monitor(&self, monitor: &Monitor) -> Result<i64>;

    /// Save a monitoring result
    async fn save_result(&self, result: &CheckResult) -> Result<i64>;

    /// Remember the latest result of a monitor for `ttl`
    async fn cache_latest_check(&self, result: &CheckResult, ttl: Duration) -> Result<()>;

    /// Latest cached result, `None` once it has expired
    async fn get_latest_check(&self, monitor_uuid: Uuid) -> Result<Option<CheckResult>>;

    /// Get recent results for a monitor, newest first
    async fn get_recent_results(&self, monitor_uuid: Uuid, limit: usize) -> Result<Vec<CheckResult>>;

    /// Uptime figures over every stored result of a monitor
    async fn get_monitor_stats(&self, monitor_uuid: Uuid) -> Result<MonitorStats>;

    /// The unresolved incident of a monitor, if any
    async fn find_open_incident(&self, monitor_uuid: Uuid) -> Result<Option<Incident>>;

    /// Open an incident. Returns `None` when one is already open.
    async fn insert_incident(&self, monitor_uuid: Uuid, started_at: DateTime<Utc>) -> Result<Option<i64>>;

    /// Close an open incident
    async fn resolve_incident(&self, incident_id: i64, resolved_at: DateTime<Utc>, duration_seconds: i64) -> Result<()>;

    /// Incidents of a monitor, newest first
    async fn get_incidents(&self, monitor_uuid: Uuid, limit: usize) -> Result<Vec<Incident>>;
}

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

const MONITOR_COLUMNS: &str = "id, uuid, name, target, check_type, method, timeout_seconds, expected_status_codes, keyword, forbidden_keyword, offline_threshold_minutes, target_servers, webhook_url, webhook_content_type, webhook_headers, webhook_body, webhook_username, enabled, created_at, updated_at";

const INCIDENT_COLUMNS: &str = "id, monitor_uuid, started_at, resolved_at, duration_seconds";

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<crate::pool::LibsqlManager>> {
        Ok(self.pool.get().await?)
    }
}

fn monitor_from_row(row: &Row) -> Result<Monitor> {
    let uuid_str: String = row.get(1)?;
    let check_type: Option<String> = row.get(4)?;

    Ok(Monitor {
        id: Some(row.get(0)?),
        uuid: Uuid::parse_str(&uuid_str)?,
        name: row.get(2)?,
        target: row.get(3)?,
        check_type: CheckType::from_stored(check_type.as_deref()),
        method: row.get::<Option<String>>(5)?.unwrap_or_else(|| super::models::DEFAULT_METHOD.to_string()),
        timeout_seconds: row.get::<i64>(6)?.max(0) as u64,
        expected_status_codes: row.get::<Option<String>>(7)?.unwrap_or_default(),
        keyword: row.get(8)?,
        forbidden_keyword: row.get(9)?,
        offline_threshold_minutes: row.get::<i64>(10)?.max(0) as u64,
        target_servers: row.get(11)?,
        webhook_url: row.get(12)?,
        webhook_content_type: row.get(13)?,
        webhook_headers: row.get(14)?,
        webhook_body: row.get(15)?,
        webhook_username: row.get(16)?,
        enabled: row.get::<i64>(17)? != 0,
        created_at: Monitor::i64_to_timestamp(row.get(18)?),
        updated_at: Monitor::i64_to_timestamp(row.get(19)?),
    })
}

fn check_from_row(row: &Row) -> Result<CheckResult> {
    let monitor_uuid_str: String = row.get(0)?;
    let status_str: String = row.get(1)?;

    Ok(CheckResult {
        monitor_id: Uuid::parse_str(&monitor_uuid_str)?,
        status: status_str.parse()?,
        response_time_ms: row.get::<i64>(2)?.max(0) as u64,
        status_code: row.get::<i64>(3)?.clamp(0, u16::MAX as i64) as u16,
        error_message: row.get::<Option<String>>(4)?.unwrap_or_default(),
        checked_at: Monitor::i64_to_timestamp(row.get(5)?),
    })
}

fn incident_from_row(row: &Row) -> Result<Incident> {
    let monitor_uuid_str: String = row.get(1)?;

    Ok(Incident {
        id: row.get(0)?,
        monitor_uuid: Uuid::parse_str(&monitor_uuid_str)?,
        started_at: Monitor::i64_to_timestamp(row.get(2)?),
        resolved_at: row.get::<Option<i64>>(3)?.map(Monitor::i64_to_timestamp),
        duration_seconds: row.get(4)?,
    })
}

#[async_trait]
impl Database for DatabaseImpl {
    async fn get_enabled_monitors(&self) -> Result<Vec<Monitor>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(&format!("SELECT {MONITOR_COLUMNS} FROM monitors WHERE enabled = 1 ORDER BY id"), ())
            .await?;

        let mut monitors = Vec::new();
        while let Some(row) = rows.next().await? {
            monitors.push(monitor_from_row(&row)?);
        }

        Ok(monitors)
    }

    async fn get_monitor_by_uuid(&self, uuid: Uuid) -> Result<Option<Monitor>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!("SELECT {MONITOR_COLUMNS} FROM monitors WHERE uuid = ?"),
                params![uuid.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(monitor_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn save_monitor(&self, monitor: &Monitor) -> Result<i64> {
        let conn = self.get_conn().await?;
        let created_at = Monitor::timestamp_to_i64(monitor.created_at);
        let updated_at = Monitor::timestamp_to_i64(monitor.updated_at);

        if let Some(id) = monitor.id {
            conn.execute(
                "UPDATE monitors SET name = ?, target = ?, check_type = ?, method = ?, timeout_seconds = ?, expected_status_codes = ?, keyword = ?, forbidden_keyword = ?, offline_threshold_minutes = ?, target_servers = ?, webhook_url = ?, webhook_content_type = ?, webhook_headers = ?, webhook_body = ?, webhook_username = ?, enabled = ?, updated_at = ? WHERE id = ?",
                params![
                    monitor.name.clone(),
                    monitor.target.clone(),
                    monitor.check_type.to_string(),
                    monitor.method.clone(),
                    monitor.timeout_seconds as i64,
                    monitor.expected_status_codes.clone(),
                    monitor.keyword.clone(),
                    monitor.forbidden_keyword.clone(),
                    monitor.offline_threshold_minutes as i64,
                    monitor.target_servers.clone(),
                    monitor.webhook_url.clone(),
                    monitor.webhook_content_type.clone(),
                    monitor.webhook_headers.clone(),
                    monitor.webhook_body.clone(),
                    monitor.webhook_username.clone(),
                    if monitor.enabled { 1 } else { 0 },
                    updated_at,
                    id
                ],
            )
            .await?;
            Ok(id)
        } else {
            conn.execute(
                "INSERT INTO monitors (uuid, name, target, check_type, method, timeout_seconds, expected_status_codes, keyword, forbidden_keyword, offline_threshold_minutes, target_servers, webhook_url, webhook_content_type, webhook_headers, webhook_body, webhook_username, enabled, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    monitor.uuid.to_string(),
                    monitor.name.clone(),
                    monitor.target.clone(),
                    monitor.check_type.to_string(),
                    monitor.method.clone(),
                    monitor.timeout_seconds as i64,
                    monitor.expected_status_codes.clone(),
                    monitor.keyword.clone(),
                    monitor.forbidden_keyword.clone(),
                    monitor.offline_threshold_minutes as i64,
                    monitor.target_servers.clone(),
                    monitor.webhook_url.clone(),
                    monitor.webhook_content_type.clone(),
                    monitor.webhook_headers.clone(),
                    monitor.webhook_body.clone(),
                    monitor.webhook_username.clone(),
                    if monitor.enabled { 1 } else { 0 },
                    created_at,
                    updated_at
                ],
            )
            .await?;

            Ok(conn.last_insert_rowid())
        }
    }

    async fn save_result(&self, result: &CheckResult) -> Result<i64> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO monitor_checks (monitor_uuid, status, response_time, status_code, error_message, checked_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                result.monitor_id.to_string(),
                result.status.to_string(),
                result.response_time_ms as i64,
                result.status_code as i64,
                result.error_message.clone(),
                Monitor::timestamp_to_i64(result.checked_at)
            ],
        )
        .await?;

        Ok(conn.last_insert_rowid())
    }

    async fn cache_latest_check(&self, result: &CheckResult, ttl: Duration) -> Result<()> {
        let conn = self.get_conn().await?;
        let payload = serde_json::to_string(result)?;
        let expires_at = Monitor::timestamp_to_i64(Utc::now()) + ttl.as_millis() as i64;

        conn.execute(
            "INSERT INTO latest_checks (monitor_uuid, payload, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(monitor_uuid) DO UPDATE SET payload = excluded.payload, expires_at = excluded.expires_at",
            params![result.monitor_id.to_string(), payload, expires_at],
        )
        .await?;

        Ok(())
    }

    async fn get_latest_check(&self, monitor_uuid: Uuid) -> Result<Option<CheckResult>> {
        let conn = self.get_conn().await?;
        let now = Monitor::timestamp_to_i64(Utc::now());
        let mut rows = conn
            .query(
                "SELECT payload FROM latest_checks WHERE monitor_uuid = ? AND expires_at > ?",
                params![monitor_uuid.to_string(), now],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let payload: String = row.get(0)?;
                Ok(Some(serde_json::from_str(&payload)?))
            }
            None => Ok(None),
        }
    }

    async fn get_recent_results(&self, monitor_uuid: Uuid, limit: usize) -> Result<Vec<CheckResult>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT monitor_uuid, status, response_time, status_code, error_message, checked_at FROM monitor_checks WHERE monitor_uuid = ? ORDER BY checked_at DESC, id DESC LIMIT ?",
                params![monitor_uuid.to_string(), limit as i64],
            )
            .await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(check_from_row(&row)?);
        }

        Ok(results)
    }

    async fn get_monitor_stats(&self, monitor_uuid: Uuid) -> Result<MonitorStats> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT COUNT(*), SUM(CASE WHEN status = 'up' THEN 1 ELSE 0 END), AVG(response_time) FROM monitor_checks WHERE monitor_uuid = ?",
                params![monitor_uuid.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let total: i64 = row.get(0)?;
                let up: Option<i64> = row.get(1)?;
                let average: Option<f64> = row.get(2)?;
                Ok(MonitorStats::from_counts(total, up.unwrap_or(0), average))
            }
            None => Ok(MonitorStats::default()),
        }
    }

    async fn find_open_incident(&self, monitor_uuid: Uuid) -> Result<Option<Incident>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {INCIDENT_COLUMNS} FROM incidents WHERE monitor_uuid = ? AND resolved_at IS NULL ORDER BY started_at DESC LIMIT 1"
                ),
                params![monitor_uuid.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(incident_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert_incident(&self, monitor_uuid: Uuid, started_at: DateTime<Utc>) -> Result<Option<i64>> {
        let conn = self.get_conn().await?;

        // OR IGNORE leans on idx_incidents_one_open when another writer got there first
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO incidents (monitor_uuid, started_at) VALUES (?, ?)",
                params![monitor_uuid.to_string(), Monitor::timestamp_to_i64(started_at)],
            )
            .await?;

        if inserted == 0 { Ok(None) } else { Ok(Some(conn.last_insert_rowid())) }
    }

    async fn resolve_incident(&self, incident_id: i64, resolved_at: DateTime<Utc>, duration_seconds: i64) -> Result<()> {
        let conn = self.get_conn().await?;

        conn.execute(
            "UPDATE incidents SET resolved_at = ?, duration_seconds = ? WHERE id = ? AND resolved_at IS NULL",
            params![Monitor::timestamp_to_i64(resolved_at), duration_seconds, incident_id],
        )
        .await?;

        Ok(())
    }

    async fn get_incidents(&self, monitor_uuid: Uuid, limit: usize) -> Result<Vec<Incident>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {INCIDENT_COLUMNS} FROM incidents WHERE monitor_uuid = ? ORDER BY started_at DESC, id DESC LIMIT ?"
                ),
                params![monitor_uuid.to_string(), limit as i64],
            )
            .await?;

        let mut incidents = Vec::new();
        while let Some(row) = rows.next().await? {
            incidents.push(incident_from_row(&row)?);
        }

        Ok(incidents)
    }
}
