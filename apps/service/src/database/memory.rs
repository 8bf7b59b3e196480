//! In-memory `Database` for unit tests of the incident and tick logic.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use super::Database;
use super::models::{Incident, Monitor, MonitorStats};
use crate::monitoring::types::{CheckResult, MonitorStatus};

#[derive(Default)]
pub struct MemoryDatabase {
    monitors: Mutex<Vec<Monitor>>,
    results: Mutex<Vec<CheckResult>>,
    latest: Mutex<Vec<(CheckResult, DateTime<Utc>)>>,
    incidents: Mutex<Vec<Incident>>,
    /// When set, incident writes fail, simulating a storage outage
    pub fail_incident_writes: std::sync::atomic::AtomicBool,
    /// When set, behaves like a store without the open-incident index:
    /// lookups yield to other tasks and inserts never refuse a duplicate
    pub unguarded_incidents: std::sync::atomic::AtomicBool,
}

impl MemoryDatabase {
    pub fn with_monitors(monitors: Vec<Monitor>) -> Self {
        Self { monitors: Mutex::new(monitors), ..Default::default() }
    }

    pub fn incidents(&self) -> Vec<Incident> {
        self.incidents.lock().unwrap().clone()
    }

    pub fn results(&self) -> Vec<CheckResult> {
        self.results.lock().unwrap().clone()
    }

    pub fn open_incident_count(&self, monitor_uuid: Uuid) -> usize {
        self.incidents.lock().unwrap().iter().filter(|i| i.monitor_uuid == monitor_uuid && i.is_open()).count()
    }

    fn unguarded(&self) -> bool {
        self.unguarded_incidents.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_incident_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(anyhow!("incident storage unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn get_enabled_monitors(&self) -> Result<Vec<Monitor>> {
        Ok(self.monitors.lock().unwrap().iter().filter(|m| m.enabled).cloned().collect())
    }

    async fn get_monitor_by_uuid(&self, uuid: Uuid) -> Result<Option<Monitor>> {
        Ok(self.monitors.lock().unwrap().iter().find(|m| m.uuid == uuid).cloned())
    }

    async fn save_monitor(&self, monitor: &Monitor) -> Result<i64> {
        let mut monitors = self.monitors.lock().unwrap();
        monitors.retain(|m| m.uuid != monitor.uuid);
        let id = monitor.id.unwrap_or(monitors.len() as i64 + 1);
        monitors.push(Monitor { id: Some(id), ..monitor.clone() });
        Ok(id)
    }

    async fn save_result(&self, result: &CheckResult) -> Result<i64> {
        let mut results = self.results.lock().unwrap();
        results.push(result.clone());
        Ok(results.len() as i64)
    }

    async fn cache_latest_check(&self, result: &CheckResult, ttl: Duration) -> Result<()> {
        let expires_at = Utc::now() + chrono::Duration::from_std(ttl)?;
        let mut latest = self.latest.lock().unwrap();
        latest.retain(|(r, _)| r.monitor_id != result.monitor_id);
        latest.push((result.clone(), expires_at));
        Ok(())
    }

    async fn get_latest_check(&self, monitor_uuid: Uuid) -> Result<Option<CheckResult>> {
        let now = Utc::now();
        Ok(self
            .latest
            .lock()
            .unwrap()
            .iter()
            .find(|(r, expires_at)| r.monitor_id == monitor_uuid && *expires_at > now)
            .map(|(r, _)| r.clone()))
    }

    async fn get_recent_results(&self, monitor_uuid: Uuid, limit: usize) -> Result<Vec<CheckResult>> {
        Ok(self
            .results
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|r| r.monitor_id == monitor_uuid)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_monitor_stats(&self, monitor_uuid: Uuid) -> Result<MonitorStats> {
        let results = self.results.lock().unwrap();
        let mine: Vec<&CheckResult> = results.iter().filter(|r| r.monitor_id == monitor_uuid).collect();
        let up = mine.iter().filter(|r| r.status == MonitorStatus::Up).count() as i64;
        let average = if mine.is_empty() {
            None
        } else {
            Some(mine.iter().map(|r| r.response_time_ms as f64).sum::<f64>() / mine.len() as f64)
        };
        Ok(MonitorStats::from_counts(mine.len() as i64, up, average))
    }

    async fn find_open_incident(&self, monitor_uuid: Uuid) -> Result<Option<Incident>> {
        if self.unguarded() {
            tokio::task::yield_now().await;
        }
        let open =
            self.incidents.lock().unwrap().iter().find(|i| i.monitor_uuid == monitor_uuid && i.is_open()).cloned();
        if self.unguarded() {
            tokio::task::yield_now().await;
        }
        Ok(open)
    }

    async fn insert_incident(&self, monitor_uuid: Uuid, started_at: DateTime<Utc>) -> Result<Option<i64>> {
        self.check_writable()?;
        let mut incidents = self.incidents.lock().unwrap();
        if !self.unguarded() && incidents.iter().any(|i| i.monitor_uuid == monitor_uuid && i.is_open()) {
            return Ok(None);
        }
        let id = incidents.len() as i64 + 1;
        incidents.push(Incident { id, monitor_uuid, started_at, resolved_at: None, duration_seconds: None });
        Ok(Some(id))
    }

    async fn resolve_incident(&self, incident_id: i64, resolved_at: DateTime<Utc>, duration_seconds: i64) -> Result<()> {
        self.check_writable()?;
        let mut incidents = self.incidents.lock().unwrap();
        if let Some(incident) = incidents.iter_mut().find(|i| i.id == incident_id && i.is_open()) {
            incident.resolved_at = Some(resolved_at);
            incident.duration_seconds = Some(duration_seconds);
        }
        Ok(())
    }

    async fn get_incidents(&self, monitor_uuid: Uuid, limit: usize) -> Result<Vec<Incident>> {
        Ok(self
            .incidents
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|i| i.monitor_uuid == monitor_uuid)
            .take(limit)
            .cloned()
            .collect())
    }
}
