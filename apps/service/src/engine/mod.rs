//! Engine module - drives monitors through the check pipeline
//!
//! For every monitor the pipeline is strictly sequential:
//! execute the probe, persist the result, apply the incident state machine,
//! then notify. Monitors run concurrently with a bounded fan-out and a
//! failure in one monitor never aborts the others.


use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::database::models::Monitor;
use crate::database::{Database, DatabaseImpl, initialize_database};
use crate::incidents::{IncidentEvent, IncidentTracker};
use crate::monitoring::types::{CheckResult, MonitorStatus};
use crate::monitoring::MonitoringExecutor;
use crate::notifications::{NotifyError, Transition, WebhookNotifier};
use crate::pool::open_pool;

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_LATEST_CHECK_TTL: Duration = Duration::from_secs(86_400);

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Monitor not found: {0}")]
    MonitorNotFound(Uuid),
    #[error("Monitor {0} has no webhook configured")]
    WebhookNotConfigured(Uuid),
    #[error("Notification failed: {0}")]
    Notify(#[from] NotifyError),
    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

/// Tunables for the engine
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Maximum monitors checked at once within a tick
    pub concurrency: usize,
    /// How long the latest-check cache entry lives
    pub latest_check_ttl: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self { concurrency: DEFAULT_CONCURRENCY, latest_check_ttl: DEFAULT_LATEST_CHECK_TTL }
    }
}

/// Outcome counts for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    pub monitors: usize,
    pub up: usize,
    pub down: usize,
    /// Pipelines that hit a storage error
    pub failed: usize,
}

impl std::fmt::Display for TickSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} monitors: {} up, {} down, {} failed",
            self.monitors, self.up, self.down, self.failed
        )
    }
}

/// Main engine for the PulseWatch service
pub struct MonitorEngine {
    database: Arc<dyn Database>,
    executor: Arc<MonitoringExecutor>,
    incidents: IncidentTracker,
    notifier: Arc<WebhookNotifier>,
    /// One async lock per monitor so overlapping runs cannot race the incident state
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
    settings: EngineSettings,
}

impl MonitorEngine {
    pub fn new(
        database: Arc<dyn Database>,
        executor: Arc<MonitoringExecutor>,
        notifier: Arc<WebhookNotifier>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            incidents: IncidentTracker::new(database.clone()),
            database,
            executor,
            notifier,
            locks: Mutex::new(HashMap::new()),
            settings,
        }
    }

    /// Open storage, apply migrations and build an engine from configuration
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let pool = open_pool(&config.database.path, config.database.pool_size).await?;
        {
            let conn = pool.get().await?;
            initialize_database(&conn).await?;
        }
        info!("Database ready at {}", config.database.path);

        let executor = MonitoringExecutor::new(config.engine.locale)?
            .with_default_timeout(config.engine.default_timeout());
        let notifier = WebhookNotifier::new(config.engine.webhook_timeout())?;

        Ok(Self::new(
            Arc::new(DatabaseImpl::new_from_pool(pool)),
            Arc::new(executor),
            Arc::new(notifier),
            config.engine.settings(),
        ))
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.database
    }

    /// Look up a monitor, failing with `MonitorNotFound` when it does not exist
    pub async fn monitor(&self, monitor_uuid: Uuid) -> Result<Monitor, EngineError> {
        self.database
            .get_monitor_by_uuid(monitor_uuid)
            .await?
            .ok_or(EngineError::MonitorNotFound(monitor_uuid))
    }

    async fn monitor_lock(&self, monitor_uuid: Uuid) -> Arc<Mutex<()>> {
        self.locks.lock().await.entry(monitor_uuid).or_default().clone()
    }

    /// Drop locks of monitors that are gone and not currently held
    async fn prune_locks(&self, active: &HashSet<Uuid>) {
        self.locks
            .lock()
            .await
            .retain(|uuid, lock| active.contains(uuid) || Arc::strong_count(lock) > 1);
    }

    /// Run every enabled monitor once
    pub async fn run_tick(&self) -> anyhow::Result<TickSummary> {
        let monitors = self.database.get_enabled_monitors().await?;
        let active: HashSet<Uuid> = monitors.iter().map(|m| m.uuid).collect();
        self.prune_locks(&active).await;

        // Futures are lazy; collecting them first keeps the stream's type free of
        // a higher-ranked closure so the tick future stays `Send`
        let pipelines: Vec<_> = monitors.iter().map(|monitor| self.run_pipeline(monitor)).collect();
        let outcomes: Vec<Result<CheckResult, EngineError>> = stream::iter(pipelines)
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut summary = TickSummary { monitors: monitors.len(), ..Default::default() };
        for outcome in outcomes {
            match outcome {
                Ok(result) if result.status == MonitorStatus::Up => summary.up += 1,
                Ok(_) => summary.down += 1,
                Err(_) => summary.failed += 1,
            }
        }

        info!("Tick finished: {}", summary);
        Ok(summary)
    }

    /// Run the full pipeline for one monitor on demand
    pub async fn check_one(&self, monitor_uuid: Uuid) -> Result<CheckResult, EngineError> {
        let monitor = self.monitor(monitor_uuid).await?;
        self.run_pipeline(&monitor).await
    }

    /// Send a `down` notification built from a synthetic result, whatever the
    /// monitor's real state is
    pub async fn test_webhook(&self, monitor_uuid: Uuid) -> Result<(), EngineError> {
        let monitor = self.monitor(monitor_uuid).await?;
        if monitor.webhook_url().is_none() {
            return Err(EngineError::WebhookNotConfigured(monitor_uuid));
        }

        let result = CheckResult::webhook_test(monitor.uuid);
        self.notifier.send(&monitor, &result, Transition::Down).await?;
        info!("Test webhook delivered for monitor {}", monitor.name);
        Ok(())
    }

    async fn run_pipeline(&self, monitor: &Monitor) -> Result<CheckResult, EngineError> {
        let lock = self.monitor_lock(monitor.uuid).await;
        let _guard = lock.lock().await;

        let result = self.executor.execute(monitor).await;

        // Persistence failures do not stop incident bookkeeping
        if let Err(e) = self.database.save_result(&result).await {
            warn!("Failed to save result for monitor {}: {:#}", monitor.name, e);
        }
        if let Err(e) = self.database.cache_latest_check(&result, self.settings.latest_check_ttl).await {
            warn!("Failed to cache latest check for monitor {}: {:#}", monitor.name, e);
        }

        let event = match self.incidents.transition(monitor.uuid, result.status, Utc::now()).await {
            Ok(event) => event,
            Err(e) => {
                error!("Incident bookkeeping failed for monitor {}: {:#}", monitor.name, e);
                return Err(EngineError::Storage(e));
            }
        };

        match event {
            Some(IncidentEvent::Opened { .. }) => {
                self.notifier.notify(monitor, &result, Transition::Down).await;
            }
            Some(IncidentEvent::Resolved { resolved_at, .. }) => {
                let recovered = CheckResult::recovered(monitor.uuid, resolved_at);
                self.notifier.notify(monitor, &recovered, Transition::Recovered).await;
            }
            None => {}
        }

        Ok(result)
    }
}
