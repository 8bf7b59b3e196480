//! Per-monitor incident state machine.
//!
//! Each monitor is either without an open incident or with exactly one. A
//! `down` result opens an incident only from the first state and an `up`
//! result resolves it only from the second; every other combination is a
//! no-op, which keeps consecutive failures from producing repeat alerts.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::database::Database;
use crate::monitoring::types::MonitorStatus;
use crate::notifications::Transition;

/// Incident transition that was persisted and should be announced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncidentEvent {
    Opened {
        incident_id: i64,
        started_at: DateTime<Utc>,
    },
    Resolved {
        incident_id: i64,
        resolved_at: DateTime<Utc>,
        duration_seconds: i64,
    },
}

impl IncidentEvent {
    pub fn transition(&self) -> Transition {
        match self {
            IncidentEvent::Opened { .. } => Transition::Down,
            IncidentEvent::Resolved { .. } => Transition::Recovered,
        }
    }
}

pub struct IncidentTracker {
    database: Arc<dyn Database>,
}

impl IncidentTracker {
    pub fn new(database: Arc<dyn Database>) -> Self {
        Self { database }
    }

    /// Apply a check verdict observed at `now`. The state write has completed
    /// by the time an event is returned.
    pub async fn transition(
        &self,
        monitor_uuid: Uuid,
        status: MonitorStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<IncidentEvent>> {
        match status {
            MonitorStatus::Down => {
                if let Some(open) = self.database.find_open_incident(monitor_uuid).await? {
                    debug!("Monitor {} still down, incident {} already open", monitor_uuid, open.id);
                    return Ok(None);
                }

                // Losing an insert race to another writer is the same as finding it open
                let Some(incident_id) = self.database.insert_incident(monitor_uuid, now).await? else {
                    return Ok(None);
                };

                info!("Opened incident {} for monitor {}", incident_id, monitor_uuid);
                Ok(Some(IncidentEvent::Opened { incident_id, started_at: now }))
            }
            MonitorStatus::Up => {
                let Some(open) = self.database.find_open_incident(monitor_uuid).await? else {
                    return Ok(None);
                };

                let duration_seconds = (now - open.started_at).num_seconds().max(0);
                self.database.resolve_incident(open.id, now, duration_seconds).await?;

                info!(
                    "Resolved incident {} for monitor {} after {}s",
                    open.id, monitor_uuid, duration_seconds
                );
                Ok(Some(IncidentEvent::Resolved { incident_id: open.id, resolved_at: now, duration_seconds }))
            }
        }
    }
}
