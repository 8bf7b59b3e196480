use actix_web::web;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;

mod checks;
mod health;
mod monitors;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health_route).service(health::trigger_route).service(
        web::scope("/api")
            .service(monitors::check_now)
            .service(monitors::latest_check)
            .service(monitors::test_webhook)
            .service(checks::list_checks)
            .service(checks::monitor_stats)
            .service(checks::list_incidents),
    );
}

/// `?monitor_id=` query shared by the listing routes
#[derive(Debug, Deserialize)]
pub struct MonitorQuery {
    pub monitor_id: Option<String>,
}

impl MonitorQuery {
    pub fn monitor_uuid(&self) -> Result<Uuid, AppError> {
        parse_monitor_id(self.monitor_id.as_deref())
    }
}

pub fn parse_monitor_id(raw: Option<&str>) -> Result<Uuid, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("monitor_id required".to_string()))?;

    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid monitor_id: {raw}")))
}
