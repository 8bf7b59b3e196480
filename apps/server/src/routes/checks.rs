use actix_web::{HttpResponse, get, web};
use pulsewatch_engine::MonitorEngine;
use pulsewatch_engine::database::Database;
use pulsewatch_engine::database::repository::RECENT_RESULTS_LIMIT;

use super::MonitorQuery;
use crate::error::AppError;

/// Most recent check results, newest first
#[get("/checks")]
pub async fn list_checks(engine: web::Data<MonitorEngine>, query: web::Query<MonitorQuery>) -> Result<HttpResponse, AppError> {
    let monitor = engine.monitor(query.monitor_uuid()?).await?;
    let results = engine.database().get_recent_results(monitor.uuid, RECENT_RESULTS_LIMIT).await?;
    Ok(HttpResponse::Ok().json(results))
}

#[get("/stats")]
pub async fn monitor_stats(engine: web::Data<MonitorEngine>, query: web::Query<MonitorQuery>) -> Result<HttpResponse, AppError> {
    let monitor = engine.monitor(query.monitor_uuid()?).await?;
    let stats = engine.database().get_monitor_stats(monitor.uuid).await?;
    Ok(HttpResponse::Ok().json(stats))
}

#[get("/incidents")]
pub async fn list_incidents(engine: web::Data<MonitorEngine>, query: web::Query<MonitorQuery>) -> Result<HttpResponse, AppError> {
    let monitor = engine.monitor(query.monitor_uuid()?).await?;
    let incidents = engine.database().get_incidents(monitor.uuid, RECENT_RESULTS_LIMIT).await?;
    Ok(HttpResponse::Ok().json(incidents))
}
