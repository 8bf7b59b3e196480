use actix_web::{HttpResponse, get, post, web};
use pulsewatch_engine::MonitorEngine;
use pulsewatch_engine::database::Database;
use serde::Deserialize;
use serde_json::json;

use super::parse_monitor_id;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct TestWebhookRequest {
    pub monitor_id: Option<String>,
}

/// Check a monitor now and return the result
#[post("/monitors/{id}/check")]
pub async fn check_now(engine: web::Data<MonitorEngine>, id: web::Path<String>) -> Result<HttpResponse, AppError> {
    let monitor_uuid = parse_monitor_id(Some(id.as_str()))?;
    let result = engine.check_one(monitor_uuid).await?;
    Ok(HttpResponse::Ok().json(result))
}

/// Cached latest result, `null` when nothing is cached
#[get("/monitors/{id}/latest")]
pub async fn latest_check(engine: web::Data<MonitorEngine>, id: web::Path<String>) -> Result<HttpResponse, AppError> {
    let monitor = engine.monitor(parse_monitor_id(Some(id.as_str()))?).await?;
    let latest = engine.database().get_latest_check(monitor.uuid).await?;
    Ok(HttpResponse::Ok().json(latest))
}

#[post("/test-webhook")]
pub async fn test_webhook(
    engine: web::Data<MonitorEngine>,
    body: web::Json<TestWebhookRequest>,
) -> Result<HttpResponse, AppError> {
    let monitor_uuid = parse_monitor_id(body.monitor_id.as_deref())?;
    engine.test_webhook(monitor_uuid).await?;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Test webhook sent" })))
}
