use actix_web::{HttpResponse, Responder, get, web};
use pulsewatch_engine::MonitorEngine;
use serde_json::json;

use crate::error::AppError;

/// Health check route
/// This route returns no content, the response status is enough.
#[get("/health")]
pub async fn health_route() -> impl Responder {
    HttpResponse::Ok()
}

/// Run one tick over every enabled monitor
#[get("/trigger")]
pub async fn trigger_route(engine: web::Data<MonitorEngine>) -> Result<HttpResponse, AppError> {
    let summary = engine.run_tick().await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Monitor check triggered", "summary": summary })))
}
