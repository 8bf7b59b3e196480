use std::io::Error as IoError;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use pulsewatch_engine::EngineError;
use pulsewatch_engine::notifications::NotifyError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("Address parsing error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
    #[error("Configuration error: {0}")]
    Config(#[from] pulsewatch_engine::config::Error),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Engine(EngineError::MonitorNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Engine(EngineError::WebhookNotConfigured(_)) => StatusCode::BAD_REQUEST,
            AppError::Engine(EngineError::Notify(NotifyError::MalformedJson { .. })) => StatusCode::BAD_REQUEST,
            AppError::Engine(EngineError::Notify(_)) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Engine(EngineError::MonitorNotFound(_)) => "Monitor not found".to_string(),
            AppError::Engine(EngineError::WebhookNotConfigured(_)) => "No webhook URL configured".to_string(),
            other => other.to_string(),
        };

        if self.status_code().is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        HttpResponse::build(self.status_code()).json(json!({ "error": message }))
    }
}
