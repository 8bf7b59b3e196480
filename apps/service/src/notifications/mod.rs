//! Webhook notifications for incident transitions.

use thiserror::Error;

pub mod template;
pub mod webhook;

pub use template::{TemplateVariables, render_template};
pub use webhook::{WebhookDelivery, WebhookNotifier};

/// Incident transition being announced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Down,
    Recovered,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Down => "down",
            Transition::Recovered => "recovered",
        }
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Monitor has no webhook configured")]
    NotConfigured,
    #[error("Invalid webhook configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Malformed stored JSON in {field}: {source}")]
    MalformedJson {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Webhook returned non-success status: {0}")]
    Rejected(reqwest::StatusCode),
}
