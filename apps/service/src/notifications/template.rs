use serde_json::{Map, Value};

use super::Transition;
use crate::database::models::Monitor;
use crate::monitoring::types::CheckResult;

/// Values available to `{{name}}` placeholders in a webhook body template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateVariables {
    pub monitor_name: String,
    pub monitor_url: String,
    pub status: String,
    pub error: String,
    pub timestamp: String,
    pub response_time: String,
    pub status_code: String,
}

impl TemplateVariables {
    pub fn new(monitor: &Monitor, result: &CheckResult, transition: Transition) -> Self {
        Self {
            monitor_name: monitor.name.clone(),
            monitor_url: monitor.target.clone(),
            status: transition.as_str().to_string(),
            error: result.error_message.clone(),
            timestamp: result.checked_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            response_time: result.response_time_ms.to_string(),
            status_code: result.status_code.to_string(),
        }
    }

    fn pairs(&self) -> [(&'static str, &str); 7] {
        [
            ("monitor_name", &self.monitor_name),
            ("monitor_url", &self.monitor_url),
            ("status", &self.status),
            ("error", &self.error),
            ("timestamp", &self.timestamp),
            ("response_time", &self.response_time),
            ("status_code", &self.status_code),
        ]
    }

    /// Replace every known placeholder in `text`. Unknown placeholders stay verbatim.
    pub fn substitute(&self, text: &str) -> String {
        self.pairs().iter().fold(text.to_string(), |acc, (name, value)| {
            acc.replace(&format!("{{{{{name}}}}}"), value)
        })
    }
}

/// Render a JSON body template, substituting placeholders in every string leaf.
///
/// Object keys, numbers, booleans and nulls pass through untouched.
pub fn render_template(template: &Value, variables: &TemplateVariables) -> Value {
    match template {
        Value::String(text) => Value::String(variables.substitute(text)),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), render_template(value, variables)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|item| render_template(item, variables)).collect()),
        other => other.clone(),
    }
}
