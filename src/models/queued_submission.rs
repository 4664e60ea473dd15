use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A form submission persisted while waiting for delivery to the remote API.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedSubmission {
    pub id: i64,
    pub url: String,
    pub method: String,
    #[sqlx(json)]
    pub headers: HashMap<String, String>,
    #[sqlx(json)]
    pub body: serde_json::Value,
    pub form_id: String,
    pub timestamp: DateTime<Utc>,
    pub attempts: i64,
    pub csrf_token: Option<String>,
}

impl QueuedSubmission {
    pub fn replay_request(&self) -> ReplayRequest<'_> {
        ReplayRequest {
            url: &self.url,
            method: &self.method,
            headers: &self.headers,
            body: &self.body,
            csrf_token: self.csrf_token.as_deref(),
        }
    }
}

/// The `formData` a page hands over when a form is submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmission {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: serde_json::Value,
    pub form_id: String,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

fn default_method() -> String {
    "POST".to_string()
}

static NO_HEADERS: std::sync::LazyLock<HashMap<String, String>> =
    std::sync::LazyLock::new(HashMap::new);

impl FormSubmission {
    /// Use `fallback` as the CSRF token when the form carries none of its own.
    pub fn with_csrf_fallback(mut self, fallback: Option<&str>) -> Self {
        if self.csrf_token.is_none() {
            self.csrf_token = fallback.map(str::to_string);
        }
        self
    }

    pub fn replay_request(&self) -> ReplayRequest<'_> {
        ReplayRequest {
            url: &self.url,
            method: &self.method,
            headers: self.headers.as_ref().unwrap_or(&*NO_HEADERS),
            body: &self.body,
            csrf_token: self.csrf_token.as_deref(),
        }
    }
}

/// Borrowed view of everything needed to send a submission to the remote API.
#[derive(Debug, Clone, Copy)]
pub struct ReplayRequest<'a> {
    pub url: &'a str,
    pub method: &'a str,
    pub headers: &'a HashMap<String, String>,
    pub body: &'a serde_json::Value,
    pub csrf_token: Option<&'a str>,
}
