use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Failures of the durable queue and the background context that owns it.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueError {
    /// The persistence backend could not be opened. Offline features are off.
    StorageUnavailable(String),
    Write(String),
    Read(String),
    Invalid(String),
    /// The background context has stopped.
    Closed,
}

impl std::fmt::Display for QueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueError::StorageUnavailable(msg) => write!(f, "Storage unavailable: {msg}"),
            QueueError::Write(msg) => write!(f, "Write error: {msg}"),
            QueueError::Read(msg) => write!(f, "Read error: {msg}"),
            QueueError::Invalid(msg) => write!(f, "Invalid submission: {msg}"),
            QueueError::Closed => write!(f, "Background queue is not running"),
        }
    }
}

impl std::error::Error for QueueError {}

/// Failure to deliver a single submission to the remote API.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayError {
    Network(String),
    InvalidRequest(String),
}

impl std::fmt::Display for ReplayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayError::Network(msg) => write!(f, "Network error: {msg}"),
            ReplayError::InvalidRequest(msg) => write!(f, "Invalid request: {msg}"),
        }
    }
}

impl std::error::Error for ReplayError {}

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Queue(QueueError),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            AppError::Queue(err) => write!(f, "Queue Error: {err}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Queue(QueueError::Invalid(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Queue(QueueError::StorageUnavailable(_) | QueueError::Closed) => (
                StatusCode::SERVICE_UNAVAILABLE,
                crate::OFFLINE_DISABLED.to_string(),
            ),
            AppError::Queue(err) => {
                tracing::error!("Queue error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        AppError::Queue(err)
    }
}
