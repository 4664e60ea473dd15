use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::models::FormSubmission;
use crate::proxy::SubmitOutcome;
use crate::state::SharedState;

/// Messages a page posts to the background context.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    QueueForm {
        #[serde(rename = "formData")]
        form_data: FormSubmission,
    },
    SyncNow,
}

pub async fn message(State(state): State<SharedState>, Json(msg): Json<ClientMessage>) -> Response {
    match msg {
        ClientMessage::QueueForm { form_data } => {
            Json(state.proxy.queue_form(form_data).await).into_response()
        }
        ClientMessage::SyncNow => match state.proxy.sync_now().await {
            Ok(summary) => Json(json!({
                "success": true,
                "count": summary.count,
                "failed": summary.failed,
            }))
            .into_response(),
            Err(e) => Json(json!({ "success": false, "error": e.to_string() })).into_response(),
        },
    }
}

pub async fn submit(
    State(state): State<SharedState>,
    Json(form): Json<FormSubmission>,
) -> Result<Json<SubmitOutcome>, AppError> {
    let outcome = state.proxy.submit(form).await?;
    Ok(Json(outcome))
}
