use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::sync::SyncSummary;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct ConnectivityReport {
    pub online: bool,
}

pub async fn status(State(state): State<SharedState>) -> Result<Json<serde_json::Value>, AppError> {
    let pending = state.proxy.pending().await?;
    Ok(Json(json!({
        "pending": pending,
        "online": state.monitor.current().is_online(),
    })))
}

pub async fn sync(State(state): State<SharedState>) -> Result<Json<SyncSummary>, AppError> {
    let summary = state.proxy.sync_now().await?;
    Ok(Json(summary))
}

pub async fn report_connectivity(
    State(state): State<SharedState>,
    Json(req): Json<ConnectivityReport>,
) -> Json<serde_json::Value> {
    let transition = state.monitor.report(req.online);
    Json(json!({
        "online": state.monitor.current().is_online(),
        "transition": transition,
    }))
}
