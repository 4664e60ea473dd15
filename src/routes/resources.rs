use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::cache::Collection;
use crate::error::AppError;
use crate::proxy::ResourceView;
use crate::state::SharedState;

pub async fn get(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Json<ResourceView>, AppError> {
    let collection: Collection = name.parse().map_err(AppError::NotFound)?;

    let view = state
        .proxy
        .fetch_collection(collection)
        .await
        .ok_or_else(|| AppError::NotFound(format!("No cached copy of {name}")))?;
    Ok(Json(view))
}

pub async fn invalidate(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    let collection: Collection = name.parse().map_err(AppError::NotFound)?;
    state.proxy.cache().invalidate(collection);
    Ok(StatusCode::NO_CONTENT)
}
