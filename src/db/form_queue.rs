use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::error::QueueError;
use crate::models::QueuedSubmission;

/// A submission about to be inserted. The store assigns `id`; `attempts` starts at 0.
pub struct NewSubmission {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: serde_json::Value,
    pub form_id: String,
    pub timestamp: DateTime<Utc>,
    pub csrf_token: Option<String>,
}

pub async fn add(pool: &SqlitePool, new: &NewSubmission) -> Result<QueuedSubmission, QueueError> {
    sqlx::query_as::<_, QueuedSubmission>(
        "INSERT INTO form_queue (url, method, headers, body, form_id, timestamp, attempts, csrf_token)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7) RETURNING *",
    )
    .bind(&new.url)
    .bind(&new.method)
    .bind(Json(&new.headers))
    .bind(Json(&new.body))
    .bind(&new.form_id)
    .bind(new.timestamp)
    .bind(&new.csrf_token)
    .fetch_one(pool)
    .await
    .map_err(|e| QueueError::Write(format!("Failed to insert queued submission: {e}")))
}

/// All queued submissions in insertion order.
pub async fn get_all(pool: &SqlitePool) -> Result<Vec<QueuedSubmission>, QueueError> {
    sqlx::query_as::<_, QueuedSubmission>("SELECT * FROM form_queue ORDER BY id ASC")
        .fetch_all(pool)
        .await
        .map_err(|e| QueueError::Read(format!("Failed to read queue: {e}")))
}

pub async fn count(pool: &SqlitePool) -> Result<i64, QueueError> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM form_queue")
        .fetch_one(pool)
        .await
        .map_err(|e| QueueError::Read(format!("Failed to count queue: {e}")))?;
    Ok(row.0)
}

/// Delete by id. Ids that are not present are ignored.
pub async fn remove_many(pool: &SqlitePool, ids: &[i64]) -> Result<u64, QueueError> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM form_queue WHERE id IN (");
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let result = query
        .build()
        .execute(pool)
        .await
        .map_err(|e| QueueError::Write(format!("Failed to remove queued submissions: {e}")))?;
    Ok(result.rows_affected())
}

/// Persist `attempts` for each record by id. The stored counter never decreases.
///
/// Every record is tried even after a failure; the first failure is returned.
pub async fn update_many(pool: &SqlitePool, records: &[QueuedSubmission]) -> Result<(), QueueError> {
    let mut first_error = None;

    for record in records {
        let result = sqlx::query("UPDATE form_queue SET attempts = MAX(attempts, ?2) WHERE id = ?1")
            .bind(record.id)
            .bind(record.attempts)
            .execute(pool)
            .await;

        if let Err(e) = result {
            tracing::error!("Failed to update queued submission {}: {e}", record.id);
            first_error.get_or_insert(QueueError::Write(format!(
                "Failed to update queued submission {}: {e}",
                record.id
            )));
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
