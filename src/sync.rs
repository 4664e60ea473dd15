use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::config::TerminationPolicy;
use crate::db;
use crate::error::QueueError;
use crate::events::{self, ClientEvent, EventSender};
use crate::models::QueuedSubmission;
use crate::remote::RemoteApi;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    /// Submissions delivered this pass.
    pub count: usize,
    /// Submissions that failed this pass, terminal ones included.
    pub failed: usize,
    pub dropped: Vec<DroppedSubmission>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedSubmission {
    pub id: i64,
    pub form_id: String,
}

/// Replays the durable queue against the remote API.
pub struct SyncCoordinator {
    pool: SqlitePool,
    remote: Arc<dyn RemoteApi>,
    max_attempts: i64,
    termination: TerminationPolicy,
    events: EventSender,
}

impl SyncCoordinator {
    pub fn new(
        pool: SqlitePool,
        remote: Arc<dyn RemoteApi>,
        max_attempts: i64,
        termination: TerminationPolicy,
        events: EventSender,
    ) -> Self {
        Self {
            pool,
            remote,
            max_attempts,
            termination,
            events,
        }
    }

    /// Run one sync pass: every queued submission is evaluated exactly once.
    ///
    /// Individual delivery failures never abort the pass. Only a failure to read
    /// the queue is returned as an error; failed batch writes are logged and the
    /// affected rows are simply evaluated again on the next pass.
    pub async fn run_pass(&self) -> Result<SyncSummary, QueueError> {
        let queued = db::form_queue::get_all(&self.pool).await?;

        if queued.is_empty() {
            let summary = SyncSummary::default();
            self.announce(&summary);
            return Ok(summary);
        }

        tracing::debug!("Sync pass started ({} queued)", queued.len());

        let mut succeeded: Vec<i64> = Vec::new();
        let mut retained: Vec<QueuedSubmission> = Vec::new();
        let mut dropped: Vec<DroppedSubmission> = Vec::new();

        for mut submission in queued {
            if submission.attempts >= self.max_attempts {
                tracing::warn!(
                    "Dropping submission {} (form={}) after {} attempts",
                    submission.id,
                    submission.form_id,
                    submission.attempts
                );
                dropped.push(DroppedSubmission {
                    id: submission.id,
                    form_id: submission.form_id,
                });
                continue;
            }

            match self.remote.replay(submission.replay_request()).await {
                Ok(resp) if resp.is_success() => {
                    tracing::debug!(
                        "Replayed submission {} (form={}) with HTTP {}",
                        submission.id,
                        submission.form_id,
                        resp.status
                    );
                    succeeded.push(submission.id);
                    continue;
                }
                Ok(resp) => {
                    tracing::debug!(
                        "Submission {} (form={}) rejected with HTTP {}",
                        submission.id,
                        submission.form_id,
                        resp.status
                    );
                }
                Err(e) => {
                    tracing::debug!(
                        "Submission {} (form={}) failed: {e}",
                        submission.id,
                        submission.form_id
                    );
                }
            }

            submission.attempts += 1;

            if self.termination == TerminationPolicy::Immediate
                && submission.attempts >= self.max_attempts
            {
                tracing::warn!(
                    "Dropping submission {} (form={}) after {} attempts",
                    submission.id,
                    submission.form_id,
                    submission.attempts
                );
                dropped.push(DroppedSubmission {
                    id: submission.id,
                    form_id: submission.form_id,
                });
            } else {
                retained.push(submission);
            }
        }

        let mut removals = succeeded.clone();
        removals.extend(dropped.iter().map(|d| d.id));

        if let Err(e) = db::form_queue::remove_many(&self.pool, &removals).await {
            tracing::error!("Failed to remove synced submissions: {e}");
        }
        if let Err(e) = db::form_queue::update_many(&self.pool, &retained).await {
            tracing::error!("Failed to persist retry counts: {e}");
        }

        let summary = SyncSummary {
            count: succeeded.len(),
            failed: retained.len() + dropped.len(),
            dropped,
        };

        tracing::info!(
            "Sync pass finished: {} delivered, {} failed, {} dropped",
            summary.count,
            summary.failed,
            summary.dropped.len()
        );

        self.announce(&summary);
        Ok(summary)
    }

    fn announce(&self, summary: &SyncSummary) {
        events::publish(
            &self.events,
            ClientEvent::FormsSynced {
                count: summary.count,
                failed: summary.failed,
                dropped: summary.dropped.clone(),
            },
        );
    }
}
