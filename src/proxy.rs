use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::OFFLINE_DISABLED;
use crate::background::{BackgroundHandle, SyncTrigger};
use crate::cache::{Collection, ResourceCache};
use crate::connectivity::Connectivity;
use crate::error::{QueueError, ReplayError};
use crate::models::FormSubmission;
use crate::remote::RemoteApi;
use crate::sync::SyncSummary;

/// Reply to a `queue-form` message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SubmitOutcome {
    /// The remote API accepted the submission.
    Delivered { code: u16 },
    /// The remote API answered with a non-2xx status. Not queued.
    Rejected { code: u16, body: String },
    /// Stored for a later sync pass.
    Queued { id: i64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceView {
    pub collection: Collection,
    pub data: serde_json::Value,
    pub stale: bool,
    pub fetched_at: DateTime<Utc>,
}

/// The page-side entry point. Talks to the background context only through
/// its handle; `queue` is `None` when the queue store could not be opened.
pub struct ForegroundProxy {
    queue: Option<BackgroundHandle>,
    connectivity: watch::Receiver<Connectivity>,
    remote: Arc<dyn RemoteApi>,
    csrf_token: Option<String>,
    cache: ResourceCache,
}

impl ForegroundProxy {
    pub fn new(
        queue: Option<BackgroundHandle>,
        connectivity: watch::Receiver<Connectivity>,
        remote: Arc<dyn RemoteApi>,
        csrf_token: Option<String>,
    ) -> Self {
        Self {
            queue,
            connectivity,
            remote,
            csrf_token,
            cache: ResourceCache::new(),
        }
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.borrow().is_online()
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    fn queue(&self) -> Result<&BackgroundHandle, QueueError> {
        self.queue
            .as_ref()
            .ok_or_else(|| QueueError::StorageUnavailable(OFFLINE_DISABLED.to_string()))
    }

    /// Hand a submission to the background context.
    pub async fn queue_form(&self, form: FormSubmission) -> QueueReply {
        let result = match self.queue() {
            Ok(queue) => queue.queue_form(form).await.map(|_| ()),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => QueueReply {
                success: true,
                error: None,
            },
            Err(e) => {
                tracing::warn!("Failed to queue form: {e}");
                QueueReply {
                    success: false,
                    error: Some(reply_error(&e)),
                }
            }
        }
    }

    /// Send live when online; queue when offline or when the live attempt
    /// fails before any response arrives.
    pub async fn submit(&self, form: FormSubmission) -> Result<SubmitOutcome, QueueError> {
        let form = form.with_csrf_fallback(self.csrf_token.as_deref());

        if self.is_online() {
            match self.remote.replay(form.replay_request()).await {
                Ok(resp) if resp.is_success() => {
                    return Ok(SubmitOutcome::Delivered { code: resp.status });
                }
                Ok(resp) => {
                    return Ok(SubmitOutcome::Rejected {
                        code: resp.status,
                        body: resp.body,
                    });
                }
                Err(ReplayError::InvalidRequest(msg)) => return Err(QueueError::Invalid(msg)),
                Err(ReplayError::Network(msg)) => {
                    tracing::info!("Live submission of {} failed, queueing: {msg}", form.form_id);
                }
            }
        }

        let queued = self.queue()?.queue_form(form).await?;
        Ok(SubmitOutcome::Queued { id: queued.id })
    }

    pub async fn sync_now(&self) -> Result<SyncSummary, QueueError> {
        self.queue()?.sync(SyncTrigger::Requested).await
    }

    pub async fn pending(&self) -> Result<i64, QueueError> {
        self.queue()?.pending().await
    }

    /// Fresh data when the remote API answers, otherwise the cached copy marked stale.
    pub async fn fetch_collection(&self, collection: Collection) -> Option<ResourceView> {
        if self.is_online() {
            match self.remote.fetch_collection(collection.as_str()).await {
                Ok(data) => {
                    let cached = self.cache.put(collection, data);
                    return Some(ResourceView {
                        collection,
                        data: cached.data,
                        stale: false,
                        fetched_at: cached.fetched_at,
                    });
                }
                Err(e) => {
                    tracing::debug!("Serving cached {}: {e}", collection.as_str());
                }
            }
        }

        self.cache.get(collection).map(|cached| ResourceView {
            collection,
            data: cached.data,
            stale: true,
            fetched_at: cached.fetched_at,
        })
    }
}

fn reply_error(err: &QueueError) -> String {
    match err {
        QueueError::StorageUnavailable(_) | QueueError::Closed => OFFLINE_DISABLED.to_string(),
        other => other.to_string(),
    }
}
