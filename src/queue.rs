use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::Notify;

use crate::db;
use crate::db::form_queue::NewSubmission;
use crate::error::QueueError;
use crate::models::{FormSubmission, QueuedSubmission};

/// Enqueue-only facade over the durable queue.
pub struct QueueManager {
    pool: SqlitePool,
    csrf_token: Option<String>,
    work_pending: Arc<Notify>,
}

impl QueueManager {
    pub fn new(pool: SqlitePool, csrf_token: Option<String>, work_pending: Arc<Notify>) -> Self {
        Self {
            pool,
            csrf_token,
            work_pending,
        }
    }

    pub async fn enqueue(&self, form: FormSubmission) -> Result<QueuedSubmission, QueueError> {
        validate(&form)?;
        let form = form.with_csrf_fallback(self.csrf_token.as_deref());

        let new = NewSubmission {
            url: form.url,
            method: form.method.to_uppercase(),
            headers: form.headers.unwrap_or_default(),
            body: form.body,
            form_id: form.form_id,
            timestamp: Utc::now(),
            csrf_token: form.csrf_token,
        };

        let queued = db::form_queue::add(&self.pool, &new).await?;

        tracing::info!(
            "Queued submission {} (form={}, {} {})",
            queued.id,
            queued.form_id,
            queued.method,
            queued.url
        );

        self.work_pending.notify_one();
        Ok(queued)
    }

    pub async fn pending(&self) -> Result<i64, QueueError> {
        db::form_queue::count(&self.pool).await
    }
}

fn validate(form: &FormSubmission) -> Result<(), QueueError> {
    if form.url.trim().is_empty() {
        return Err(QueueError::Invalid("url is required".to_string()));
    }
    if form.form_id.trim().is_empty() {
        return Err(QueueError::Invalid("formId is required".to_string()));
    }
    reqwest::Method::from_bytes(form.method.to_uppercase().as_bytes())
        .map_err(|_| QueueError::Invalid(format!("Invalid method: {}", form.method)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn form(url: &str, csrf: Option<&str>) -> FormSubmission {
        FormSubmission {
            url: url.to_string(),
            method: "post".to_string(),
            headers: None,
            body: json!({ "customer": "Acme" }),
            form_id: "customer-form".to_string(),
            csrf_token: csrf.map(str::to_string),
        }
    }

    async fn manager(csrf: Option<&str>) -> (QueueManager, Arc<Notify>) {
        let pool = db::open("sqlite::memory:").await.unwrap();
        let notify = Arc::new(Notify::new());
        (
            QueueManager::new(pool, csrf.map(str::to_string), notify.clone()),
            notify,
        )
    }

    #[tokio::test]
    async fn enqueue_then_get_all_returns_fresh_record() {
        let (manager, _) = manager(None).await;

        let queued = manager.enqueue(form("/api/addCustomer", Some("t1"))).await.unwrap();
        let all = db::form_queue::get_all(&manager.pool).await.unwrap();

        assert_eq!(all, vec![queued.clone()]);
        assert_eq!(queued.attempts, 0);
        assert_eq!(queued.method, "POST");
        assert!(queued.headers.is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_current_csrf_token() {
        let (manager, _) = manager(Some("current")).await;

        let carried = manager.enqueue(form("/api/addCustomer", Some("own"))).await.unwrap();
        let fallback = manager.enqueue(form("/api/addCustomer", None)).await.unwrap();

        assert_eq!(carried.csrf_token.as_deref(), Some("own"));
        assert_eq!(fallback.csrf_token.as_deref(), Some("current"));
        assert_eq!(manager.pending().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn enqueue_wakes_the_scheduler() {
        let (manager, notify) = manager(None).await;

        manager.enqueue(form("/api/addCustomer", None)).await.unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(1), notify.notified())
            .await
            .expect("enqueue should leave a pending wake");
    }

    #[tokio::test]
    async fn rejects_invalid_submissions_without_storing() {
        let (manager, _) = manager(None).await;

        let mut missing_form = form("/api/addCustomer", None);
        missing_form.form_id = String::new();
        let mut bad_method = form("/api/addCustomer", None);
        bad_method.method = "NOT A VERB".to_string();

        assert!(matches!(
            manager.enqueue(form("  ", None)).await,
            Err(QueueError::Invalid(_))
        ));
        assert!(matches!(
            manager.enqueue(missing_form).await,
            Err(QueueError::Invalid(_))
        ));
        assert!(matches!(
            manager.enqueue(bad_method).await,
            Err(QueueError::Invalid(_))
        ));
        assert_eq!(manager.pending().await.unwrap(), 0);
    }
}
