use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use reqwest::Client;
use serde_json::{Value, json};
use tokio::sync::watch;

use formsync::config::{Config, TerminationPolicy};
use formsync::state::SharedState;

/// One request received by the mock bookkeeping API.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    pub csrf_token: Option<String>,
    pub body: Value,
}

/// Stand-in for the remote bookkeeping API.
#[derive(Clone, Default)]
pub struct MockApi {
    pub statuses: Arc<DashMap<String, u16>>,
    pub collections: Arc<DashMap<String, Value>>,
    pub delays: Arc<DashMap<String, Duration>>,
    pub received: Arc<Mutex<Vec<Captured>>>,
}

impl MockApi {
    pub fn respond(&self, path: &str, status: u16) {
        self.statuses.insert(path.to_string(), status);
    }

    /// Hold every response for `path` this long.
    pub fn delay(&self, path: &str, delay: Duration) {
        self.delays.insert(path.to_string(), delay);
    }

    pub fn received(&self) -> Vec<Captured> {
        self.received.lock().unwrap().clone()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.received().iter().filter(|c| c.path == path).count()
    }
}

async fn mock_handler(
    State(mock): State<MockApi>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    mock.received.lock().unwrap().push(Captured {
        method: method.to_string(),
        path: path.clone(),
        content_type: header("content-type"),
        csrf_token: header("x-csrf-token"),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    let delay = mock.delays.get(&path).map(|d| *d);
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    if method == Method::GET {
        if let Some(name) = path.strip_prefix("/api/") {
            if let Some(data) = mock.collections.get(name) {
                return (StatusCode::OK, axum::Json(data.value().clone())).into_response();
            }
        }
    }

    let status = mock.statuses.get(&path).map(|s| *s).unwrap_or(200);
    let status = StatusCode::from_u16(status).unwrap();
    (status, axum::Json(json!({ "path": path }))).into_response()
}

/// A running formsync instance wired to a mock remote API.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub mock: MockApi,
    pub state: SharedState,
    pub stop: watch::Sender<bool>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn post(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn put(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .expect("put request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Post a `queue-form` message, return the reply.
    pub async fn queue_form(&self, url: &str, form_id: &str) -> Value {
        let (body, status) = self
            .post(
                "/api/v1/messages",
                &json!({
                    "type": "queue-form",
                    "formData": {
                        "url": url,
                        "method": "POST",
                        "headers": { "X-Requested-With": "formsync-test" },
                        "body": { "formId": form_id, "amount": 25 },
                        "formId": form_id,
                        "csrfToken": "csrf-abc",
                    }
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "queue-form non-200: {body}");
        body
    }

    pub async fn set_online(&self, online: bool) -> Value {
        let (body, status) = self
            .put("/api/v1/connectivity", &json!({ "online": online }))
            .await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    pub async fn pending(&self) -> i64 {
        let (body, status) = self.get("/api/v1/queue").await;
        assert_eq!(status, StatusCode::OK, "queue status non-200: {body}");
        body["pending"].as_i64().unwrap()
    }

    pub async fn sync(&self) -> Value {
        let (body, status) = self.post("/api/v1/sync", &json!({})).await;
        assert_eq!(status, StatusCode::OK, "sync non-200: {body}");
        body
    }

    /// Poll until the queue is empty or the deadline passes.
    pub async fn wait_for_empty_queue(&self) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.pending().await > 0 {
            assert!(
                tokio::time::Instant::now() < deadline,
                "queue was not drained in time"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });
    addr
}

pub fn test_config(api_base_url: String) -> Config {
    Config {
        api_base_url: api_base_url.clone(),
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        csrf_token: None,
        max_attempts: 3,
        termination: TerminationPolicy::Deferred,
        replay_timeout: Duration::from_secs(5),
        sync_interval: Duration::ZERO,
        probe_interval: Duration::ZERO,
        probe_url: api_base_url,
        assume_online: false,
        max_body_size: 1_048_576,
        log_level: "warn".to_string(),
    }
}

/// Spawn the mock API and a formsync instance with an in-memory queue, starting offline.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}, true).await
}

pub async fn spawn_app_with(adjust: impl FnOnce(&mut Config), with_store: bool) -> TestApp {
    let mock = MockApi::default();
    let mock_app = Router::new()
        .fallback(mock_handler)
        .with_state(mock.clone());
    let mock_addr = serve(mock_app).await;

    let mut config = test_config(format!("http://{mock_addr}"));
    adjust(&mut config);

    let pool = if with_store {
        Some(
            formsync::db::open(&config.database_url)
                .await
                .expect("Failed to open queue store"),
        )
    } else {
        None
    };

    let (stop, shutdown) = watch::channel(false);
    let (app, state) = formsync::build_app(config, pool, shutdown)
        .await
        .expect("Failed to build app");
    let addr = serve(app).await;

    TestApp {
        addr,
        client: Client::new(),
        mock,
        state,
        stop,
    }
}

/// Stop background tasks.
pub async fn cleanup(app: TestApp) {
    let _ = app.stop.send(true);
}
