use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use crate::error::ReplayError;
use crate::models::ReplayRequest;

pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Result of one request that reached the remote API.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: String,
}

impl RemoteResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The remote bookkeeping API, as seen by the sync and foreground paths.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Send a form submission. Any HTTP response is `Ok`; transport failures are `Err`.
    async fn replay(&self, request: ReplayRequest<'_>) -> Result<RemoteResponse, ReplayError>;

    /// GET `/api/<collection>` and decode the JSON body.
    async fn fetch_collection(&self, collection: &str) -> Result<serde_json::Value, ReplayError>;
}

pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemote {
    /// Every request is bounded by `timeout` so one unreachable endpoint cannot stall a sync pass.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {e}"))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if url.starts_with('/') {
            format!("{}{url}", self.base_url)
        } else {
            format!("{}/{url}", self.base_url)
        }
    }
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn replay(&self, request: ReplayRequest<'_>) -> Result<RemoteResponse, ReplayError> {
        let method = reqwest::Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| ReplayError::InvalidRequest(format!("Invalid method: {}", request.method)))?;

        let mut req = self.client.request(method, self.resolve(request.url));

        for (name, value) in request.headers {
            if name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()) || name.eq_ignore_ascii_case(CSRF_HEADER) {
                continue;
            }
            req = req.header(name, value);
        }

        req = req.header(CONTENT_TYPE, "application/json");
        if let Some(token) = request.csrf_token {
            req = req.header(CSRF_HEADER, token);
        }

        let resp = req.json(request.body).send().await.map_err(classify)?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(1024)
            .collect::<String>();

        Ok(RemoteResponse { status, body })
    }

    async fn fetch_collection(&self, collection: &str) -> Result<serde_json::Value, ReplayError> {
        let resp = self
            .client
            .get(self.resolve(&format!("/api/{collection}")))
            .send()
            .await
            .map_err(classify)?;

        if !resp.status().is_success() {
            return Err(ReplayError::Network(format!(
                "Fetching {collection} returned HTTP {}",
                resp.status().as_u16()
            )));
        }

        resp.json()
            .await
            .map_err(|e| ReplayError::Network(format!("Invalid {collection} payload: {e}")))
    }
}

fn classify(err: reqwest::Error) -> ReplayError {
    if err.is_builder() {
        ReplayError::InvalidRequest(err.to_string())
    } else if err.is_timeout() {
        ReplayError::Network(format!("Request timed out: {err}"))
    } else {
        ReplayError::Network(err.to_string())
    }
}
