//! Request/response client for the backend's line endpoints.

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;

use crate::domain::{ExitRecord, LineSnapshot};

use super::error::PollError;

/// Request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

const SNAPSHOT_PATH: &str = "/api/line/snapshot";
const EXITS_PATH: &str = "/api/line/exits";

/// Anything that can serve line data on request.
///
/// Implemented by [`LineClient`]; tests substitute in-memory sources.
pub trait LineSource: Send + Sync + 'static {
    /// Fetch the current full snapshot.
    fn fetch_snapshot(&self) -> BoxFuture<'_, Result<LineSnapshot, PollError>>;

    /// Fetch up to `limit` most recent exits, newest first.
    fn fetch_exits(&self, limit: usize) -> BoxFuture<'_, Result<Vec<ExitRecord>, PollError>>;
}

/// Configuration for the pull client.
#[derive(Debug, Clone)]
pub struct LineClientConfig {
    /// Backend origin, e.g. `http://127.0.0.1:8080`.
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl LineClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set the request timeout.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// HTTP client for the line endpoints.
#[derive(Debug, Clone)]
pub struct LineClient {
    http: reqwest::Client,
    base_url: String,
}

impl LineClient {
    /// Create a client. Fails if the base URL is not an absolute http(s) URL.
    pub fn new(config: LineClientConfig) -> Result<Self, PollError> {
        let parsed = reqwest::Url::parse(&config.base_url).map_err(|e| PollError::BaseUrl {
            url: config.base_url.clone(),
            message: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(PollError::BaseUrl {
                url: config.base_url,
                message: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the current full snapshot.
    pub async fn snapshot(&self) -> Result<LineSnapshot, PollError> {
        let url = format!("{}{}", self.base_url, SNAPSHOT_PATH);
        self.get_json(self.http.get(&url)).await
    }

    /// Fetch the most recent exits.
    pub async fn recent_exits(&self, limit: usize) -> Result<Vec<ExitRecord>, PollError> {
        let url = format!("{}{}", self.base_url, EXITS_PATH);
        self.get_json(self.http.get(&url).query(&[("limit", limit)])).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, PollError> {
        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(PollError::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PollError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| PollError::Json {
            message: e.to_string(),
        })
    }
}

impl LineSource for LineClient {
    fn fetch_snapshot(&self) -> BoxFuture<'_, Result<LineSnapshot, PollError>> {
        self.snapshot().boxed()
    }

    fn fetch_exits(&self, limit: usize) -> BoxFuture<'_, Result<Vec<ExitRecord>, PollError>> {
        self.recent_exits(limit).boxed()
    }
}
