//! The wire beneath the request queue.
//!
//! [`SaavnApi`](super::SaavnApi) only sees status codes and bodies, so tests can
//! script upstream behavior without a network.

use anyhow::Context;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Status and body of a completed HTTP exchange, successful or not.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A request that never produced a response.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
}

pub type QueryParams = Vec<(&'static str, String)>;

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn get(&self, path: &str, query: &QueryParams) -> Result<RawResponse, TransportError>;
}

/// `reqwest`-backed transport against the configured base URL.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url).context("Invalid Saavn base URL")?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("musicbox/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build Saavn HTTP client")?;
        Ok(Self { http, base_url })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str, query: &QueryParams) -> Result<RawResponse, TransportError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| TransportError::Network(format!("invalid path {path}: {e}")))?;

        let resp = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(classify)?;
        Ok(RawResponse { status, body })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}
