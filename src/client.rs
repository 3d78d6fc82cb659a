use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, PRAGMA};

use crate::{
    config::FetchMethod,
    error::DashboardError,
    models::{AnalyticsRow, CreateLinkRequest, CreateLinkResponse},
};

// ── Seams ──────────────────────────────────────────────────────────────────

/// Where the sync engine gets its analytics list from.
#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    async fn fetch_analytics(&self) -> Result<Vec<AnalyticsRow>, DashboardError>;
}

/// Creates a short link for a long URL and returns the public short URL.
#[async_trait]
pub trait LinkCreator: Send + Sync {
    async fn create_link(&self, long_url: &str) -> Result<String, DashboardError>;
}

/// Build the shared HTTP client with a strict timeout.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, DashboardError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| DashboardError::ConfigurationInvalid(format!("HTTP client: {e}")))
}

// ── Analytics ──────────────────────────────────────────────────────────────

/// Pulls the analytics list over HTTP, defeating intermediary caches with a
/// per-request query token and no-cache request headers.
pub struct HttpAnalyticsSource {
    client: reqwest::Client,
    endpoint: String,
    method: FetchMethod,
    counter: AtomicU64,
}

impl HttpAnalyticsSource {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, method: FetchMethod) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            method,
            counter: AtomicU64::new(0),
        }
    }

    /// Millisecond timestamp plus a per-source counter, so two polls issued
    /// within the same millisecond still get distinct URLs.
    fn cache_token(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}.{}", chrono::Utc::now().timestamp_millis(), n)
    }
}

#[async_trait]
impl AnalyticsSource for HttpAnalyticsSource {
    async fn fetch_analytics(&self) -> Result<Vec<AnalyticsRow>, DashboardError> {
        let request = match self.method {
            FetchMethod::Get => self.client.get(&self.endpoint),
            FetchMethod::Post => self.client.post(&self.endpoint),
        };

        let resp = request
            .query(&[("t", self.cache_token())])
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DashboardError::NetworkFailure(format!(
                "analytics request failed with status {status}"
            )));
        }

        // The origin encodes an empty list as `null`
        let rows: Option<Vec<AnalyticsRow>> = resp.json().await?;
        Ok(rows.unwrap_or_default())
    }
}

// ── Link creation ──────────────────────────────────────────────────────────

pub struct HttpLinkCreator {
    client: reqwest::Client,
    api_url: String,
}

impl HttpLinkCreator {
    pub fn new(client: reqwest::Client, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_owned(),
        }
    }
}

#[async_trait]
impl LinkCreator for HttpLinkCreator {
    async fn create_link(&self, long_url: &str) -> Result<String, DashboardError> {
        let resp = self
            .client
            .post(format!("{}/", self.api_url))
            .json(&CreateLinkRequest { url: long_url })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DashboardError::NetworkFailure(format!(
                "failed to create short URL (status {status})"
            )));
        }

        let body: CreateLinkResponse = resp.json().await?;
        Ok(body.short_url)
    }
}
