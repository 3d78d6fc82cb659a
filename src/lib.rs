use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

pub mod client;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod submit;
pub mod sync;

pub use client::{AnalyticsSource, HttpAnalyticsSource, HttpLinkCreator, LinkCreator};
pub use clipboard::{ClipboardSink, SystemClipboard};
pub use config::{DashboardConfig, FetchMethod, ProxyConfig};
pub use error::DashboardError;
pub use models::{AnalyticsRow, AnalyticsSnapshot, SubmissionState, SyncStatus};
pub use submit::SubmissionFlow;
pub use sync::{RefreshTrigger, SyncEngine, SyncState};

// ── Shared proxy state ─────────────────────────────────────────────────────

pub struct AppState {
    pub client: reqwest::Client,
    /// Analytics endpoint every proxied call is forwarded to
    pub upstream_url: String,
}

impl AppState {
    pub fn from_config(config: &ProxyConfig) -> Result<Self, DashboardError> {
        Ok(Self {
            client: client::build_http_client(config.request_timeout)?,
            upstream_url: config.upstream_url.clone(),
        })
    }
}

/// Routes served by the cache-busting proxy.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/analytics",
            get(handlers::proxy::analytics).post(handlers::proxy::analytics),
        )
        .route("/health", get(|| async { axum::http::StatusCode::OK }))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
