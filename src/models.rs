use serde::{Deserialize, Serialize};

/// One row of the analytics table as reported by the origin.
///
/// The origin creates the row when a link is shortened and bumps
/// `click_count` on every redirect; the dashboard only ever observes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsRow {
    pub short_code: String,
    pub long_url: String,
    pub click_count: u64,
}

impl AnalyticsRow {
    /// Public short link for this row, e.g. "https://ln.k/abc123".
    pub fn short_link(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.short_code)
    }
}

/// The full analytics list as of the last applied fetch, in server order
/// (most clicked first). Replaced wholesale, never patched.
pub type AnalyticsSnapshot = Vec<AnalyticsRow>;

/// Lifecycle of the analytics table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Loading,
    Ready,
    Error(String),
}

impl SyncStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Everything the link form shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubmissionState {
    /// Backing value of the long-URL input field
    pub input: String,
    pub pending: bool,
    pub last_created_url: Option<String>,
    pub error_message: Option<String>,
    /// Transient "Copied!" affordance; clears itself after a short delay
    pub copied: bool,
}

impl SubmissionState {
    /// The copy action is only offered once a short URL exists.
    pub fn can_copy(&self) -> bool {
        self.last_created_url
            .as_deref()
            .is_some_and(|url| !url.is_empty())
    }
}

// ── Wire types ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CreateLinkRequest<'a> {
    pub url: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkResponse {
    pub short_url: String,
}
