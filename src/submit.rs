//! Link submission flow: validate a long URL, create the short link, then
//! nudge the sync engine so the new row shows up without waiting for the
//! next poll.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use reqwest::Url;
use tokio::sync::watch;

use crate::{
    client::LinkCreator,
    clipboard::ClipboardSink,
    error::DashboardError,
    models::SubmissionState,
    sync::RefreshTrigger,
};

/// How long the "Copied!" flag stays up after the last copy press.
pub const COPIED_RESET: Duration = Duration::from_secs(2);

/// Check that `input` looks like something the shortener will accept and
/// return it trimmed.
pub fn validate_long_url(input: &str) -> Result<String, DashboardError> {
    let url = input.trim();
    if url.is_empty() {
        return Err(DashboardError::InvalidInput("URL must not be empty.".into()));
    }

    let parsed = Url::parse(url)
        .map_err(|_| DashboardError::InvalidInput(format!("'{url}' is not a valid URL.")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(DashboardError::InvalidInput(
            "URL must start with http:// or https://".into(),
        ));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(DashboardError::InvalidInput("URL must include a host.".into()));
    }

    Ok(url.to_owned())
}

/// Releases the pending flag if the submission future is dropped before it
/// reaches either completion branch.
struct PendingGuard<'a>(&'a watch::Sender<SubmissionState>);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0
            .send_if_modified(|state| std::mem::replace(&mut state.pending, false));
    }
}

struct FlowInner {
    creator: Arc<dyn LinkCreator>,
    refresher: Arc<dyn RefreshTrigger>,
    clipboard: Arc<dyn ClipboardSink>,
    state: watch::Sender<SubmissionState>,
    copy_generation: AtomicU64,
    copied_reset: Duration,
}

#[derive(Clone)]
pub struct SubmissionFlow {
    inner: Arc<FlowInner>,
}

impl SubmissionFlow {
    pub fn new(
        creator: Arc<dyn LinkCreator>,
        refresher: Arc<dyn RefreshTrigger>,
        clipboard: Arc<dyn ClipboardSink>,
    ) -> Self {
        let (state, _) = watch::channel(SubmissionState::default());
        Self {
            inner: Arc::new(FlowInner {
                creator,
                refresher,
                clipboard,
                state,
                copy_generation: AtomicU64::new(0),
                copied_reset: COPIED_RESET,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SubmissionState> {
        self.inner.state.subscribe()
    }

    pub fn current(&self) -> SubmissionState {
        self.inner.state.borrow().clone()
    }

    /// Update the backing value of the long-URL input.
    pub fn set_input(&self, value: impl Into<String>) {
        let value = value.into();
        self.inner
            .state
            .send_if_modified(|state| {
                if state.input == value {
                    return false;
                }
                state.input = value;
                true
            });
    }

    /// Submit whatever is currently in the input field.
    pub async fn submit_input(&self) -> Result<String, DashboardError> {
        let input = self.inner.state.borrow().input.clone();
        self.submit(&input).await
    }

    /// Shorten `long_url`.
    ///
    /// Invalid input is rejected before any request and leaves the state
    /// untouched. Otherwise the previous result and error are cleared, the
    /// link is created, and on success the sync engine is asked to refresh
    /// exactly once. A failure keeps the analytics table as it was.
    pub async fn submit(&self, long_url: &str) -> Result<String, DashboardError> {
        let url = validate_long_url(long_url)?;

        let acquired = self.inner.state.send_if_modified(|state| {
            if state.pending {
                return false;
            }
            state.pending = true;
            state.last_created_url = None;
            state.error_message = None;
            // The URL it referred to is gone; retire any running reset timer too.
            state.copied = false;
            self.inner.copy_generation.fetch_add(1, Ordering::SeqCst);
            true
        });
        if !acquired {
            return Err(DashboardError::SubmissionPending);
        }
        let _pending = PendingGuard(&self.inner.state);

        match self.inner.creator.create_link(&url).await {
            Ok(short_url) => {
                tracing::info!("Shortened {} -> {}", url, short_url);
                self.inner.state.send_modify(|state| {
                    state.pending = false;
                    state.last_created_url = Some(short_url.clone());
                    state.input.clear();
                });
                self.inner.refresher.refresh_now();
                Ok(short_url)
            }
            Err(e) => {
                tracing::warn!("Failed to shorten {}: {}", url, e);
                self.inner.state.send_modify(|state| {
                    state.pending = false;
                    state.error_message = Some(e.to_string());
                });
                Err(e)
            }
        }
    }

    /// Put the last created short URL on the clipboard and raise `copied`
    /// for two seconds. Each press restarts the window.
    pub async fn copy_short_url(&self) -> Result<(), DashboardError> {
        let url = {
            let state = self.inner.state.borrow();
            match &state.last_created_url {
                Some(url) if state.can_copy() => url.clone(),
                _ => return Err(DashboardError::NothingToCopy),
            }
        };

        self.inner.clipboard.set_text(&url).await?;

        let generation = self.inner.copy_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.state.send_if_modified(|state| !std::mem::replace(&mut state.copied, true));

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.copied_reset).await;
            inner.state.send_if_modified(|state| {
                // A newer press owns the flag now.
                if inner.copy_generation.load(Ordering::SeqCst) != generation {
                    return false;
                }
                std::mem::replace(&mut state.copied, false)
            });
        });

        Ok(())
    }
}
