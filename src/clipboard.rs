//! Clipboard access for the "copy short URL" action.

use async_trait::async_trait;

use crate::error::DashboardError;

#[async_trait]
pub trait ClipboardSink: Send + Sync {
    async fn set_text(&self, text: &str) -> Result<(), DashboardError>;
}

/// OS clipboard via `arboard`. A fresh handle is opened per copy since the
/// action is rare and some platforms dislike long-lived handles.
///
/// Opening and dropping the handle can block (X11 waits for a clipboard
/// manager to take ownership), so the work runs on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

#[async_trait]
impl ClipboardSink for SystemClipboard {
    async fn set_text(&self, text: &str) -> Result<(), DashboardError> {
        let text = text.to_owned();
        tokio::task::spawn_blocking(move || {
            let mut clipboard =
                arboard::Clipboard::new().map_err(|e| DashboardError::Clipboard(e.to_string()))?;
            clipboard
                .set_text(text)
                .map_err(|e| DashboardError::Clipboard(e.to_string()))
        })
        .await
        .map_err(|e| DashboardError::Clipboard(format!("clipboard task failed: {e}")))?
    }
}
