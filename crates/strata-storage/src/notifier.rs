//! Notifier that records what it was asked to send.

use async_trait::async_trait;
use tokio::sync::Mutex;

use strata_core::{Notification, Notifier, Result};

/// A [`Notifier`] that keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Creates an empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, in order.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<()> {
        tracing::info!(?notification, "Notification recorded");
        self.sent.lock().await.push(notification);
        Ok(())
    }
}
