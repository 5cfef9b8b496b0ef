use crate::domain::notification::Notification;
use crate::domain::ports::Notifier;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Emits notifications as structured log events.
///
/// Stands in for the push/SMS collaborator when running the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) -> Result<()> {
        info!(
            target: "notifications",
            user_id = %notification.user_id,
            kind = ?notification.kind,
            priority = ?notification.priority,
            entity_id = %notification.entity_id,
            data = %notification.data,
            "{}: {}",
            notification.title,
            notification.message
        );
        Ok(())
    }
}

/// Keeps every notification it receives, in order.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<()> {
        self.sent.lock().await.push(notification);
        Ok(())
    }
}
