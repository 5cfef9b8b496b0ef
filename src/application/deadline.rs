use crate::domain::notification::Notification;
use crate::domain::ports::Notifier;
use crate::error::{EngineError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Runs a collaborator call with an upper bound on its latency.
///
/// Expiry is reported as `EngineError::Timeout`, which callers treat as
/// retryable.
pub async fn within<T, F>(limit: Duration, operation: &'static str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                operation,
                timeout_ms = limit.as_millis() as u64,
                "collaborator call timed out"
            );
            Err(EngineError::Timeout { operation })
        }
    }
}

/// Sends a notification, logging and dropping any failure.
pub async fn notify_quietly(notifier: &dyn Notifier, limit: Duration, notification: Notification) {
    let kind = notification.kind;
    let entity_id = notification.entity_id.clone();
    if let Err(e) = within(limit, "notifier", notifier.notify(notification)).await {
        warn!(?kind, entity_id = %entity_id, error = %e, "failed to send notification");
    }
}
