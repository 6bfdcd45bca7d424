//! Redemption event fan-out.
//!
//! Successful redemptions emit a [`RedemptionEvent`] to every registered
//! sender. Delivery is fire-and-forget: senders run in spawned tasks and
//! a failed delivery is logged, never surfaced to the redeemer. The
//! actual channels (email, push, webhooks) are external collaborators
//! behind the [`RedemptionSender`] trait.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A successful redemption, as seen by notification channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionEvent {
    pub token_id: Uuid,
    pub resource_id: Uuid,
    pub issuer_id: Uuid,
    pub redeemer_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub redeemed_at: OffsetDateTime,
    /// Post-redemption use count, for "2 of 5 invites used" messages.
    pub use_count: u32,
}

/// Error from a notification channel.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

impl NotifyError {
    #[must_use]
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery(message.into())
    }
}

/// A single notification channel.
#[async_trait]
pub trait RedemptionSender: Send + Sync {
    /// Deliver one event. Failures are logged by the fan-out, not
    /// propagated.
    async fn send(&self, event: &RedemptionEvent) -> Result<(), NotifyError>;

    /// Channel name for logging.
    fn name(&self) -> &'static str;
}

/// Sender that logs events instead of delivering them. Default channel
/// for development and tests.
#[derive(Debug, Default)]
pub struct LogSender;

#[async_trait]
impl RedemptionSender for LogSender {
    async fn send(&self, event: &RedemptionEvent) -> Result<(), NotifyError> {
        tracing::info!(
            token_id = %event.token_id,
            resource_id = %event.resource_id,
            redeemer_id = %event.redeemer_id,
            use_count = event.use_count,
            "Invite redeemed"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Fan-out over all registered senders.
#[derive(Clone, Default)]
pub struct RedemptionNotifier {
    senders: Vec<Arc<dyn RedemptionSender>>,
}

impl RedemptionNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sender.
    #[must_use]
    pub fn with_sender(mut self, sender: Arc<dyn RedemptionSender>) -> Self {
        self.senders.push(sender);
        self
    }

    /// Dispatch an event to every sender in its own task.
    ///
    /// Returns immediately; the caller's redemption never waits on or
    /// fails because of a notification channel.
    pub fn notify(&self, event: RedemptionEvent) {
        for sender in &self.senders {
            let sender = Arc::clone(sender);
            let event = event.clone();
            tokio::spawn(async move {
                if let Err(e) = sender.send(&event).await {
                    tracing::warn!(
                        channel = sender.name(),
                        token_id = %event.token_id,
                        error = %e,
                        "Redemption notification failed"
                    );
                }
            });
        }
    }
}

impl std::fmt::Debug for RedemptionNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedemptionNotifier")
            .field("senders", &self.senders.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        received: Mutex<Vec<RedemptionEvent>>,
    }

    #[async_trait]
    impl RedemptionSender for RecordingSender {
        async fn send(&self, event: &RedemptionEvent) -> Result<(), NotifyError> {
            self.received.lock().await.push(event.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    struct FailingSender;

    #[async_trait]
    impl RedemptionSender for FailingSender {
        async fn send(&self, _event: &RedemptionEvent) -> Result<(), NotifyError> {
            Err(NotifyError::delivery("channel down"))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn sample_event() -> RedemptionEvent {
        RedemptionEvent {
            token_id: Uuid::new_v4(),
            resource_id: Uuid::new_v4(),
            issuer_id: Uuid::new_v4(),
            redeemer_id: Uuid::new_v4(),
            redeemed_at: OffsetDateTime::now_utc(),
            use_count: 1,
        }
    }

    #[tokio::test]
    async fn test_notify_reaches_all_senders() {
        let recorder = Arc::new(RecordingSender::default());
        let notifier = RedemptionNotifier::new()
            .with_sender(recorder.clone())
            .with_sender(Arc::new(LogSender));

        let event = sample_event();
        notifier.notify(event.clone());

        // Spawned delivery; give the task a tick to run.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let received = recorder.received.lock().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].token_id, event.token_id);
    }

    #[tokio::test]
    async fn test_failing_sender_does_not_block_others() {
        let recorder = Arc::new(RecordingSender::default());
        let notifier = RedemptionNotifier::new()
            .with_sender(Arc::new(FailingSender))
            .with_sender(recorder.clone());

        notifier.notify(sample_event());
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(recorder.received.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_notify_with_no_senders_is_noop() {
        let notifier = RedemptionNotifier::new();
        notifier.notify(sample_event());
    }
}
