use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::{DelayedDispatcher, NotificationDispatcher, NotificationRequest, NotifyError};

/// Writes notifications to the log instead of sending them (`notifications.mode = "log"`).
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl NotificationDispatcher for LogNotifier {
    async fn send(&self, request: &NotificationRequest) -> Result<(), NotifyError> {
        info!(
            template = request.template.as_str(),
            to = %request.to,
            fields = request.data.len(),
            "notification (log mode)"
        );
        Ok(())
    }
}

#[async_trait]
impl DelayedDispatcher for LogNotifier {
    async fn schedule(
        &self,
        requests: Vec<NotificationRequest>,
        delay: Duration,
    ) -> Result<(), NotifyError> {
        for request in &requests {
            info!(
                template = request.template.as_str(),
                to = %request.to,
                delay_secs = delay.as_secs(),
                "follow-up notification (log mode)"
            );
        }
        Ok(())
    }
}
