use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{DelayedDispatcher, NotificationDispatcher, NotificationRequest, NotifyError};

/// In-process follow-up scheduler: sleeps on a tokio task, then sends
/// through the wrapped dispatcher. Pending sends are lost on shutdown.
#[derive(Clone)]
pub struct TokioDelayedDispatcher {
    inner: Arc<dyn NotificationDispatcher>,
    cap: Duration,
}

impl TokioDelayedDispatcher {
    pub fn new(inner: Arc<dyn NotificationDispatcher>, cap: Duration) -> Self {
        Self { inner, cap }
    }

    pub fn effective_delay(&self, requested: Duration) -> Duration {
        requested.min(self.cap)
    }
}

#[async_trait]
impl DelayedDispatcher for TokioDelayedDispatcher {
    fn is_configured(&self) -> bool {
        self.inner.is_configured()
    }

    async fn schedule(
        &self,
        requests: Vec<NotificationRequest>,
        delay: Duration,
    ) -> Result<(), NotifyError> {
        let delay = self.effective_delay(delay);
        let inner = Arc::clone(&self.inner);
        debug!(count = requests.len(), delay_secs = delay.as_secs(), "follow-ups queued");

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            for request in &requests {
                if let Err(err) = inner.send(request).await {
                    warn!(template = request.template.as_str(), error = %err, "follow-up send failed");
                }
            }
        });
        Ok(())
    }
}

/// Hands each immediate send to a tokio task and returns at once, so a slow
/// mail service never holds up the request that planned the email. A
/// failure inside the task is logged; the caller has already moved on.
#[derive(Clone)]
pub struct BackgroundDispatcher {
    inner: Arc<dyn NotificationDispatcher>,
}

impl BackgroundDispatcher {
    pub fn new(inner: Arc<dyn NotificationDispatcher>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl NotificationDispatcher for BackgroundDispatcher {
    fn is_configured(&self) -> bool {
        self.inner.is_configured()
    }

    async fn send(&self, request: &NotificationRequest) -> Result<(), NotifyError> {
        let inner = Arc::clone(&self.inner);
        let request = request.clone();
        tokio::spawn(async move {
            if let Err(err) = inner.send(&request).await {
                warn!(template = request.template.as_str(), error = %err, "background send failed");
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{InMemoryNotifier, NotificationTemplate};
    use serde_json::Map;

    #[test]
    fn delay_is_capped() {
        let d = TokioDelayedDispatcher::new(Arc::new(InMemoryNotifier::new()), Duration::from_secs(45));
        assert_eq!(d.effective_delay(Duration::from_secs(30)), Duration::from_secs(30));
        assert_eq!(d.effective_delay(Duration::from_secs(300)), Duration::from_secs(45));
    }

    #[tokio::test]
    async fn sends_after_the_capped_delay() {
        let notifier = Arc::new(InMemoryNotifier::new());
        let d = TokioDelayedDispatcher::new(notifier.clone(), Duration::from_millis(20));
        let request = NotificationRequest {
            template: NotificationTemplate::Invoice,
            to: "sarah@example.com".to_string(),
            data: Map::new(),
        };

        d.schedule(vec![request], Duration::from_secs(30)).await.unwrap();
        assert!(notifier.recorded().is_empty());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(notifier.recorded().len(), 1);
    }

    /// Holds every send until the gate opens.
    struct Gated {
        gate: Arc<tokio::sync::Notify>,
        sink: Arc<InMemoryNotifier>,
    }

    #[async_trait]
    impl NotificationDispatcher for Gated {
        async fn send(&self, request: &NotificationRequest) -> Result<(), NotifyError> {
            self.gate.notified().await;
            self.sink.send(request).await
        }
    }

    #[tokio::test]
    async fn background_send_returns_before_a_slow_service_answers() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let sink = Arc::new(InMemoryNotifier::new());
        let d = BackgroundDispatcher::new(Arc::new(Gated {
            gate: gate.clone(),
            sink: sink.clone(),
        }));
        let request = NotificationRequest {
            template: NotificationTemplate::BookingConfirmation,
            to: "sarah@example.com".to_string(),
            data: Map::new(),
        };

        tokio::time::timeout(Duration::from_millis(200), d.send(&request))
            .await
            .expect("send must not wait for the service")
            .unwrap();
        assert!(sink.recorded().is_empty());

        gate.notify_one();
        for _ in 0..50 {
            if !sink.recorded().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(sink.recorded().len(), 1);
    }
}
