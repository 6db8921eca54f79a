use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{DelayedDispatcher, NotificationDispatcher, NotificationRequest, NotifyError};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedNotification {
    pub request: NotificationRequest,
    pub delay_secs: Option<u64>,
}

/// Records every dispatch instead of sending it. Serves both the immediate
/// and the delayed role.
#[derive(Debug)]
pub struct InMemoryNotifier {
    recorded: Mutex<Vec<RecordedNotification>>,
    configured: AtomicBool,
    failing: AtomicBool,
}

impl Default for InMemoryNotifier {
    fn default() -> Self {
        Self {
            recorded: Mutex::new(Vec::new()),
            configured: AtomicBool::new(true),
            failing: AtomicBool::new(false),
        }
    }
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate missing credentials.
    pub fn set_configured(&self, configured: bool) {
        self.configured.store(configured, Ordering::SeqCst);
    }

    /// Make every dispatch fail with a transport error.
    pub fn fail_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn recorded(&self) -> Vec<RecordedNotification> {
        self.recorded
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn record(&self, request: NotificationRequest, delay_secs: Option<u64>) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("simulated outage".into()));
        }
        let mut recorded = self
            .recorded
            .lock()
            .map_err(|_| NotifyError::Transport("recorder poisoned".into()))?;
        recorded.push(RecordedNotification { request, delay_secs });
        Ok(())
    }
}

#[async_trait]
impl NotificationDispatcher for InMemoryNotifier {
    fn is_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }

    async fn send(&self, request: &NotificationRequest) -> Result<(), NotifyError> {
        self.record(request.clone(), None)
    }
}

#[async_trait]
impl DelayedDispatcher for InMemoryNotifier {
    fn is_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }

    async fn schedule(
        &self,
        requests: Vec<NotificationRequest>,
        delay: Duration,
    ) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("simulated outage".into()));
        }
        for request in requests {
            self.record(request, Some(delay.as_secs()))?;
        }
        Ok(())
    }
}
