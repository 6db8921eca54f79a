//! Outbound notifications.
//!
//! Provisioning never calls a mail service directly. It builds a
//! [`NotificationPlan`] (an explicit outbox with declared delays) and
//! [`flush`]es it once the primary write has committed. Dispatch is
//! at-most-once effort: failures are logged and reported, never retried.

mod delayed;
mod http;
mod logging;
mod memory;

pub use delayed::{BackgroundDispatcher, TokioDelayedDispatcher};
pub use http::{HttpEmailDispatcher, HttpFollowupDispatcher};
pub use logging::LogNotifier;
pub use memory::{InMemoryNotifier, RecordedNotification};

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTemplate {
    BookingConfirmation,
    Invoice,
    ContractSigning,
}

impl NotificationTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationTemplate::BookingConfirmation => "booking_confirmation",
            NotificationTemplate::Invoice => "invoice",
            NotificationTemplate::ContractSigning => "contract_signing",
        }
    }
}

/// One email: template name, recipient and the data map the template renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRequest {
    pub template: NotificationTemplate,
    pub to: String,
    pub data: Map<String, Value>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification service not configured: {0}")]
    NotConfigured(String),

    #[error("notification transport failed: {0}")]
    Transport(String),

    #[error("notification service rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Whether the credentials this dispatcher needs are present.
    fn is_configured(&self) -> bool {
        true
    }

    async fn send(&self, request: &NotificationRequest) -> Result<(), NotifyError>;
}

/// Hands a batch to an external scheduler with a requested delay. Fire-and-forget.
#[async_trait]
pub trait DelayedDispatcher: Send + Sync {
    fn is_configured(&self) -> bool {
        true
    }

    async fn schedule(
        &self,
        requests: Vec<NotificationRequest>,
        delay: Duration,
    ) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedNotification {
    pub request: NotificationRequest,
    /// `None` for immediate dispatch.
    pub delay_secs: Option<u64>,
}

/// Ordered outbox built during provisioning.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NotificationPlan {
    entries: Vec<PlannedNotification>,
}

impl NotificationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&mut self, request: NotificationRequest) {
        self.entries.push(PlannedNotification {
            request,
            delay_secs: None,
        });
    }

    pub fn after(&mut self, delay: Duration, request: NotificationRequest) {
        self.entries.push(PlannedNotification {
            request,
            delay_secs: Some(delay.as_secs()),
        });
    }

    pub fn entries(&self) -> &[PlannedNotification] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn templates(&self) -> Vec<NotificationTemplate> {
        self.entries.iter().map(|e| e.request.template).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub sent: usize,
    pub scheduled: usize,
    pub failures: Vec<String>,
}

/// Dispatch a plan: immediate entries one by one in order, delayed entries
/// grouped by delay and handed over once per group.
pub async fn flush<N, D>(plan: &NotificationPlan, immediate: &N, delayed: &D) -> FlushReport
where
    N: NotificationDispatcher + ?Sized,
    D: DelayedDispatcher + ?Sized,
{
    let mut report = FlushReport::default();
    let mut groups: BTreeMap<u64, Vec<NotificationRequest>> = BTreeMap::new();

    for entry in plan.entries() {
        match entry.delay_secs {
            None => match immediate.send(&entry.request).await {
                Ok(()) => report.sent += 1,
                Err(err) => {
                    warn!(template = entry.request.template.as_str(), error = %err, "notification failed");
                    report.failures.push(format!("{}: {err}", entry.request.template.as_str()));
                }
            },
            Some(secs) => groups.entry(secs).or_default().push(entry.request.clone()),
        }
    }

    for (secs, batch) in groups {
        let count = batch.len();
        match delayed.schedule(batch, Duration::from_secs(secs)).await {
            Ok(()) => {
                debug!(count, delay_secs = secs, "follow-up notifications scheduled");
                report.scheduled += count;
            }
            Err(err) => {
                warn!(count, delay_secs = secs, error = %err, "follow-up scheduling failed");
                report.failures.push(format!("follow-up (+{secs}s): {err}"));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(template: NotificationTemplate) -> NotificationRequest {
        NotificationRequest {
            template,
            to: "sarah@example.com".to_string(),
            data: Map::new(),
        }
    }

    #[tokio::test]
    async fn flush_splits_immediate_and_delayed() {
        let notifier = InMemoryNotifier::new();
        let mut plan = NotificationPlan::new();
        plan.now(request(NotificationTemplate::BookingConfirmation));
        plan.after(Duration::from_secs(30), request(NotificationTemplate::Invoice));
        plan.after(Duration::from_secs(30), request(NotificationTemplate::ContractSigning));

        let report = flush(&plan, &notifier, &notifier).await;
        assert_eq!(report.sent, 1);
        assert_eq!(report.scheduled, 2);
        assert!(report.failures.is_empty());

        let recorded = notifier.recorded();
        assert_eq!(recorded.len(), 3);
        assert_eq!(recorded[0].delay_secs, None);
        assert_eq!(recorded[1].delay_secs, Some(30));
        assert_eq!(recorded[2].request.template, NotificationTemplate::ContractSigning);
    }

    #[tokio::test]
    async fn failures_are_reported_not_raised() {
        let notifier = InMemoryNotifier::new();
        notifier.fail_sends(true);
        let mut plan = NotificationPlan::new();
        plan.now(request(NotificationTemplate::BookingConfirmation));
        plan.after(Duration::from_secs(30), request(NotificationTemplate::Invoice));

        let report = flush(&plan, &notifier, &notifier).await;
        assert_eq!(report.sent, 0);
        assert_eq!(report.scheduled, 0);
        assert_eq!(report.failures.len(), 2);
    }
}
