//! reqwest clients for the hosted email service and its follow-up scheduler.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{DelayedDispatcher, NotificationDispatcher, NotificationRequest, NotifyError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_default()
}

async fn post_json(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &serde_json::Value,
) -> Result<(), NotifyError> {
    let resp = client
        .post(url)
        .bearer_auth(api_key)
        .json(body)
        .send()
        .await
        .map_err(|e| NotifyError::Transport(e.to_string()))?;

    if !resp.status().is_success() {
        return Err(NotifyError::Rejected {
            status: resp.status().as_u16(),
            body: resp.text().await.unwrap_or_default(),
        });
    }
    Ok(())
}

/// `POST {url}` with `{template, to, data}`.
#[derive(Debug, Clone)]
pub struct HttpEmailDispatcher {
    client: reqwest::Client,
    url: Option<String>,
    api_key: Option<String>,
}

impl HttpEmailDispatcher {
    pub fn new(url: Option<String>, api_key: Option<String>) -> Self {
        Self {
            client: build_client(),
            url: url.filter(|u| !u.trim().is_empty()),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }
}

#[async_trait]
impl NotificationDispatcher for HttpEmailDispatcher {
    fn is_configured(&self) -> bool {
        self.url.is_some() && self.api_key.is_some()
    }

    async fn send(&self, request: &NotificationRequest) -> Result<(), NotifyError> {
        let (Some(url), Some(key)) = (&self.url, &self.api_key) else {
            return Err(NotifyError::NotConfigured("email service url/api key".into()));
        };
        let body = json!({
            "template": request.template.as_str(),
            "to": request.to,
            "data": request.data,
        });
        post_json(&self.client, url, key, &body).await?;
        debug!(template = request.template.as_str(), "email dispatched");
        Ok(())
    }
}

/// `POST {url}` with `{emails: [...], delaySeconds}`; the remote side sends later.
#[derive(Debug, Clone)]
pub struct HttpFollowupDispatcher {
    client: reqwest::Client,
    url: Option<String>,
    api_key: Option<String>,
    cap: Duration,
}

impl HttpFollowupDispatcher {
    pub fn new(url: Option<String>, api_key: Option<String>, cap: Duration) -> Self {
        Self {
            client: build_client(),
            url: url.filter(|u| !u.trim().is_empty()),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            cap,
        }
    }
}

#[async_trait]
impl DelayedDispatcher for HttpFollowupDispatcher {
    fn is_configured(&self) -> bool {
        self.url.is_some() && self.api_key.is_some()
    }

    async fn schedule(
        &self,
        requests: Vec<NotificationRequest>,
        delay: Duration,
    ) -> Result<(), NotifyError> {
        let (Some(url), Some(key)) = (&self.url, &self.api_key) else {
            return Err(NotifyError::NotConfigured("follow-up service url/api key".into()));
        };
        let emails: Vec<serde_json::Value> = requests
            .iter()
            .map(|r| json!({ "template": r.template.as_str(), "to": r.to, "data": r.data }))
            .collect();
        let body = json!({
            "emails": emails,
            "delaySeconds": delay.min(self.cap).as_secs(),
        });
        post_json(&self.client, url, key, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_credentials_are_not_configured() {
        let email = HttpEmailDispatcher::new(Some("https://mail.example.com/send".into()), Some("  ".into()));
        assert!(!email.is_configured());
        let email = HttpEmailDispatcher::new(Some("https://mail.example.com/send".into()), Some("k".into()));
        assert!(email.is_configured());

        let followup = HttpFollowupDispatcher::new(None, Some("k".into()), Duration::from_secs(45));
        assert!(!followup.is_configured());
    }

    #[tokio::test]
    async fn unconfigured_send_fails_fast() {
        let email = HttpEmailDispatcher::new(None, None);
        let request = NotificationRequest {
            template: crate::notify::NotificationTemplate::Invoice,
            to: "a@example.com".into(),
            data: serde_json::Map::new(),
        };
        assert!(matches!(email.send(&request).await, Err(NotifyError::NotConfigured(_))));
    }
}
