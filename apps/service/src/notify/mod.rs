//! State-change notifications.
//!
//! Delivery is best effort: one attempt per transition, failures are logged
//! and dropped, nothing is queued or retried.

pub mod payload;

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::monitoring::types::Transition;

/// Sink for state transitions.
///
/// Implementations must never fail the caller; errors are logged where they
/// happen.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, event: &Transition);
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("webhook responded with status {0}")]
    Status(reqwest::StatusCode),
}

/// Posts Slack-formatted transition messages to an incoming webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    webhook: Option<Url>,
}

impl WebhookNotifier {
    /// Create a notifier; with no webhook every send is a no-op.
    pub fn new(webhook: Option<Url>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("uppe-checks/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, webhook })
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook.is_some()
    }

    async fn deliver(&self, url: &Url, payload: &Value) -> Result<(), DeliveryError> {
        let response = self.client.post(url.clone()).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, event: &Transition) {
        let Some(url) = &self.webhook else {
            debug!("No webhook configured, dropping notification for {}", event.check_name);
            return;
        };

        let payload = payload::build_payload(event, Utc::now());
        match self.deliver(url, &payload).await {
            Ok(()) => debug!(
                "Notified {}: {}->{}",
                event.check_name, event.old_state, event.new_state
            ),
            Err(e) => warn!("Failed to notify {}: {}", event.check_name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::monitoring::types::ServiceState;

    fn transition() -> Transition {
        Transition {
            check_name: "web".into(),
            old_state: ServiceState::Unknown,
            new_state: ServiceState::Ok,
            command: "check_http -H example.com".into(),
            output: "HTTP OK | time=0.2s".into(),
            interval: Duration::from_secs(300),
            last_check: Utc::now(),
            timestamp: Utc::now(),
        }
    }

    async fn notifier_for(server: &MockServer) -> WebhookNotifier {
        let url = Url::parse(&format!("{}/services/hook", server.uri())).unwrap();
        WebhookNotifier::new(Some(url), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_posts_payload_to_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/hook"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        notifier_for(&server).await.send(&transition()).await;

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(
            body["blocks"][0]["text"]["text"],
            "web: :large_purple_circle: Unknown → :large_green_circle: OK"
        );
        assert_eq!(body["blocks"][2]["elements"][0]["text"], "Check output: `HTTP OK`");
    }

    #[tokio::test]
    async fn test_error_status_is_reported_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = notifier_for(&server).await;
        let url = notifier.webhook.clone().unwrap();
        let err = notifier.deliver(&url, &Value::Null).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Status(status) if status.as_u16() == 500));
    }

    #[tokio::test]
    async fn test_unreachable_sink_does_not_fail_send() {
        let url = Url::parse("http://127.0.0.1:9/hook").unwrap();
        let notifier = WebhookNotifier::new(Some(url), Duration::from_millis(500)).unwrap();

        notifier.send(&transition()).await;
    }

    #[tokio::test]
    async fn test_without_webhook_is_noop() {
        let notifier = WebhookNotifier::new(None, Duration::from_secs(10)).unwrap();

        assert!(!notifier.is_enabled());
        notifier.send(&transition()).await;
    }
}
