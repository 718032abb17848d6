use crate::{
    error::NotifyError,
    retry::{RetryDisposition, RetryError, RetryPolicy},
};
use async_trait::async_trait;
use model::events::{Event, ImportEvent};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Receives terminal import events. Delivery problems stay inside the notifier.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: ImportEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, event: ImportEvent) {
        debug!(event_type = event.event_type(), "No notifier configured, event dropped");
    }
}

/// A registered webhook. Without an `event_type` it receives every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookEndpoint {
    pub url: String,
    pub event_type: Option<String>,
    pub enabled: bool,
}

impl WebhookEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        WebhookEndpoint {
            url: url.into(),
            event_type: None,
            enabled: true,
        }
    }

    pub fn for_event(url: impl Into<String>, event_type: impl Into<String>) -> Self {
        WebhookEndpoint {
            url: url.into(),
            event_type: Some(event_type.into()),
            enabled: true,
        }
    }

    pub fn accepts(&self, event_type: &str) -> bool {
        self.enabled
            && self
                .event_type
                .as_deref()
                .is_none_or(|subscribed| subscribed == event_type)
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    event_type: &'a str,
    payload: &'a ImportEvent,
}

/// POSTs events as JSON to every enabled endpoint subscribed to them.
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoints: Vec<WebhookEndpoint>,
    policy: RetryPolicy,
}

impl WebhookNotifier {
    pub fn new(endpoints: Vec<WebhookEndpoint>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(WebhookNotifier {
            client,
            endpoints,
            policy: RetryPolicy::for_webhooks(),
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn endpoints(&self) -> &[WebhookEndpoint] {
        &self.endpoints
    }

    /// Sends a `webhook.test` event to `url` and reports the outcome.
    pub async fn send_test(&self, url: &str) -> Result<(), NotifyError> {
        let event = ImportEvent::Test {
            timestamp: chrono::Utc::now(),
        };
        self.deliver(url, &event).await
    }

    async fn post_once(&self, url: &str, envelope: &Envelope<'_>) -> Result<(), NotifyError> {
        let response = self.client.post(url).json(envelope).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Status(status))
        }
    }

    async fn deliver(&self, url: &str, event: &ImportEvent) -> Result<(), NotifyError> {
        let envelope = Envelope {
            event_type: event.event_type(),
            payload: event,
        };

        let result = self
            .policy
            .run(
                || self.post_once(url, &envelope),
                classify_delivery_error,
                |attempt, err, delay| {
                    warn!(
                        url,
                        attempt,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "Webhook delivery failed, retrying"
                    );
                },
            )
            .await;

        match result {
            Ok(()) => {
                info!(url, event_type = envelope.event_type, "Webhook delivered");
                Ok(())
            }
            Err(RetryError::Fatal(err)) => Err(err),
            Err(RetryError::AttemptsExceeded { attempts, last }) => Err(NotifyError::Exhausted {
                attempts,
                last_error: last.to_string(),
            }),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: ImportEvent) {
        let event_type = event.event_type();
        for endpoint in self.endpoints.iter().filter(|e| e.accepts(event_type)) {
            if let Err(err) = self.deliver(&endpoint.url, &event).await {
                warn!(url = %endpoint.url, event_type, error = %err, "Webhook notification dropped");
            }
        }
    }
}

fn classify_delivery_error(err: &NotifyError) -> RetryDisposition {
    match err {
        NotifyError::Status(status)
            if status.is_client_error()
                && *status != reqwest::StatusCode::REQUEST_TIMEOUT
                && *status != reqwest::StatusCode::TOO_MANY_REQUESTS =>
        {
            RetryDisposition::Stop
        }
        _ => RetryDisposition::Retry,
    }
}
