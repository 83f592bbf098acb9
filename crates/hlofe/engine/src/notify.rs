//! Downstream notification of service changes
//!
//! After a lifecycle operation mutates a service, the placement engine is told
//! which service to look at. Delivery is best effort: the store already holds
//! the new state, so a lost notification is logged and the operation still
//! succeeds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hlofe_types::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument};

/// Content type of the Kafka REST proxy for JSON records
pub const KAFKA_JSON_CONTENT_TYPE: &str = "application/vnd.kafka.json.v2+json";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification transport failed: {0}")]
    Transport(String),

    #[error("Notification rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Notifier setup failed: {0}")]
    Setup(String),
}

/// Sink for service change notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, service_id: &EntityId) -> Result<(), NotifyError>;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Send a notification, logging instead of failing
pub async fn notify_best_effort(notifier: &dyn Notifier, service_id: &EntityId) -> bool {
    match notifier.notify(service_id).await {
        Ok(()) => {
            debug!(notifier = notifier.name(), service_id = %service_id, "Notification sent");
            true
        }
        Err(e) => {
            error!(
                notifier = notifier.name(),
                service_id = %service_id,
                error = %e,
                "Notification pipeline broken, placement engine will not see this change"
            );
            false
        }
    }
}

/// Drops notifications
#[derive(Debug, Default, Clone)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn notify(&self, service_id: &EntityId) -> Result<(), NotifyError> {
        info!(service_id = %service_id, "Notifications disabled, skipping");
        Ok(())
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

/// Notification as seen by in-process subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceNotification {
    pub service_id: EntityId,
    pub emitted_at: DateTime<Utc>,
}

/// In-process fan-out over a tokio broadcast channel
pub struct BroadcastNotifier {
    tx: broadcast::Sender<ServiceNotification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServiceNotification> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn notify(&self, service_id: &EntityId) -> Result<(), NotifyError> {
        let notification = ServiceNotification {
            service_id: service_id.clone(),
            emitted_at: Utc::now(),
        };
        if self.tx.send(notification).is_err() {
            debug!(service_id = %service_id, "No subscribers for notification");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "broadcast"
    }
}

/// Publishes to a Kafka topic through the REST proxy (Pandaproxy)
pub struct PandaproxyNotifier {
    client: reqwest::Client,
    topic_url: String,
    topic: String,
}

impl PandaproxyNotifier {
    pub fn new(
        base_url: &str,
        topic: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(NotifyError::Setup("topic must not be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            topic_url: format!("{}/topics/{}", base_url.trim_end_matches('/'), topic),
            topic,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl Notifier for PandaproxyNotifier {
    #[instrument(skip(self), fields(topic = %self.topic))]
    async fn notify(&self, service_id: &EntityId) -> Result<(), NotifyError> {
        let body = json!({
            "records": [{
                "key": service_id.as_str(),
                "value": { "service": { "id": service_id.as_str() } }
            }]
        });

        let response = self
            .client
            .post(&self.topic_url)
            .header(reqwest::header::CONTENT_TYPE, KAFKA_JSON_CONTENT_TYPE)
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        info!(service_id = %service_id, "Published service notification");
        Ok(())
    }

    fn name(&self) -> &str {
        "pandaproxy"
    }
}
