use async_trait::async_trait;
use evently_shared::models::DomainEvent;
use tracing::{debug, warn};

/// Outbound channel for domain events (Kafka in production).
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Writes events to the log instead of a broker.
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        debug!(topic, key, payload, "Domain event");
        Ok(())
    }
}

/// Publish without failing the caller: the write it describes already happened.
pub async fn emit<E: DomainEvent>(publisher: &dyn EventPublisher, event: &E) {
    let payload = match serde_json::to_string(event) {
        Ok(p) => p,
        Err(e) => {
            warn!("Failed to serialize {} event: {}", event.topic(), e);
            return;
        }
    };

    if let Err(e) = publisher.publish(event.topic(), &event.key(), &payload).await {
        warn!("Failed to publish {} event: {}", event.topic(), e);
    }
}
