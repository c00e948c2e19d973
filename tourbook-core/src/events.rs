use async_trait::async_trait;

use crate::CoreResult;

/// Outbound booking notifications. Callers treat publishing as best effort.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> CoreResult<()>;
}

/// Serialize `event` and publish it, logging instead of failing.
pub async fn publish_json<E: serde::Serialize + Sync>(
    publisher: &dyn EventPublisher,
    topic: &str,
    key: &str,
    event: &E,
) {
    let payload = match serde_json::to_string(event) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("Failed to encode event for {}: {}", topic, e);
            return;
        }
    };
    if let Err(e) = publisher.publish(topic, key, &payload).await {
        tracing::warn!("Event {} for {} not published: {}", topic, key, e);
    }
}
