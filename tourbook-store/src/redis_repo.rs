use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;
use tourbook_core::pending::{PendingWrite, PendingWriteLog};
use tourbook_core::{CoreError, CoreResult};

const PENDING_WRITES_KEY: &str = "tourbook:pending-writes";

/// Pending-write log kept in one Redis hash, field = entry id.
#[derive(Clone)]
pub struct RedisPendingLog {
    client: redis::Client,
}

fn provider(e: redis::RedisError) -> CoreError {
    CoreError::ProviderError(format!("redis: {}", e))
}

impl RedisPendingLog {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    async fn put(&self, entry: &PendingWrite) -> CoreResult<()> {
        let payload = serde_json::to_string(entry)
            .map_err(|e| CoreError::InternalError(e.to_string()))?;
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(provider)?;
        conn.hset::<_, _, _, ()>(PENDING_WRITES_KEY, entry.id.to_string(), payload)
            .await
            .map_err(provider)
    }
}

#[async_trait]
impl PendingWriteLog for RedisPendingLog {
    async fn append(&self, entry: &PendingWrite) -> CoreResult<()> {
        self.put(entry).await?;
        info!("Pending write {} logged for reference {}", entry.id, entry.payment_reference);
        Ok(())
    }

    async fn list(&self) -> CoreResult<Vec<PendingWrite>> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(provider)?;
        let raw: HashMap<String, String> = conn.hgetall(PENDING_WRITES_KEY).await.map_err(provider)?;

        let mut entries: Vec<PendingWrite> = raw
            .into_iter()
            .filter_map(|(field, payload)| match serde_json::from_str(&payload) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Unreadable pending write {}: {}", field, e);
                    None
                }
            })
            .collect();
        entries.sort_by_key(|e| e.logged_at);
        Ok(entries)
    }

    async fn record_attempt(&self, entry: &PendingWrite) -> CoreResult<()> {
        self.put(entry).await
    }

    async fn remove(&self, id: Uuid) -> CoreResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await.map_err(provider)?;
        conn.hdel::<_, _, ()>(PENDING_WRITES_KEY, id.to_string())
            .await
            .map_err(provider)
    }
}
