use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Collection, CoreResult};

/// A booking that was paid for but could not be written. Kept until the
/// reconciler manages to insert it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingWrite {
    pub id: Uuid,
    pub collection: Collection,
    pub payment_reference: String,
    pub document: serde_json::Value,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub logged_at: DateTime<Utc>,
}

impl PendingWrite {
    pub fn new(
        collection: Collection,
        payment_reference: String,
        document: serde_json::Value,
        error: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            collection,
            payment_reference,
            document,
            attempts: 1,
            last_error: Some(error),
            logged_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait PendingWriteLog: Send + Sync {
    async fn append(&self, entry: &PendingWrite) -> CoreResult<()>;

    async fn list(&self) -> CoreResult<Vec<PendingWrite>>;

    /// Overwrite an existing entry (attempt counter, last error).
    async fn record_attempt(&self, entry: &PendingWrite) -> CoreResult<()>;

    async fn remove(&self, id: Uuid) -> CoreResult<()>;
}
