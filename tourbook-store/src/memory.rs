use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use tourbook_core::pending::{PendingWrite, PendingWriteLog};
use tourbook_core::{Collection, CoreResult, Document, DocumentStore, StoreError, StoreResult};

/// Process-local document store. Used for development runs and tests.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, collection: Collection, body: Value) -> StoreResult<Uuid> {
        if !body.is_object() {
            return Err(StoreError::InvalidDocument);
        }
        let id = Uuid::new_v4();
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();
        if let Some(field) = collection.unique_key() {
            if let Some(key) = body.get(field).filter(|v| !v.is_null()) {
                if docs.iter().any(|d| d.body.get(field) == Some(key)) {
                    return Err(StoreError::Duplicate { collection, field });
                }
            }
        }
        docs.push(Document {
            id,
            body,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn get(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    async fn list(&self, collection: Collection) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;
        Ok(collections.get(&collection).cloned().unwrap_or_default())
    }

    async fn find_eq(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| d.body.get(field) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update(&self, collection: Collection, id: Uuid, patch: Value) -> StoreResult<()> {
        let patch = match patch {
            Value::Object(map) => map,
            _ => return Err(StoreError::InvalidDocument),
        };
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or(StoreError::NotFound { collection, id })?;

        if let Value::Object(body) = &mut doc.body {
            for (key, value) in patch {
                body.insert(key, value);
            }
        }
        Ok(())
    }

    async fn replace(&self, collection: Collection, id: Uuid, body: Value) -> StoreResult<()> {
        if !body.is_object() {
            return Err(StoreError::InvalidDocument);
        }
        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or(StoreError::NotFound { collection, id })?;
        doc.body = body;
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> StoreResult<()> {
        let mut collections = self.collections.write().await;
        let docs = collections
            .get_mut(&collection)
            .ok_or(StoreError::NotFound { collection, id })?;
        let pos = docs
            .iter()
            .position(|d| d.id == id)
            .ok_or(StoreError::NotFound { collection, id })?;
        docs.remove(pos);
        Ok(())
    }
}

/// Pending-write log kept in process memory. Entries do not survive a
/// restart; configure Redis for that.
#[derive(Default)]
pub struct MemoryPendingLog {
    entries: RwLock<Vec<PendingWrite>>,
}

impl MemoryPendingLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PendingWriteLog for MemoryPendingLog {
    async fn append(&self, entry: &PendingWrite) -> CoreResult<()> {
        self.entries.write().await.push(entry.clone());
        Ok(())
    }

    async fn list(&self) -> CoreResult<Vec<PendingWrite>> {
        Ok(self.entries.read().await.clone())
    }

    async fn record_attempt(&self, entry: &PendingWrite) -> CoreResult<()> {
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.iter_mut().find(|e| e.id == entry.id) {
            *existing = entry.clone();
        }
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> CoreResult<()> {
        self.entries.write().await.retain(|e| e.id != id);
        Ok(())
    }
}
