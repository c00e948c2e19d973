use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Named collections in the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    #[serde(rename = "packages")]
    Packages,
    #[serde(rename = "tours")]
    Tours,
    #[serde(rename = "travel-bookings")]
    TravelBookings,
    #[serde(rename = "tour-bookings")]
    TourBookings,
    #[serde(rename = "blogs")]
    Blogs,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Packages,
        Collection::Tours,
        Collection::TravelBookings,
        Collection::TourBookings,
        Collection::Blogs,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Collection::Packages => "packages",
            Collection::Tours => "tours",
            Collection::TravelBookings => "travel-bookings",
            Collection::TourBookings => "tour-bookings",
            Collection::Blogs => "blogs",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// Top-level field no two documents of the collection may share.
    /// Booking collections are keyed by the provider payment reference.
    pub const fn unique_key(&self) -> Option<&'static str> {
        match self {
            Collection::TravelBookings | Collection::TourBookings => Some("paymentReference"),
            _ => None,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: Collection, id: Uuid },
    #[error("Document body must be a JSON object")]
    InvalidDocument,
    #[error("Duplicate {field} in {collection}")]
    Duplicate { collection: Collection, field: &'static str },
    #[error("Document store backend failed: {0}")]
    Backend(String),
    #[error("Document (de)serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A raw document as held by the store. The id lives outside the body.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub body: Value,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn decode<T: DeserializeOwned>(self) -> StoreResult<Stored<T>> {
        let record = serde_json::from_value(self.body)?;
        Ok(Stored { id: self.id, record })
    }
}

/// A typed record together with its store-assigned id. Serializes flat:
/// `{"id": "...", ...record fields}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stored<T> {
    pub id: Uuid,
    #[serde(flatten)]
    pub record: T,
}

/// Schemaless document store. Last write wins; there is no version field.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document and return the id the store assigned to it.
    async fn insert(&self, collection: Collection, body: Value) -> StoreResult<Uuid>;

    async fn get(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Document>>;

    /// All documents of a collection in insertion order.
    async fn list(&self, collection: Collection) -> StoreResult<Vec<Document>>;

    /// Documents whose top-level `field` equals `value`.
    async fn find_eq(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Document>>;

    /// Shallow merge of `patch` into the stored body.
    async fn update(&self, collection: Collection, id: Uuid, patch: Value) -> StoreResult<()>;

    /// Overwrite the whole body, dropping keys absent from `body`.
    async fn replace(&self, collection: Collection, id: Uuid, body: Value) -> StoreResult<()>;

    async fn delete(&self, collection: Collection, id: Uuid) -> StoreResult<()>;
}

fn to_body<T: Serialize>(record: &T) -> StoreResult<Value> {
    let mut body = serde_json::to_value(record)?;
    let map = body.as_object_mut().ok_or(StoreError::InvalidDocument)?;
    map.remove("id");
    Ok(body)
}

pub async fn insert_record<T: Serialize + Sync>(
    store: &dyn DocumentStore,
    collection: Collection,
    record: &T,
) -> StoreResult<Uuid> {
    store.insert(collection, to_body(record)?).await
}

pub async fn update_record<T: Serialize + Sync>(
    store: &dyn DocumentStore,
    collection: Collection,
    id: Uuid,
    record: &T,
) -> StoreResult<()> {
    store.update(collection, id, to_body(record)?).await
}

pub async fn get_record<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    id: Uuid,
) -> StoreResult<Option<Stored<T>>> {
    match store.get(collection, id).await? {
        Some(doc) => Ok(Some(doc.decode()?)),
        None => Ok(None),
    }
}

/// Decode every document, skipping (and logging) the ones that no longer
/// match the record shape.
pub fn decode_all<T: DeserializeOwned>(collection: Collection, docs: Vec<Document>) -> Vec<Stored<T>> {
    docs.into_iter()
        .filter_map(|doc| {
            let id = doc.id;
            match doc.decode() {
                Ok(stored) => Some(stored),
                Err(e) => {
                    tracing::warn!("Skipping undecodable document {}/{}: {}", collection, id, e);
                    None
                }
            }
        })
        .collect()
}

pub async fn list_records<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
) -> StoreResult<Vec<Stored<T>>> {
    let docs = store.list(collection).await?;
    Ok(decode_all(collection, docs))
}

pub async fn find_records<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    field: &str,
    value: &Value,
) -> StoreResult<Vec<Stored<T>>> {
    let docs = store.find_eq(collection, field, value).await?;
    Ok(decode_all(collection, docs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Note {
        title: String,
        is_pinned: bool,
    }

    #[test]
    fn test_collection_names_round_trip() {
        for collection in Collection::ALL {
            assert_eq!(Collection::parse(collection.as_str()), Some(collection));
        }
        assert_eq!(Collection::TravelBookings.to_string(), "travel-bookings");
        assert_eq!(Collection::parse("flights"), None);
    }

    #[test]
    fn test_stored_serializes_flat() {
        let id = Uuid::new_v4();
        let stored = Stored { id, record: Note { title: "Lagos".into(), is_pinned: true } };
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["id"], serde_json::json!(id));
        assert_eq!(json["title"], "Lagos");
        assert_eq!(json["isPinned"], true);
    }

    #[test]
    fn test_body_drops_id_field() {
        let stored = Stored { id: Uuid::new_v4(), record: Note { title: "x".into(), is_pinned: false } };
        let body = to_body(&stored).unwrap();
        assert!(body.get("id").is_none());
        assert_eq!(body["title"], "x");
    }

    #[test]
    fn test_decode_all_skips_bad_documents() {
        let good = Document {
            id: Uuid::new_v4(),
            body: serde_json::json!({"title": "ok", "isPinned": false}),
            created_at: Utc::now(),
        };
        let bad = Document {
            id: Uuid::new_v4(),
            body: serde_json::json!({"title": 42}),
            created_at: Utc::now(),
        };
        let notes: Vec<Stored<Note>> = decode_all(Collection::Blogs, vec![good, bad]);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].record.title, "ok");
    }
}
