use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use tourbook_catalog::ProductKind;
use tourbook_core::events::{publish_json, EventPublisher};
use tourbook_core::{Collection, DocumentStore, StoreError, Stored};
use tourbook_shared::models::events::{BookingStatusChangedEvent, BOOKING_STATUS_CHANGED_TOPIC};

use crate::models::{is_legacy, Booking, BookingStatus};

#[derive(Debug, thiserror::Error)]
pub enum RecordsError {
    #[error("Booking not found: {0}/{1}")]
    NotFound(Collection, Uuid),

    #[error("Invalid status change from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type RecordsResult<T> = Result<T, RecordsError>;

/// Admin dashboard summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_packages: usize,
    pub total_tours: usize,
    pub total_bookings: usize,
    pub travel_bookings: usize,
    pub tour_bookings: usize,
    pub pending_bookings: usize,
    pub total_revenue: f64,
    pub recent_bookings: Vec<Stored<Booking>>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeReport {
    pub scanned: usize,
    pub rewritten: usize,
    pub unreadable: usize,
}

const RECENT_LIMIT: usize = 5;

const BOOKING_KINDS: [ProductKind; 2] = [ProductKind::Package, ProductKind::Tour];

/// Newest first; bookings without a creation time go last.
fn newest_first(bookings: &mut [Stored<Booking>]) {
    bookings.sort_by_key(|b| Reverse(b.record.created_at));
}

/// Back-office view of the two booking collections.
pub struct BookingRecords {
    store: Arc<dyn DocumentStore>,
    events: Arc<dyn EventPublisher>,
}

impl BookingRecords {
    pub fn new(store: Arc<dyn DocumentStore>, events: Arc<dyn EventPublisher>) -> Self {
        Self { store, events }
    }

    async fn load(&self, kind: ProductKind) -> RecordsResult<Vec<Stored<Booking>>> {
        let collection = kind.booking_collection();
        let docs = self.store.list(collection).await?;
        Ok(docs
            .into_iter()
            .filter_map(|doc| {
                let id = doc.id;
                match Booking::from_document(doc, kind) {
                    Ok(stored) => Some(stored),
                    Err(e) => {
                        warn!("Skipping unreadable booking {}/{}: {}", collection, id, e);
                        None
                    }
                }
            })
            .collect())
    }

    /// Bookings of one kind, or both, newest first.
    pub async fn list(&self, kind: Option<ProductKind>) -> RecordsResult<Vec<Stored<Booking>>> {
        let mut all = Vec::new();
        for k in BOOKING_KINDS {
            if kind.is_none() || kind == Some(k) {
                all.extend(self.load(k).await?);
            }
        }
        newest_first(&mut all);
        Ok(all)
    }

    pub async fn get(&self, kind: ProductKind, id: Uuid) -> RecordsResult<Stored<Booking>> {
        let collection = kind.booking_collection();
        let doc = self
            .store
            .get(collection, id)
            .await?
            .ok_or(RecordsError::NotFound(collection, id))?;
        Ok(Booking::from_document(doc, kind)?)
    }

    /// Admin status change. Only `status` and `updatedAt` are written.
    pub async fn set_status(
        &self,
        kind: ProductKind,
        id: Uuid,
        next: BookingStatus,
        changed_by: &str,
    ) -> RecordsResult<Stored<Booking>> {
        let mut stored = self.get(kind, id).await?;
        let from = stored.record.status;
        if !from.can_transition_to(next) {
            return Err(RecordsError::InvalidTransition { from, to: next });
        }

        let now = Utc::now();
        let collection = kind.booking_collection();
        self.store
            .update(collection, id, json!({"status": next, "updatedAt": now}))
            .await?;
        stored.record.status = next;
        stored.record.updated_at = Some(now);
        info!("Booking {}/{} moved {} -> {} by {}", collection, id, from, next, changed_by);

        let event = BookingStatusChangedEvent {
            booking_id: id,
            collection: collection.to_string(),
            from: from.to_string(),
            to: next.to_string(),
            changed_by: changed_by.to_string(),
            timestamp: now.timestamp(),
        };
        publish_json(self.events.as_ref(), BOOKING_STATUS_CHANGED_TOPIC, &id.to_string(), &event).await;

        Ok(stored)
    }

    /// Counts, revenue and the most recent bookings. Revenue is the sum of
    /// booking amounts, cancelled bookings excluded.
    pub async fn overview(&self) -> RecordsResult<Overview> {
        let total_packages = self.store.list(Collection::Packages).await?.len();
        let total_tours = self.store.list(Collection::Tours).await?.len();

        let travel = self.load(ProductKind::Package).await?;
        let tours = self.load(ProductKind::Tour).await?;
        let (travel_bookings, tour_bookings) = (travel.len(), tours.len());

        let mut all: Vec<Stored<Booking>> = travel.into_iter().chain(tours).collect();
        let pending_bookings = all.iter().filter(|b| b.record.status == BookingStatus::Pending).count();
        let total_revenue: f64 = all
            .iter()
            .filter(|b| b.record.status != BookingStatus::Cancelled)
            .map(|b| b.record.amount)
            .sum();

        all.retain(|b| b.record.created_at.is_some());
        newest_first(&mut all);
        all.truncate(RECENT_LIMIT);

        Ok(Overview {
            total_packages,
            total_tours,
            total_bookings: travel_bookings + tour_bookings,
            travel_bookings,
            tour_bookings,
            pending_bookings,
            total_revenue,
            recent_bookings: all,
        })
    }

    /// Rewrite bookings stored with older field names or status spellings
    /// into the canonical layout. Documents that cannot be read are left
    /// untouched.
    pub async fn normalize_legacy(&self) -> RecordsResult<NormalizeReport> {
        let mut report = NormalizeReport::default();

        for kind in BOOKING_KINDS {
            let collection = kind.booking_collection();
            for doc in self.store.list(collection).await? {
                report.scanned += 1;
                if !is_legacy(&doc.body) {
                    continue;
                }

                let id = doc.id;
                let booking = match Booking::from_document(doc, kind) {
                    Ok(stored) => stored.record,
                    Err(e) => {
                        warn!("Cannot normalise {}/{}: {}", collection, id, e);
                        report.unreadable += 1;
                        continue;
                    }
                };
                let body = serde_json::to_value(&booking).map_err(StoreError::from)?;
                self.store.replace(collection, id, body).await?;
                report.rewritten += 1;
            }
        }

        info!(
            "Normalised {} of {} bookings ({} unreadable)",
            report.rewritten, report.scanned, report.unreadable
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use serde_json::Value;
    use std::sync::Mutex;
    use tourbook_core::CoreResult;
    use tourbook_store::MemoryDocumentStore;

    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, topic: &str, _key: &str, payload: &str) -> CoreResult<()> {
            self.sent.lock().unwrap().push((topic.to_string(), payload.to_string()));
            Ok(())
        }
    }

    fn setup() -> (Arc<MemoryDocumentStore>, Arc<RecordingPublisher>, BookingRecords) {
        let store = Arc::new(MemoryDocumentStore::new());
        let events = Arc::new(RecordingPublisher::default());
        let records = BookingRecords::new(store.clone(), events.clone());
        (store, events, records)
    }

    fn booking(status: &str, amount: f64, minutes_ago: i64) -> Value {
        json!({
            "productTitle": "Zanzibar",
            "customerName": "Ada Lovelace",
            "amount": amount,
            "paymentStatus": "paid",
            "status": status,
            "createdAt": Utc::now() - Duration::minutes(minutes_ago),
        })
    }

    #[tokio::test]
    async fn test_list_newest_first_across_kinds() {
        let (store, _, records) = setup();
        let old = store.insert(Collection::TravelBookings, booking("confirmed", 10.0, 30)).await.unwrap();
        let new = store.insert(Collection::TourBookings, booking("confirmed", 10.0, 1)).await.unwrap();

        let all = records.list(None).await.unwrap();
        assert_eq!(all.iter().map(|b| b.id).collect::<Vec<_>>(), vec![new, old]);
        assert_eq!(all[0].record.kind, Some(ProductKind::Tour));

        let tours = records.list(Some(ProductKind::Tour)).await.unwrap();
        assert_eq!(tours.len(), 1);
    }

    #[tokio::test]
    async fn test_status_change_and_event() {
        let (store, events, records) = setup();
        let id = store.insert(Collection::TravelBookings, booking("pending", 10.0, 1)).await.unwrap();

        let updated = records
            .set_status(ProductKind::Package, id, BookingStatus::Confirmed, "admin@example.com")
            .await
            .unwrap();
        assert_eq!(updated.record.status, BookingStatus::Confirmed);

        let doc = store.get(Collection::TravelBookings, id).await.unwrap().unwrap();
        assert_eq!(doc.body["status"], "confirmed");
        assert_eq!(doc.body["paymentStatus"], "paid");

        let sent = events.sent.lock().unwrap();
        assert_eq!(sent[0].0, BOOKING_STATUS_CHANGED_TOPIC);
        assert!(sent[0].1.contains("\"to\":\"confirmed\""));
    }

    #[tokio::test]
    async fn test_status_change_rules() {
        let (store, _, records) = setup();
        let id = store.insert(Collection::TourBookings, booking("completed", 10.0, 1)).await.unwrap();

        assert!(matches!(
            records.set_status(ProductKind::Tour, id, BookingStatus::Confirmed, "admin").await,
            Err(RecordsError::InvalidTransition { .. })
        ));
        assert!(matches!(
            records.set_status(ProductKind::Package, id, BookingStatus::Confirmed, "admin").await,
            Err(RecordsError::NotFound(..))
        ));
    }

    #[tokio::test]
    async fn test_overview() {
        let (store, _, records) = setup();
        store.insert(Collection::Packages, json!({"title": "p"})).await.unwrap();
        for i in 0..6 {
            store.insert(Collection::TravelBookings, booking("confirmed", 100.0, i)).await.unwrap();
        }
        store.insert(Collection::TourBookings, booking("cancelled", 500.0, 0)).await.unwrap();
        store.insert(Collection::TourBookings, booking("pending", 50.0, 100)).await.unwrap();

        let overview = records.overview().await.unwrap();
        assert_eq!(overview.total_packages, 1);
        assert_eq!(overview.total_tours, 0);
        assert_eq!(overview.total_bookings, 8);
        assert_eq!(overview.tour_bookings, 2);
        assert_eq!(overview.pending_bookings, 1);
        assert_eq!(overview.total_revenue, 650.0);
        assert_eq!(overview.recent_bookings.len(), RECENT_LIMIT);
    }

    #[tokio::test]
    async fn test_normalize_rewrites_legacy_documents() {
        let (store, _, records) = setup();
        let legacy = store
            .insert(
                Collection::TourBookings,
                json!({
                    "tourId": "t1",
                    "tourTitle": "Lagos Food Walk",
                    "participants": 2,
                    "paymentStatus": "Paid",
                    "status": "Confirmed",
                    "transactionRef": "T-1"
                }),
            )
            .await
            .unwrap();
        store.insert(Collection::TravelBookings, booking("confirmed", 1.0, 1)).await.unwrap();

        let report = records.normalize_legacy().await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.rewritten, 1);

        let body = store.get(Collection::TourBookings, legacy).await.unwrap().unwrap().body;
        assert!(body.get("tourId").is_none());
        assert!(body.get("transactionRef").is_none());
        assert_eq!(body["productId"], "t1");
        assert_eq!(body["paymentReference"], "T-1");
        assert_eq!(body["quantity"], 2);
        assert_eq!(body["paymentStatus"], "paid");
        assert_eq!(body["status"], "confirmed");
        assert_eq!(body["kind"], "tour");
        assert!(!is_legacy(&body));

        let again = records.normalize_legacy().await.unwrap();
        assert_eq!(again.rewritten, 0);
    }
}
