use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use tourbook_core::events::{publish_json, EventPublisher};
use tourbook_core::pending::{PendingWrite, PendingWriteLog};
use tourbook_core::{CoreResult, DocumentStore, StoreResult};
use tourbook_shared::models::events::{BookingReconciledEvent, BOOKING_RECONCILED_TOPIC};

use crate::orchestrator::book_once;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Entries written to the store by this pass.
    pub written: usize,
    /// Entries whose reference was already booked.
    pub already_present: usize,
    pub failed: usize,
    /// Entries past the attempt limit, left for manual review.
    pub parked: usize,
}

/// Replays bookings that were paid for but could not be written.
pub struct Reconciler {
    store: Arc<dyn DocumentStore>,
    pending: Arc<dyn PendingWriteLog>,
    events: Arc<dyn EventPublisher>,
    max_attempts: u32,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        pending: Arc<dyn PendingWriteLog>,
        events: Arc<dyn EventPublisher>,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            pending,
            events,
            max_attempts,
        }
    }

    /// Returns the id the booking ended up under and whether this call wrote it.
    async fn replay(&self, entry: &PendingWrite) -> StoreResult<(Uuid, bool)> {
        book_once(
            self.store.as_ref(),
            entry.collection,
            &entry.payment_reference,
            entry.document.clone(),
        )
        .await
    }

    pub async fn run_once(&self) -> CoreResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for mut entry in self.pending.list().await? {
            if entry.attempts >= self.max_attempts {
                report.parked += 1;
                continue;
            }

            match self.replay(&entry).await {
                Ok((booking_id, written)) => {
                    self.pending.remove(entry.id).await?;
                    if written {
                        report.written += 1;
                        info!(
                            "Reconciled payment {} as {}/{} after {} attempts",
                            entry.payment_reference, entry.collection, booking_id, entry.attempts
                        );
                        let event = BookingReconciledEvent {
                            booking_id,
                            collection: entry.collection.to_string(),
                            payment_reference: entry.payment_reference.clone(),
                            attempts: entry.attempts + 1,
                            timestamp: Utc::now().timestamp(),
                        };
                        publish_json(self.events.as_ref(), BOOKING_RECONCILED_TOPIC, &booking_id.to_string(), &event)
                            .await;
                    } else {
                        report.already_present += 1;
                        info!("Payment {} already booked; dropping pending write", entry.payment_reference);
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    entry.attempts += 1;
                    entry.last_error = Some(e.to_string());
                    if entry.attempts >= self.max_attempts {
                        error!(
                            "Giving up on payment {} after {} attempts: {}",
                            entry.payment_reference, entry.attempts, e
                        );
                    } else {
                        warn!("Replay of payment {} failed: {}", entry.payment_reference, e);
                    }
                    self.pending.record_attempt(&entry).await?;
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tourbook_core::{Collection, Document, StoreError};
    use tourbook_store::{LogEventPublisher, MemoryDocumentStore, MemoryPendingLog};

    #[derive(Default)]
    struct DownStore {
        inner: MemoryDocumentStore,
        down: AtomicBool,
        /// Number of upcoming `find_eq` calls that miss every document,
        /// like a read racing a concurrent insert.
        stale_finds: AtomicUsize,
    }

    impl DownStore {
        fn check(&self) -> StoreResult<()> {
            if self.down.load(Ordering::SeqCst) {
                Err(StoreError::Backend("unavailable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl DocumentStore for DownStore {
        async fn insert(&self, collection: Collection, body: Value) -> StoreResult<Uuid> {
            self.check()?;
            self.inner.insert(collection, body).await
        }
        async fn get(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Document>> {
            self.check()?;
            self.inner.get(collection, id).await
        }
        async fn list(&self, collection: Collection) -> StoreResult<Vec<Document>> {
            self.check()?;
            self.inner.list(collection).await
        }
        async fn find_eq(&self, collection: Collection, field: &str, value: &Value) -> StoreResult<Vec<Document>> {
            self.check()?;
            if self.stale_finds.load(Ordering::SeqCst) > 0 {
                self.stale_finds.fetch_sub(1, Ordering::SeqCst);
                return Ok(Vec::new());
            }
            self.inner.find_eq(collection, field, value).await
        }
        async fn update(&self, collection: Collection, id: Uuid, patch: Value) -> StoreResult<()> {
            self.check()?;
            self.inner.update(collection, id, patch).await
        }
        async fn replace(&self, collection: Collection, id: Uuid, body: Value) -> StoreResult<()> {
            self.check()?;
            self.inner.replace(collection, id, body).await
        }
        async fn delete(&self, collection: Collection, id: Uuid) -> StoreResult<()> {
            self.check()?;
            self.inner.delete(collection, id).await
        }
    }

    fn entry(reference: &str) -> PendingWrite {
        PendingWrite::new(
            Collection::TravelBookings,
            reference.to_string(),
            json!({"paymentReference": reference, "paymentStatus": "paid", "status": "confirmed"}),
            "connection reset".to_string(),
        )
    }

    fn setup(max_attempts: u32) -> (Arc<DownStore>, Arc<MemoryPendingLog>, Reconciler) {
        let store = Arc::new(DownStore::default());
        let pending = Arc::new(MemoryPendingLog::new());
        let reconciler = Reconciler::new(store.clone(), pending.clone(), Arc::new(LogEventPublisher), max_attempts);
        (store, pending, reconciler)
    }

    #[tokio::test]
    async fn test_replays_and_clears_entry() {
        let (store, pending, reconciler) = setup(10);
        pending.append(&entry("BAO-7")).await.unwrap();

        let report = reconciler.run_once().await.unwrap();
        assert_eq!(report.written, 1);
        assert!(pending.list().await.unwrap().is_empty());

        let docs = store.list(Collection::TravelBookings).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].body["paymentReference"], "BAO-7");
    }

    #[tokio::test]
    async fn test_existing_reference_not_duplicated() {
        let (store, pending, reconciler) = setup(10);
        store
            .insert(Collection::TravelBookings, json!({"paymentReference": "BAO-7"}))
            .await
            .unwrap();
        pending.append(&entry("BAO-7")).await.unwrap();

        let report = reconciler.run_once().await.unwrap();
        assert_eq!(report.already_present, 1);
        assert_eq!(store.list(Collection::TravelBookings).await.unwrap().len(), 1);
        assert!(pending.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_insert_counts_as_present() {
        let (store, pending, reconciler) = setup(10);
        let booked = store
            .insert(Collection::TravelBookings, json!({"paymentReference": "BAO-9"}))
            .await
            .unwrap();
        pending.append(&entry("BAO-9")).await.unwrap();
        store.stale_finds.store(1, Ordering::SeqCst);

        let report = reconciler.run_once().await.unwrap();
        assert_eq!(report, ReconcileReport { already_present: 1, ..Default::default() });
        let docs = store.list(Collection::TravelBookings).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, booked);
        assert!(pending.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failures_count_up_then_park() {
        let (store, pending, reconciler) = setup(3);
        store.down.store(true, Ordering::SeqCst);
        pending.append(&entry("BAO-8")).await.unwrap();

        // attempts start at 1 for the original insert
        assert_eq!(reconciler.run_once().await.unwrap().failed, 1);
        assert_eq!(reconciler.run_once().await.unwrap().failed, 1);
        let parked = reconciler.run_once().await.unwrap();
        assert_eq!(parked, ReconcileReport { parked: 1, ..Default::default() });

        let entries = pending.list().await.unwrap();
        assert_eq!(entries[0].attempts, 3);
        assert_eq!(entries[0].last_error.as_deref(), Some("Document store backend failed: unavailable"));

        store.down.store(false, Ordering::SeqCst);
        assert_eq!(reconciler.run_once().await.unwrap().parked, 1);
        assert!(store.list(Collection::TravelBookings).await.unwrap().is_empty());
    }
}
