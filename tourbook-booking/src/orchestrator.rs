use chrono::{Duration, Utc};
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;
use tourbook_catalog::{CatalogService, ProductKind, ProductSnapshot};
use tourbook_core::events::{publish_json, EventPublisher};
use tourbook_core::payment::{
    PaymentLauncher, PaymentRequest, PopupLaunch, TransactionOutcome, TransactionVerifier,
};
use tourbook_core::pending::{PendingWrite, PendingWriteLog};
use tourbook_core::{Collection, DocumentStore, StoreError, StoreResult};
use tourbook_shared::models::events::{BookingConfirmedEvent, BOOKING_CONFIRMED_TOPIC};
use tourbook_shared::{format_naira, to_minor_units, Masked};

use crate::draft::CheckoutDraft;
use crate::manager::{CheckoutError, CheckoutManager, CheckoutSession, CheckoutState};
use crate::models::{Booking, BookingStatus};

/// Shown for every failure cause. The cause itself only goes to the log.
pub const PAYMENT_FAILURE_MESSAGE: &str =
    "There was a problem with payment. Please try again or contact support.";

pub type CheckoutResult<T> = Result<T, CheckoutError>;

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub public_key: Option<String>,
    pub currency: String,
    pub reference_prefix: String,
    pub max_quantity: i64,
    pub idle_session: Duration,
}

impl CheckoutSettings {
    fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}

/// What the browser renders for a checkout session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    pub id: Uuid,
    pub state: CheckoutState,
    pub product: ProductSnapshot,
    pub draft: CheckoutDraft,
    pub total: f64,
    pub total_display: String,
    pub max_quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch: Option<PopupLaunch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl CheckoutView {
    fn of(session: &CheckoutSession, max_quantity: i64) -> Self {
        let total = session.total();
        Self {
            id: session.id,
            state: session.state,
            product: session.product.clone(),
            draft: session.draft.clone(),
            total,
            total_display: format_naira(total),
            max_quantity,
            launch: session.launch.clone(),
            payment_reference: session.reference.clone(),
            booking_id: session.booking_id,
            message: (session.state == CheckoutState::Failure).then_some(PAYMENT_FAILURE_MESSAGE),
        }
    }
}

/// Insert `body` unless `collection` already holds a booking for
/// `reference`. A duplicate reported by the store counts as already booked.
/// Returns the booking id and whether this call wrote it.
pub(crate) async fn book_once(
    store: &dyn DocumentStore,
    collection: Collection,
    reference: &str,
    body: Value,
) -> StoreResult<(Uuid, bool)> {
    let key = Value::String(reference.to_string());
    if let Some(doc) = store.find_eq(collection, "paymentReference", &key).await?.first() {
        return Ok((doc.id, false));
    }

    match store.insert(collection, body).await {
        Ok(id) => Ok((id, true)),
        Err(StoreError::Duplicate { .. }) => store
            .find_eq(collection, "paymentReference", &key)
            .await?
            .first()
            .map(|doc| (doc.id, false))
            .ok_or_else(|| StoreError::Backend(format!("payment {} reported as duplicate but not found", reference))),
        Err(e) => Err(e),
    }
}

fn new_reference(prefix: &str) -> String {
    let n: u32 = rand::thread_rng().gen_range(1..=1_000_000_000);
    format!("{}-{}", prefix, n)
}

/// Drives checkout sessions through payment and persistence. Sessions sit
/// behind one mutex that is never held across a provider or store call.
pub struct CheckoutOrchestrator {
    sessions: Mutex<CheckoutManager>,
    catalog: Arc<CatalogService>,
    store: Arc<dyn DocumentStore>,
    launcher: Arc<dyn PaymentLauncher>,
    verifier: Option<Arc<dyn TransactionVerifier>>,
    pending: Arc<dyn PendingWriteLog>,
    events: Arc<dyn EventPublisher>,
    settings: CheckoutSettings,
}

impl CheckoutOrchestrator {
    pub fn new(
        catalog: Arc<CatalogService>,
        store: Arc<dyn DocumentStore>,
        launcher: Arc<dyn PaymentLauncher>,
        pending: Arc<dyn PendingWriteLog>,
        events: Arc<dyn EventPublisher>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            sessions: Mutex::new(CheckoutManager::new()),
            catalog,
            store,
            launcher,
            verifier: None,
            pending,
            events,
            settings,
        }
    }

    /// Confirm success callbacks with the provider before writing.
    pub fn with_verifier(mut self, verifier: Arc<dyn TransactionVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    fn view_of(&self, sessions: &CheckoutManager, id: &Uuid) -> CheckoutResult<CheckoutView> {
        sessions
            .get(id)
            .map(|s| CheckoutView::of(s, self.settings.max_quantity))
            .ok_or(CheckoutError::NotFound(*id))
    }

    /// Start a checkout for one product. Price and title are copied now and
    /// used as-is for the rest of the session.
    pub async fn open(&self, kind: ProductKind, product_id: Uuid) -> CheckoutResult<CheckoutView> {
        let snapshot = self.catalog.snapshot(kind, product_id).await?;
        let mut sessions = self.sessions.lock().await;
        let session = sessions.open(snapshot);
        info!("Checkout {} opened for {} {}", session.id, kind.as_str(), product_id);
        Ok(CheckoutView::of(session, self.settings.max_quantity))
    }

    pub async fn view(&self, id: Uuid) -> CheckoutResult<CheckoutView> {
        let sessions = self.sessions.lock().await;
        self.view_of(&sessions, &id)
    }

    pub async fn update_draft(&self, id: Uuid, fields: &[(String, String)]) -> CheckoutResult<CheckoutView> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.update_draft(&id, fields.iter().map(|(f, v)| (f.as_str(), v.as_str())))?;
        Ok(CheckoutView::of(session, self.settings.max_quantity))
    }

    /// Validate the draft and hand the popup its launch parameters.
    ///
    /// Validation errors leave the session in `Form`. A missing public key
    /// or a launcher error moves it to `Failure`.
    pub async fn submit(&self, id: Uuid) -> CheckoutResult<CheckoutView> {
        let (public_key, request) = {
            let mut sessions = self.sessions.lock().await;
            let session = sessions.validate(&id, self.settings.max_quantity)?;

            let Some(public_key) = self.settings.public_key().map(str::to_string) else {
                warn!("Checkout {} failed: payment public key is not configured", id);
                sessions.mark_failed(&id, "payment public key is not configured")?;
                return self.view_of(&sessions, &id);
            };

            let request = PaymentRequest {
                email: session.draft.email.trim().to_string(),
                amount_minor: to_minor_units(session.total()),
                currency: self.settings.currency.clone(),
                reference: new_reference(&self.settings.reference_prefix),
                metadata: json!({
                    "productId": session.product.product_id,
                    "productTitle": session.product.title,
                }),
            };
            (public_key, request)
        };

        let launched = self.launcher.launch(&public_key, &request).await;

        let mut sessions = self.sessions.lock().await;
        match launched {
            Ok(launch) => {
                info!(
                    "Checkout {} awaiting payment {} for {} minor units",
                    id, request.reference, request.amount_minor
                );
                sessions.mark_processing(&id, request.reference, launch)?;
            }
            Err(e) => {
                error!("Checkout {} failed: payment launch error: {}", id, e);
                sessions.mark_failed(&id, e.to_string())?;
            }
        }
        self.view_of(&sessions, &id)
    }

    async fn fail(&self, id: Uuid, cause: String) -> CheckoutResult<CheckoutView> {
        warn!("Checkout {} failed: {}", id, cause);
        let mut sessions = self.sessions.lock().await;
        sessions.mark_failed(&id, cause)?;
        self.view_of(&sessions, &id)
    }

    /// Success callback from the popup. Writes at most one booking per
    /// payment reference. A repeated callback for a confirmed session gets
    /// the confirmed view back; one that races a write in progress is
    /// rejected with `PaymentInProgress`.
    pub async fn payment_succeeded(&self, id: Uuid, reference: &str) -> CheckoutResult<CheckoutView> {
        let (draft, product) = {
            let mut sessions = self.sessions.lock().await;
            let confirmed = sessions
                .get(&id)
                .is_some_and(|s| s.state == CheckoutState::Success && s.reference.as_deref() == Some(reference));
            if confirmed {
                info!("Repeated success callback for {} on checkout {}", reference, id);
                return self.view_of(&sessions, &id);
            }
            match sessions.claim_payment(&id, reference) {
                Ok(session) => (session.draft.clone(), session.product.clone()),
                Err(CheckoutError::NotFound(_)) => {
                    warn!("Payment {} reported for closed checkout {}; nothing written", reference, id);
                    return Err(CheckoutError::NotFound(id));
                }
                Err(e) => return Err(e),
            }
        };

        if let Some(verifier) = &self.verifier {
            match verifier.verify(reference).await {
                Ok(tx) if tx.outcome == TransactionOutcome::Success => {}
                Ok(tx) => {
                    return self
                        .fail(id, format!("transaction {} verified as {:?}", reference, tx.outcome))
                        .await
                }
                Err(e) => return self.fail(id, format!("verification of {} failed: {}", reference, e)).await,
            }
        }

        let collection = product.kind.booking_collection();
        let booking = self.build_booking(&draft, &product, reference);

        let booking_id = match self.persist(collection, reference, &booking).await {
            Ok((booking_id, created)) => {
                if created {
                    self.publish_confirmed(booking_id, collection, &booking, reference).await;
                }
                booking_id
            }
            Err(e) => {
                error!("Booking for paid reference {} not written: {}", reference, e);
                self.log_pending(collection, reference, &booking, e.to_string()).await;
                return self.fail(id, format!("booking write failed: {}", e)).await;
            }
        };

        let mut sessions = self.sessions.lock().await;
        if let Err(e) = sessions.mark_succeeded(&id, booking_id) {
            info!(
                booking_id = %booking_id,
                payment_reference = reference,
                "Booking {}/{} written for checkout {} closed during the write",
                collection, booking_id, id
            );
            warn!("Checkout {} not updated after booking {}: {}", id, booking_id, e);
            return Err(e);
        }
        info!("Checkout {} confirmed as {}/{}", id, collection, booking_id);
        self.view_of(&sessions, &id)
    }

    fn build_booking(&self, draft: &CheckoutDraft, product: &ProductSnapshot, reference: &str) -> Booking {
        let now = Utc::now();
        Booking {
            kind: Some(product.kind),
            product_id: Some(product.product_id.to_string()),
            product_title: product.title.clone(),
            customer_name: draft.customer_name(),
            customer_email: Masked(draft.email.trim().to_string()),
            customer_phone: Masked(draft.phone.trim().to_string()),
            quantity: draft.quantity,
            unit_price: product.price,
            amount: draft.total(product.price),
            currency: self.settings.currency.clone(),
            payment_reference: Some(reference.to_string()),
            payment_status: BookingStatus::Paid,
            status: BookingStatus::Confirmed,
            special_requests: draft.special_requests(),
            preferred_date: draft.preferred_date(),
            time_slot: draft.time_slot(),
            created_at: Some(now),
            paid_at: Some(now),
            updated_at: None,
        }
    }

    /// Returns the booking id and whether it was written by this call.
    async fn persist(
        &self,
        collection: Collection,
        reference: &str,
        booking: &Booking,
    ) -> StoreResult<(Uuid, bool)> {
        let body = serde_json::to_value(booking)?;
        let (id, created) = book_once(self.store.as_ref(), collection, reference, body).await?;
        if !created {
            info!("Payment {} already booked as {}/{}", reference, collection, id);
        }
        Ok((id, created))
    }

    async fn log_pending(&self, collection: Collection, reference: &str, booking: &Booking, cause: String) {
        let document = match serde_json::to_value(booking) {
            Ok(doc) => doc,
            Err(e) => {
                error!("Pending write for {} could not be encoded: {}", reference, e);
                return;
            }
        };
        let entry = PendingWrite::new(collection, reference.to_string(), document, cause);
        match self.pending.append(&entry).await {
            Ok(()) => warn!("Booking for {} queued for reconciliation as {}", reference, entry.id),
            Err(e) => error!("Booking for {} lost; pending log unavailable: {}", reference, e),
        }
    }

    async fn publish_confirmed(&self, booking_id: Uuid, collection: Collection, booking: &Booking, reference: &str) {
        let event = BookingConfirmedEvent {
            booking_id,
            collection: collection.to_string(),
            product_id: booking.product_id.clone(),
            payment_reference: reference.to_string(),
            amount: booking.amount,
            currency: booking.currency.clone(),
            timestamp: Utc::now().timestamp(),
        };
        publish_json(self.events.as_ref(), BOOKING_CONFIRMED_TOPIC, &booking_id.to_string(), &event).await;
    }

    /// Cancel callback from the popup.
    pub async fn payment_cancelled(&self, id: Uuid) -> CheckoutResult<CheckoutView> {
        let mut sessions = self.sessions.lock().await;
        sessions.mark_cancelled(&id)?;
        warn!("Checkout {} failed: payment cancelled by customer", id);
        self.view_of(&sessions, &id)
    }

    pub async fn retry(&self, id: Uuid) -> CheckoutResult<CheckoutView> {
        let mut sessions = self.sessions.lock().await;
        sessions.retry(&id)?;
        self.view_of(&sessions, &id)
    }

    /// Dismiss the checkout, whatever state it is in.
    pub async fn close(&self, id: Uuid) -> CheckoutResult<()> {
        let state = self.sessions.lock().await.close(&id)?;
        if state == CheckoutState::Processing {
            warn!("Checkout {} closed while awaiting payment", id);
        } else {
            info!("Checkout {} closed from {}", id, state);
        }
        Ok(())
    }

    pub async fn purge_idle(&self) -> usize {
        let purged = self
            .sessions
            .lock()
            .await
            .purge_idle(Utc::now(), self.settings.idle_session);
        if purged > 0 {
            info!("Purged {} idle checkout sessions", purged);
        }
        purged
    }

    pub async fn open_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;
    use tourbook_core::payment::VerifiedTransaction;
    use tourbook_core::{CoreError, CoreResult, Document, StoreError};
    use tourbook_store::{MemoryDocumentStore, MemoryPendingLog};

    #[derive(Default)]
    struct RecordingLauncher {
        requests: StdMutex<Vec<PaymentRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl PaymentLauncher for RecordingLauncher {
        async fn launch(&self, public_key: &str, request: &PaymentRequest) -> CoreResult<PopupLaunch> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(CoreError::ProviderError("popup script failed to load".to_string()));
            }
            Ok(PopupLaunch {
                key: public_key.to_string(),
                email: request.email.clone(),
                amount: request.amount_minor,
                currency: request.currency.clone(),
                reference: request.reference.clone(),
                metadata: request.metadata.clone(),
            })
        }
    }

    /// Memory store whose inserts can be switched off and whose lookups can
    /// be slowed down to the pace of a remote database.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryDocumentStore,
        fail_inserts: AtomicBool,
        slow_reads: AtomicBool,
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn insert(&self, collection: Collection, body: Value) -> StoreResult<Uuid> {
            if self.fail_inserts.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("connection reset".to_string()));
            }
            self.inner.insert(collection, body).await
        }
        async fn get(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Document>> {
            self.inner.get(collection, id).await
        }
        async fn list(&self, collection: Collection) -> StoreResult<Vec<Document>> {
            self.inner.list(collection).await
        }
        async fn find_eq(&self, collection: Collection, field: &str, value: &Value) -> StoreResult<Vec<Document>> {
            if self.slow_reads.load(Ordering::SeqCst) {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
            self.inner.find_eq(collection, field, value).await
        }
        async fn update(&self, collection: Collection, id: Uuid, patch: Value) -> StoreResult<()> {
            self.inner.update(collection, id, patch).await
        }
        async fn replace(&self, collection: Collection, id: Uuid, body: Value) -> StoreResult<()> {
            self.inner.replace(collection, id, body).await
        }
        async fn delete(&self, collection: Collection, id: Uuid) -> StoreResult<()> {
            self.inner.delete(collection, id).await
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        topics: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, topic: &str, _key: &str, _payload: &str) -> CoreResult<()> {
            self.topics.lock().unwrap().push(topic.to_string());
            Ok(())
        }
    }

    struct RejectingVerifier;

    #[async_trait]
    impl TransactionVerifier for RejectingVerifier {
        async fn verify(&self, reference: &str) -> CoreResult<VerifiedTransaction> {
            Ok(VerifiedTransaction {
                reference: reference.to_string(),
                outcome: TransactionOutcome::Abandoned,
                amount_minor: 0,
                currency: "NGN".to_string(),
            })
        }
    }

    struct Harness {
        orchestrator: CheckoutOrchestrator,
        store: Arc<FlakyStore>,
        launcher: Arc<RecordingLauncher>,
        pending: Arc<MemoryPendingLog>,
        events: Arc<RecordingPublisher>,
        package_id: Uuid,
    }

    fn settings(public_key: Option<&str>) -> CheckoutSettings {
        CheckoutSettings {
            public_key: public_key.map(str::to_string),
            currency: "NGN".to_string(),
            reference_prefix: "BAO".to_string(),
            max_quantity: 20,
            idle_session: Duration::hours(1),
        }
    }

    async fn harness_with(public_key: Option<&str>, launcher: RecordingLauncher) -> Harness {
        let store = Arc::new(FlakyStore::default());
        let catalog = Arc::new(CatalogService::new(store.clone()));
        let package = catalog
            .create_package(
                serde_json::from_value(json!({"title": "Zanzibar Escape", "price": 50000}))
                    .unwrap(),
            )
            .await
            .unwrap();

        let launcher = Arc::new(launcher);
        let pending = Arc::new(MemoryPendingLog::new());
        let events = Arc::new(RecordingPublisher::default());
        let orchestrator = CheckoutOrchestrator::new(
            catalog,
            store.clone(),
            launcher.clone(),
            pending.clone(),
            events.clone(),
            settings(public_key),
        );
        Harness {
            orchestrator,
            store,
            launcher,
            pending,
            events,
            package_id: package.id,
        }
    }

    async fn harness() -> Harness {
        harness_with(Some("pk_test_123"), RecordingLauncher::default()).await
    }

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(f, v)| (f.to_string(), v.to_string())).collect()
    }

    async fn filled_session(h: &Harness, quantity: &str) -> Uuid {
        let id = h.orchestrator.open(ProductKind::Package, h.package_id).await.unwrap().id;
        h.orchestrator
            .update_draft(
                id,
                &fields(&[
                    ("firstName", "Ada"),
                    ("lastName", "Lovelace "),
                    ("email", "ada@example.com"),
                    ("phone", "08030000000"),
                    ("travelers", quantity),
                ]),
            )
            .await
            .unwrap();
        id
    }

    async fn bookings(h: &Harness) -> Vec<Document> {
        h.store.list(Collection::TravelBookings).await.unwrap()
    }

    #[tokio::test]
    async fn test_success_callback_writes_one_booking() {
        let h = harness().await;
        let id = filled_session(&h, "2").await;

        let view = h.orchestrator.submit(id).await.unwrap();
        assert_eq!(view.state, CheckoutState::Processing);
        assert_eq!(view.total_display, "₦100,000");
        let launch = view.launch.unwrap();
        assert_eq!(launch.amount, 10_000_000);
        assert_eq!(launch.key, "pk_test_123");
        assert!(launch.reference.starts_with("BAO-"));

        let done = h.orchestrator.payment_succeeded(id, &launch.reference).await.unwrap();
        assert_eq!(done.state, CheckoutState::Success);
        assert!(done.message.is_none());

        let docs = bookings(&h).await;
        assert_eq!(docs.len(), 1);
        assert_eq!(Some(docs[0].id), done.booking_id);
        let body = &docs[0].body;
        assert_eq!(body["paymentReference"], launch.reference.as_str());
        assert_eq!(body["paymentStatus"], "paid");
        assert_eq!(body["status"], "confirmed");
        assert_eq!(body["customerName"], "Ada Lovelace");
        assert_eq!(body["quantity"], 2);
        assert_eq!(body["amount"], 100000.0);

        assert_eq!(h.events.topics.lock().unwrap().as_slice(), [BOOKING_CONFIRMED_TOPIC]);
    }

    #[tokio::test]
    async fn test_existing_reference_is_reused() {
        let h = harness().await;
        let id = filled_session(&h, "1").await;
        let reference = h.orchestrator.submit(id).await.unwrap().payment_reference.unwrap();

        let earlier = h
            .store
            .insert(Collection::TravelBookings, json!({"paymentReference": reference}))
            .await
            .unwrap();

        let done = h.orchestrator.payment_succeeded(id, &reference).await.unwrap();
        assert_eq!(done.booking_id, Some(earlier));
        assert_eq!(bookings(&h).await.len(), 1);
        assert!(h.events.topics.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_simultaneous_success_callbacks_book_once() {
        let h = harness().await;
        let id = filled_session(&h, "1").await;
        let reference = h.orchestrator.submit(id).await.unwrap().payment_reference.unwrap();
        h.store.slow_reads.store(true, Ordering::SeqCst);

        let (first, second) = tokio::join!(
            h.orchestrator.payment_succeeded(id, &reference),
            h.orchestrator.payment_succeeded(id, &reference),
        );
        let (done, raced) = match (first, second) {
            (Ok(view), Err(e)) | (Err(e), Ok(view)) => (view, e),
            (a, b) => panic!("expected one winner, got {:?} and {:?}", a.map(|v| v.state), b.map(|v| v.state)),
        };
        assert_eq!(done.state, CheckoutState::Success);
        assert!(matches!(raced, CheckoutError::PaymentInProgress(_)));

        let docs = bookings(&h).await;
        assert_eq!(docs.len(), 1);
        assert_eq!(Some(docs[0].id), done.booking_id);
        assert_eq!(h.events.topics.lock().unwrap().len(), 1);

        // a late retry of the same callback sees the confirmed booking
        let again = h.orchestrator.payment_succeeded(id, &reference).await.unwrap();
        assert_eq!(again.state, CheckoutState::Success);
        assert_eq!(again.booking_id, done.booking_id);
        assert_eq!(bookings(&h).await.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_writes_nothing() {
        let h = harness().await;
        let id = filled_session(&h, "1").await;
        h.orchestrator.submit(id).await.unwrap();

        let view = h.orchestrator.payment_cancelled(id).await.unwrap();
        assert_eq!(view.state, CheckoutState::Failure);
        assert_eq!(view.message, Some(PAYMENT_FAILURE_MESSAGE));
        assert!(bookings(&h).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_skips_launcher() {
        let h = harness_with(None, RecordingLauncher::default()).await;
        let id = filled_session(&h, "1").await;

        let view = h.orchestrator.submit(id).await.unwrap();
        assert_eq!(view.state, CheckoutState::Failure);
        assert!(h.launcher.requests.lock().unwrap().is_empty());

        let blank = harness_with(Some("  "), RecordingLauncher::default()).await;
        let id = filled_session(&blank, "1").await;
        assert_eq!(blank.orchestrator.submit(id).await.unwrap().state, CheckoutState::Failure);
        assert!(blank.launcher.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_launcher_error_fails() {
        let launcher = RecordingLauncher {
            fail: true,
            ..Default::default()
        };
        let h = harness_with(Some("pk_test_123"), launcher).await;
        let id = filled_session(&h, "1").await;

        let view = h.orchestrator.submit(id).await.unwrap();
        assert_eq!(view.state, CheckoutState::Failure);
        assert!(view.launch.is_none());
    }

    #[tokio::test]
    async fn test_insert_failure_goes_to_pending_log() {
        let h = harness().await;
        let id = filled_session(&h, "1").await;
        let reference = h.orchestrator.submit(id).await.unwrap().payment_reference.unwrap();

        h.store.fail_inserts.store(true, Ordering::SeqCst);
        let view = h.orchestrator.payment_succeeded(id, &reference).await.unwrap();
        assert_eq!(view.state, CheckoutState::Failure);
        assert!(bookings(&h).await.is_empty());

        let pending = h.pending.list().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payment_reference, reference);
        assert_eq!(pending[0].collection, Collection::TravelBookings);
        assert_eq!(pending[0].document["paymentStatus"], "paid");
    }

    #[tokio::test]
    async fn test_callback_after_close_writes_nothing() {
        let h = harness().await;
        let id = filled_session(&h, "1").await;
        let reference = h.orchestrator.submit(id).await.unwrap().payment_reference.unwrap();

        h.orchestrator.close(id).await.unwrap();
        assert!(matches!(
            h.orchestrator.payment_succeeded(id, &reference).await,
            Err(CheckoutError::NotFound(_))
        ));
        assert!(matches!(h.orchestrator.payment_cancelled(id).await, Err(CheckoutError::NotFound(_))));
        assert!(bookings(&h).await.is_empty());
        assert_eq!(h.orchestrator.open_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_zero_quantity_blocks_submit() {
        let h = harness().await;
        let id = filled_session(&h, "0").await;

        match h.orchestrator.submit(id).await {
            Err(CheckoutError::Validation(errors)) => assert_eq!(errors[0].field, "quantity"),
            other => panic!("expected validation error, got {:?}", other.map(|v| v.state)),
        }
        let view = h.orchestrator.view(id).await.unwrap();
        assert_eq!(view.state, CheckoutState::Form);
        assert_eq!(view.draft.quantity, 0);
        assert!(h.launcher.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_verifier_rejection_writes_nothing() {
        let h = harness().await;
        let orchestrator = h.orchestrator.with_verifier(Arc::new(RejectingVerifier));
        let id = orchestrator.open(ProductKind::Package, h.package_id).await.unwrap().id;
        orchestrator
            .update_draft(
                id,
                &fields(&[("firstName", "A"), ("lastName", "B"), ("email", "a@b.co"), ("phone", "1")]),
            )
            .await
            .unwrap();
        let reference = orchestrator.submit(id).await.unwrap().payment_reference.unwrap();

        let view = orchestrator.payment_succeeded(id, &reference).await.unwrap();
        assert_eq!(view.state, CheckoutState::Failure);
        assert!(h.store.list(Collection::TravelBookings).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retry_returns_to_form_with_draft() {
        let h = harness().await;
        let id = filled_session(&h, "3").await;
        h.orchestrator.submit(id).await.unwrap();
        h.orchestrator.payment_cancelled(id).await.unwrap();

        let view = h.orchestrator.retry(id).await.unwrap();
        assert_eq!(view.state, CheckoutState::Form);
        assert_eq!(view.draft.quantity, 3);
        assert!(view.payment_reference.is_none());

        let again = h.orchestrator.submit(id).await.unwrap();
        assert_eq!(again.state, CheckoutState::Processing);
        assert_eq!(h.launcher.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_open_unknown_product() {
        let h = harness().await;
        assert!(matches!(
            h.orchestrator.open(ProductKind::Tour, h.package_id).await,
            Err(CheckoutError::Catalog(_))
        ));
    }
}
