use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;
use tourbook_catalog::ProductSnapshot;
use tourbook_core::payment::PopupLaunch;

use crate::draft::{CheckoutDraft, FieldError};

/// Where a checkout session is in the form/payment/outcome flow. A closed
/// session is removed rather than kept in a terminal state.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutState {
    Form,
    Processing,
    Success,
    Failure,
}

impl fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckoutState::Form => "FORM",
            CheckoutState::Processing => "PROCESSING",
            CheckoutState::Success => "SUCCESS",
            CheckoutState::Failure => "FAILURE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: Uuid,
    /// Price and title as they were when the session was opened.
    pub product: ProductSnapshot,
    pub draft: CheckoutDraft,
    pub state: CheckoutState,
    pub reference: Option<String>,
    pub launch: Option<PopupLaunch>,
    pub booking_id: Option<Uuid>,
    /// Set while one success callback is writing the booking.
    pub persisting: bool,
    /// Logged cause of the last failure. Never shown to the customer.
    pub failure_cause: Option<String>,
    pub created_at: DateTime<Utc>,
    pub touched_at: DateTime<Utc>,
}

impl CheckoutSession {
    fn new(product: ProductSnapshot) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            product,
            draft: CheckoutDraft::new(),
            state: CheckoutState::Form,
            reference: None,
            launch: None,
            booking_id: None,
            persisting: false,
            failure_cause: None,
            created_at: now,
            touched_at: now,
        }
    }

    fn transition(&mut self, to: CheckoutState) {
        self.state = to;
        self.touched_at = Utc::now();
    }

    fn require(&self, allowed: &[CheckoutState], to: CheckoutState) -> Result<(), CheckoutError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(CheckoutError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            })
        }
    }

    pub fn total(&self) -> f64 {
        self.draft.total(self.product.price)
    }
}

/// Owns every open checkout session and enforces the state machine.
pub struct CheckoutManager {
    sessions: HashMap<Uuid, CheckoutSession>,
}

impl CheckoutManager {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }

    pub fn open(&mut self, product: ProductSnapshot) -> &CheckoutSession {
        let session = CheckoutSession::new(product);
        let id = session.id;
        self.sessions.entry(id).or_insert(session)
    }

    pub fn get(&self, id: &Uuid) -> Option<&CheckoutSession> {
        self.sessions.get(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Apply form inputs. Only while the form is showing.
    pub fn update_draft<'a, I>(&mut self, id: &Uuid, fields: I) -> Result<&CheckoutSession, CheckoutError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let session = self.get_mut(id)?;
        session.require(&[CheckoutState::Form], CheckoutState::Form)?;

        for (field, raw) in fields {
            if !session.draft.set_field(field, raw) {
                return Err(CheckoutError::UnknownField(field.to_string()));
            }
        }
        session.touched_at = Utc::now();
        Ok(session)
    }

    /// Check the draft before the popup is launched. The session stays in
    /// `Form` whatever the outcome.
    pub fn validate(&self, id: &Uuid, max_quantity: i64) -> Result<&CheckoutSession, CheckoutError> {
        let session = self.sessions.get(id).ok_or(CheckoutError::NotFound(*id))?;
        session.require(&[CheckoutState::Form], CheckoutState::Processing)?;
        session.draft.validate(max_quantity).map_err(CheckoutError::Validation)?;
        Ok(session)
    }

    /// Transition: Form → Processing (popup launched)
    pub fn mark_processing(&mut self, id: &Uuid, reference: String, launch: PopupLaunch) -> Result<(), CheckoutError> {
        let session = self.get_mut(id)?;
        session.require(&[CheckoutState::Form], CheckoutState::Processing)?;
        session.reference = Some(reference);
        session.launch = Some(launch);
        session.transition(CheckoutState::Processing);
        Ok(())
    }

    /// Transition: Form | Processing → Failure
    pub fn mark_failed(&mut self, id: &Uuid, cause: impl Into<String>) -> Result<(), CheckoutError> {
        let session = self.get_mut(id)?;
        session.require(&[CheckoutState::Form, CheckoutState::Processing], CheckoutState::Failure)?;
        session.failure_cause = Some(cause.into());
        session.launch = None;
        session.persisting = false;
        session.transition(CheckoutState::Failure);
        Ok(())
    }

    /// Transition: Processing → Failure (popup dismissed by the customer)
    pub fn mark_cancelled(&mut self, id: &Uuid) -> Result<(), CheckoutError> {
        let session = self.get_mut(id)?;
        session.require(&[CheckoutState::Processing], CheckoutState::Failure)?;
        if session.persisting {
            return Err(CheckoutError::PaymentInProgress(*id));
        }
        session.failure_cause = Some("payment cancelled by customer".to_string());
        session.launch = None;
        session.transition(CheckoutState::Failure);
        Ok(())
    }

    /// Reserve the session for the success callback carrying `reference`.
    /// It must be waiting on the popup launched with that reference, and no
    /// other callback may be writing its booking. The claim is released by
    /// `mark_succeeded` or `mark_failed`.
    pub fn claim_payment(&mut self, id: &Uuid, reference: &str) -> Result<&CheckoutSession, CheckoutError> {
        let session = self.get_mut(id)?;
        session.require(&[CheckoutState::Processing], CheckoutState::Success)?;
        if session.reference.as_deref() != Some(reference) {
            return Err(CheckoutError::ReferenceMismatch {
                got: reference.to_string(),
            });
        }
        if session.persisting {
            return Err(CheckoutError::PaymentInProgress(*id));
        }
        session.persisting = true;
        session.touched_at = Utc::now();
        Ok(session)
    }

    /// Transition: Processing → Success (booking written)
    pub fn mark_succeeded(&mut self, id: &Uuid, booking_id: Uuid) -> Result<(), CheckoutError> {
        let session = self.get_mut(id)?;
        session.require(&[CheckoutState::Processing], CheckoutState::Success)?;
        session.booking_id = Some(booking_id);
        session.launch = None;
        session.persisting = false;
        session.transition(CheckoutState::Success);
        Ok(())
    }

    /// Transition: Failure → Form. The draft is kept; only the outcome is
    /// cleared.
    pub fn retry(&mut self, id: &Uuid) -> Result<(), CheckoutError> {
        let session = self.get_mut(id)?;
        session.require(&[CheckoutState::Failure], CheckoutState::Form)?;
        session.reference = None;
        session.launch = None;
        session.failure_cause = None;
        session.transition(CheckoutState::Form);
        Ok(())
    }

    /// Dismiss from any state. Returns the state the session was in.
    pub fn close(&mut self, id: &Uuid) -> Result<CheckoutState, CheckoutError> {
        self.sessions
            .remove(id)
            .map(|s| s.state)
            .ok_or(CheckoutError::NotFound(*id))
    }

    /// Drop sessions left in `Form`, `Failure` or `Success` for longer than
    /// `max_idle`. Sessions waiting on the payment popup are kept.
    pub fn purge_idle(&mut self, now: DateTime<Utc>, max_idle: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| {
            let idle = now - s.touched_at > max_idle;
            s.state == CheckoutState::Processing || !idle
        });
        before - self.sessions.len()
    }

    fn get_mut(&mut self, id: &Uuid) -> Result<&mut CheckoutSession, CheckoutError> {
        self.sessions.get_mut(id).ok_or(CheckoutError::NotFound(*id))
    }
}

impl Default for CheckoutManager {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Checkout session not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Unknown form field: {0}")]
    UnknownField(String),

    #[error("Form is incomplete")]
    Validation(Vec<FieldError>),

    #[error("Payment reference {got} does not belong to this checkout")]
    ReferenceMismatch { got: String },

    #[error("Payment for checkout {0} is already being recorded")]
    PaymentInProgress(Uuid),

    #[error(transparent)]
    Catalog(#[from] tourbook_catalog::CatalogError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tourbook_catalog::ProductKind;

    fn snapshot() -> ProductSnapshot {
        ProductSnapshot {
            kind: ProductKind::Package,
            product_id: Uuid::new_v4(),
            title: "Zanzibar Escape".to_string(),
            price: 50_000.0,
            capacity: None,
        }
    }

    fn launch() -> PopupLaunch {
        PopupLaunch {
            key: "pk".to_string(),
            email: "ada@example.com".to_string(),
            amount: 5_000_000,
            currency: "NGN".to_string(),
            reference: "BAO-1".to_string(),
            metadata: json!({}),
        }
    }

    #[test]
    fn test_checkout_lifecycle() {
        let mut manager = CheckoutManager::new();
        let id = manager.open(snapshot()).id;
        assert_eq!(manager.get(&id).unwrap().state, CheckoutState::Form);

        manager.update_draft(&id, [("quantity", "2")]).unwrap();
        assert_eq!(manager.get(&id).unwrap().total(), 100_000.0);

        // Form → Processing
        manager.mark_processing(&id, "BAO-1".to_string(), launch()).unwrap();
        assert_eq!(manager.get(&id).unwrap().state, CheckoutState::Processing);

        // Processing → Success
        let booking_id = Uuid::new_v4();
        manager.mark_succeeded(&id, booking_id).unwrap();
        let session = manager.get(&id).unwrap();
        assert_eq!(session.state, CheckoutState::Success);
        assert_eq!(session.booking_id, Some(booking_id));
    }

    #[test]
    fn test_failure_retry_keeps_draft() {
        let mut manager = CheckoutManager::new();
        let id = manager.open(snapshot()).id;
        manager.update_draft(&id, [("firstName", "Ada"), ("quantity", "3")]).unwrap();
        manager.mark_processing(&id, "BAO-1".to_string(), launch()).unwrap();
        manager.mark_failed(&id, "cancelled").unwrap();

        manager.retry(&id).unwrap();
        let session = manager.get(&id).unwrap();
        assert_eq!(session.state, CheckoutState::Form);
        assert_eq!(session.draft.first_name, "Ada");
        assert_eq!(session.draft.quantity, 3);
        assert!(session.reference.is_none());
        assert!(session.failure_cause.is_none());
    }

    #[test]
    fn test_invalid_transitions() {
        let mut manager = CheckoutManager::new();
        let id = manager.open(snapshot()).id;

        // Cannot succeed without a launched popup
        assert!(matches!(
            manager.mark_succeeded(&id, Uuid::new_v4()),
            Err(CheckoutError::InvalidTransition { .. })
        ));
        assert!(manager.retry(&id).is_err());

        manager.mark_processing(&id, "BAO-1".to_string(), launch()).unwrap();
        assert!(manager.update_draft(&id, [("quantity", "4")]).is_err());
    }

    #[test]
    fn test_close_from_any_state() {
        let mut manager = CheckoutManager::new();
        let id = manager.open(snapshot()).id;
        manager.mark_processing(&id, "BAO-1".to_string(), launch()).unwrap();

        assert_eq!(manager.close(&id).unwrap(), CheckoutState::Processing);
        assert!(manager.get(&id).is_none());
        assert!(matches!(manager.mark_succeeded(&id, Uuid::new_v4()), Err(CheckoutError::NotFound(_))));
        assert!(matches!(manager.close(&id), Err(CheckoutError::NotFound(_))));
    }

    #[test]
    fn test_callback_reference_must_match() {
        let mut manager = CheckoutManager::new();
        let id = manager.open(snapshot()).id;
        assert!(manager.claim_payment(&id, "BAO-1").is_err());

        manager.mark_processing(&id, "BAO-1".to_string(), launch()).unwrap();
        assert!(matches!(
            manager.claim_payment(&id, "BAO-9"),
            Err(CheckoutError::ReferenceMismatch { .. })
        ));
        assert!(!manager.get(&id).unwrap().persisting);

        manager.mark_cancelled(&id).unwrap();
        assert_eq!(manager.get(&id).unwrap().state, CheckoutState::Failure);
        assert!(manager.mark_cancelled(&id).is_err());
    }

    #[test]
    fn test_payment_claimed_once() {
        let mut manager = CheckoutManager::new();
        let id = manager.open(snapshot()).id;
        manager.mark_processing(&id, "BAO-1".to_string(), launch()).unwrap();

        assert!(manager.claim_payment(&id, "BAO-1").unwrap().persisting);
        assert!(matches!(
            manager.claim_payment(&id, "BAO-1"),
            Err(CheckoutError::PaymentInProgress(_))
        ));
        // the popup cannot be cancelled under a booking write
        assert!(matches!(manager.mark_cancelled(&id), Err(CheckoutError::PaymentInProgress(_))));

        manager.mark_succeeded(&id, Uuid::new_v4()).unwrap();
        let session = manager.get(&id).unwrap();
        assert_eq!(session.state, CheckoutState::Success);
        assert!(!session.persisting);
    }

    #[test]
    fn test_failed_write_releases_claim() {
        let mut manager = CheckoutManager::new();
        let id = manager.open(snapshot()).id;
        manager.mark_processing(&id, "BAO-1".to_string(), launch()).unwrap();
        manager.claim_payment(&id, "BAO-1").unwrap();

        manager.mark_failed(&id, "booking write failed").unwrap();
        assert!(!manager.get(&id).unwrap().persisting);
        manager.retry(&id).unwrap();
        assert_eq!(manager.get(&id).unwrap().state, CheckoutState::Form);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut manager = CheckoutManager::new();
        let id = manager.open(snapshot()).id;
        assert!(matches!(
            manager.update_draft(&id, [("coupon", "FREE")]),
            Err(CheckoutError::UnknownField(_))
        ));
    }

    #[test]
    fn test_purge_idle_spares_processing() {
        let mut manager = CheckoutManager::new();
        let idle_form = manager.open(snapshot()).id;
        let waiting = manager.open(snapshot()).id;
        manager.mark_processing(&waiting, "BAO-2".to_string(), launch()).unwrap();
        let paid = manager.open(snapshot()).id;
        manager.mark_processing(&paid, "BAO-3".to_string(), launch()).unwrap();
        manager.mark_succeeded(&paid, Uuid::new_v4()).unwrap();

        let later = Utc::now() + Duration::hours(2);
        assert_eq!(manager.purge_idle(later, Duration::hours(1)), 2);
        assert!(manager.get(&idle_form).is_none());
        assert!(manager.get(&paid).is_none());
        assert!(manager.get(&waiting).is_some());
        assert_eq!(manager.len(), 1);

        assert_eq!(manager.purge_idle(Utc::now(), Duration::hours(1)), 0);
    }
}
