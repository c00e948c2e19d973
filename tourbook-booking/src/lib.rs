pub mod draft;
pub mod manager;
pub mod models;
pub mod orchestrator;
pub mod reconcile;
pub mod records;

pub use draft::{CheckoutDraft, FieldError};
pub use manager::{CheckoutError, CheckoutManager, CheckoutSession, CheckoutState};
pub use models::{Booking, BookingStatus};
pub use orchestrator::{CheckoutOrchestrator, CheckoutSettings, CheckoutView, PAYMENT_FAILURE_MESSAGE};
pub use reconcile::{ReconcileReport, Reconciler};
pub use records::{BookingRecords, NormalizeReport, Overview, RecordsError};
