use uuid::Uuid;

/// Topic for bookings written after a successful payment callback.
pub const BOOKING_CONFIRMED_TOPIC: &str = "booking.confirmed";

/// Topic for admin status changes on an existing booking.
pub const BOOKING_STATUS_CHANGED_TOPIC: &str = "booking.status_changed";

/// Topic for bookings written late from the pending-write log.
pub const BOOKING_RECONCILED_TOPIC: &str = "booking.reconciled";

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingConfirmedEvent {
    pub booking_id: Uuid,
    pub collection: String,
    /// Legacy bookings may carry non-UUID product ids.
    pub product_id: Option<String>,
    pub payment_reference: String,
    pub amount: f64,
    pub currency: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingStatusChangedEvent {
    pub booking_id: Uuid,
    pub collection: String,
    pub from: String,
    pub to: String,
    pub changed_by: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingReconciledEvent {
    pub booking_id: Uuid,
    pub collection: String,
    pub payment_reference: String,
    pub attempts: u32,
    pub timestamp: i64,
}
