use chrono::{DateTime, TimeZone, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use tourbook_catalog::ProductKind;
use tourbook_core::{Document, StoreResult, Stored};
use tourbook_shared::Masked;

/// One status vocabulary for both `paymentStatus` and `status`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Paid,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Paid => "paid",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    /// Case-insensitive; accepts the spellings older documents carry.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(BookingStatus::Pending),
            "paid" => Some(BookingStatus::Paid),
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" | "canceled" => Some(BookingStatus::Cancelled),
            "completed" => Some(BookingStatus::Completed),
            _ => None,
        }
    }

    /// Payment status reading: a "completed" payment is a paid one.
    pub fn parse_payment(raw: &str) -> Option<Self> {
        match Self::parse(raw)? {
            BookingStatus::Completed => Some(BookingStatus::Paid),
            other => Some(other),
        }
    }

    /// Admin transitions on the booking status.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending | Paid, Confirmed | Cancelled) | (Confirmed, Completed | Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BookingStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        BookingStatus::parse(&raw).ok_or_else(|| D::Error::custom(format!("unknown status '{}'", raw)))
    }
}

fn payment_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BookingStatus, D::Error> {
    let raw = String::deserialize(deserializer)?;
    BookingStatus::parse_payment(&raw)
        .ok_or_else(|| D::Error::custom(format!("unknown payment status '{}'", raw)))
}

fn default_quantity() -> i64 {
    1
}

fn default_currency() -> String {
    tourbook_shared::money::DEFAULT_CURRENCY.to_string()
}

/// A confirmed (or later admin-managed) booking document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(default)]
    pub kind: Option<ProductKind>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub product_title: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: Masked<String>,
    #[serde(default)]
    pub customer_phone: Masked<String>,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: f64,
    #[serde(default)]
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<String>,
    #[serde(default, deserialize_with = "payment_status")]
    pub payment_status: BookingStatus,
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_requests: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_slot: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Older field names and the canonical name each one maps to.
const LEGACY_KEYS: [(&str, &str); 7] = [
    ("packageId", "productId"),
    ("tourId", "productId"),
    ("packageTitle", "productTitle"),
    ("tourTitle", "productTitle"),
    ("travelers", "quantity"),
    ("participants", "quantity"),
    ("transactionRef", "paymentReference"),
];

const TIMESTAMP_KEYS: [&str; 3] = ["createdAt", "paidAt", "updatedAt"];

/// `{"seconds": .., "nanoseconds": ..}` as exported by the old document store.
fn exported_timestamp(value: &Value) -> Option<Value> {
    let seconds = value.get("seconds")?.as_i64()?;
    let nanos = value.get("nanoseconds").and_then(Value::as_u64).unwrap_or(0) as u32;
    let at = Utc.timestamp_opt(seconds, nanos).single()?;
    Some(Value::String(at.to_rfc3339()))
}

/// Rewrite legacy keys and timestamp shapes into the canonical layout.
/// Canonical keys already present win over legacy ones.
pub fn canonicalize(body: Value) -> Value {
    let mut map = match body {
        Value::Object(map) => map,
        other => return other,
    };

    for (legacy, canonical) in LEGACY_KEYS {
        if let Some(value) = map.remove(legacy) {
            map.entry(canonical.to_string()).or_insert(value);
        }
    }

    for key in TIMESTAMP_KEYS {
        if let Some(converted) = map.get(key).and_then(exported_timestamp) {
            map.insert(key.to_string(), converted);
        }
    }

    // Older bookings stored ids as numbers or strings interchangeably.
    if let Some(Value::Number(n)) = map.get("productId") {
        let text = n.to_string();
        map.insert("productId".to_string(), Value::String(text));
    }

    Value::Object(map)
}

/// True if the body uses any spelling `canonicalize` or the status readers
/// would rewrite.
pub fn is_legacy(body: &Value) -> bool {
    let Some(map) = body.as_object() else {
        return false;
    };
    if LEGACY_KEYS.iter().any(|(legacy, _)| map.contains_key(*legacy)) {
        return true;
    }
    if TIMESTAMP_KEYS.iter().any(|key| map.get(*key).is_some_and(Value::is_object)) {
        return true;
    }
    if map.get("productId").is_some_and(Value::is_number) {
        return true;
    }
    let non_canonical = |key: &str, parse: fn(&str) -> Option<BookingStatus>| {
        map.get(key)
            .and_then(Value::as_str)
            .is_some_and(|raw| parse(raw).map(|s| s.as_str()) != Some(raw))
    };
    non_canonical("paymentStatus", BookingStatus::parse_payment) || non_canonical("status", BookingStatus::parse)
}

impl Booking {
    /// Read a stored booking, accepting legacy layouts. `kind` is filled in
    /// from the collection when the document does not carry it.
    pub fn from_document(doc: Document, kind: ProductKind) -> StoreResult<Stored<Booking>> {
        let mut stored: Stored<Booking> = Document {
            body: canonicalize(doc.body),
            ..doc
        }
        .decode()?;
        stored.record.kind.get_or_insert(kind);
        Ok(stored)
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == BookingStatus::Paid
    }
}
