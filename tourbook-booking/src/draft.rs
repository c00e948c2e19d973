use serde::{Deserialize, Serialize};

/// What the customer has typed into the checkout form so far.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub quantity: i64,
    pub special_requests: String,
    pub preferred_date: String,
    pub time_slot: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

/// Integer input the way a number field reports it: blank or garbage is 0.
fn parse_count(raw: &str) -> i64 {
    raw.trim().parse::<i64>().unwrap_or(0)
}

fn is_email(raw: &str) -> bool {
    if raw.chars().any(char::is_whitespace) {
        return false;
    }
    match raw.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

impl CheckoutDraft {
    pub fn new() -> Self {
        Self {
            quantity: 1,
            ..Self::default()
        }
    }

    /// Apply one form input. Returns false for an unknown field name.
    pub fn set_field(&mut self, field: &str, raw: &str) -> bool {
        match field {
            "firstName" => self.first_name = raw.to_string(),
            "lastName" => self.last_name = raw.to_string(),
            "email" => self.email = raw.to_string(),
            "phone" => self.phone = raw.to_string(),
            "quantity" | "travelers" | "participants" => self.quantity = parse_count(raw),
            "specialRequests" => self.special_requests = raw.to_string(),
            "preferredDate" => self.preferred_date = raw.to_string(),
            "timeSlot" => self.time_slot = raw.to_string(),
            _ => return false,
        }
        true
    }

    /// Recomputed on every call.
    pub fn total(&self, unit_price: f64) -> f64 {
        unit_price * self.quantity as f64
    }

    pub fn customer_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Form constraints checked before the payment popup may open.
    pub fn validate(&self, max_quantity: i64) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        for (field, value) in [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("email", &self.email),
            ("phone", &self.phone),
        ] {
            if value.trim().is_empty() {
                errors.push(FieldError::new(field, "is required"));
            }
        }

        if !self.email.trim().is_empty() && !is_email(&self.email) {
            errors.push(FieldError::new("email", "must be an email address"));
        }

        if self.quantity < 1 {
            errors.push(FieldError::new("quantity", "must be at least 1"));
        } else if self.quantity > max_quantity {
            errors.push(FieldError::new("quantity", format!("must be at most {}", max_quantity)));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn optional(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl CheckoutDraft {
    pub fn special_requests(&self) -> Option<String> {
        optional(&self.special_requests)
    }

    pub fn preferred_date(&self) -> Option<String> {
        optional(&self.preferred_date)
    }

    pub fn time_slot(&self) -> Option<String> {
        optional(&self.time_slot)
    }
}
