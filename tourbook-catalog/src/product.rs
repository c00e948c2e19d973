use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use tourbook_core::{Collection, Stored};

/// The two bookable product families.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    /// Multi-day itinerary.
    Package,
    /// Single-session experience.
    Tour,
}

impl ProductKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProductKind::Package => "package",
            ProductKind::Tour => "tour",
        }
    }

    /// Accepts the names the storefront and back office use for each family.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "package" | "packages" | "travel" => Some(ProductKind::Package),
            "tour" | "tours" => Some(ProductKind::Tour),
            _ => None,
        }
    }

    pub const fn catalog_collection(&self) -> Collection {
        match self {
            ProductKind::Package => Collection::Packages,
            ProductKind::Tour => Collection::Tours,
        }
    }

    pub const fn booking_collection(&self) -> Collection {
        match self {
            ProductKind::Package => Collection::TravelBookings,
            ProductKind::Tour => Collection::TourBookings,
        }
    }
}

/// Fields every listing view reads, whatever the product family.
pub trait Listable {
    fn kind() -> ProductKind;
    fn title(&self) -> &str;
    fn price(&self) -> f64;
    fn rating(&self) -> Option<f64>;
    fn duration(&self) -> &str;
    fn featured(&self) -> bool;
    /// Package destination or tour location.
    fn place(&self) -> &str;
    fn category(&self) -> Option<&str>;
    fn capacity(&self) -> Option<u32>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default, deserialize_with = "text_or_number")]
    pub duration: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub itinerary: String,
    #[serde(default, deserialize_with = "lines")]
    pub includes: Vec<String>,
    #[serde(default, deserialize_with = "lines")]
    pub excludes: Vec<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Listable for Package {
    fn kind() -> ProductKind {
        ProductKind::Package
    }
    fn title(&self) -> &str {
        &self.title
    }
    fn price(&self) -> f64 {
        self.price
    }
    fn rating(&self) -> Option<f64> {
        self.rating
    }
    fn duration(&self) -> &str {
        &self.duration
    }
    fn featured(&self) -> bool {
        self.featured
    }
    fn place(&self) -> &str {
        &self.destination
    }
    fn category(&self) -> Option<&str> {
        None
    }
    fn capacity(&self) -> Option<u32> {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default, deserialize_with = "text_or_number")]
    pub duration: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub schedule: String,
    #[serde(default, deserialize_with = "lines")]
    pub highlights: Vec<String>,
    #[serde(default, deserialize_with = "lines")]
    pub includes: Vec<String>,
    #[serde(default)]
    pub meeting_point: Option<String>,
    #[serde(default)]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Listable for Tour {
    fn kind() -> ProductKind {
        ProductKind::Tour
    }
    fn title(&self) -> &str {
        &self.title
    }
    fn price(&self) -> f64 {
        self.price
    }
    fn rating(&self) -> Option<f64> {
        self.rating
    }
    fn duration(&self) -> &str {
        &self.duration
    }
    fn featured(&self) -> bool {
        self.featured
    }
    fn place(&self) -> &str {
        &self.location
    }
    fn category(&self) -> Option<&str> {
        Some(&self.category)
    }
    fn capacity(&self) -> Option<u32> {
        self.max_participants
    }
}

/// Read-only copy of the product a checkout is for. The booking keeps this
/// denormalised; it is not a foreign key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub kind: ProductKind,
    pub product_id: Uuid,
    pub title: String,
    pub price: f64,
    pub capacity: Option<u32>,
}

impl ProductSnapshot {
    pub fn of<T: Listable>(stored: &Stored<T>) -> Self {
        Self {
            kind: T::kind(),
            product_id: stored.id,
            title: stored.record.title().to_string(),
            price: stored.record.price(),
            capacity: stored.record.capacity(),
        }
    }
}

/// Admin form payload for a package.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default, deserialize_with = "text_or_number")]
    pub duration: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub itinerary: String,
    #[serde(default, deserialize_with = "lines")]
    pub includes: Vec<String>,
    #[serde(default, deserialize_with = "lines")]
    pub excludes: Vec<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub rating: Option<f64>,
}

impl PackageInput {
    pub fn into_package(self, created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Package {
        Package {
            title: self.title.trim().to_string(),
            description: self.description,
            price: self.price,
            duration: self.duration,
            destination: self.destination,
            images: self.images,
            itinerary: self.itinerary,
            includes: self.includes,
            excludes: self.excludes,
            featured: self.featured,
            rating: self.rating,
            created_at: created_at.or(Some(now)),
            updated_at: Some(now),
        }
    }
}

/// Admin form payload for a tour.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default, deserialize_with = "text_or_number")]
    pub duration: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub schedule: String,
    #[serde(default, deserialize_with = "lines")]
    pub highlights: Vec<String>,
    #[serde(default, deserialize_with = "lines")]
    pub includes: Vec<String>,
    #[serde(default)]
    pub meeting_point: Option<String>,
    #[serde(default)]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub rating: Option<f64>,
}

impl TourInput {
    pub fn into_tour(self, created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Tour {
        Tour {
            title: self.title.trim().to_string(),
            description: self.description,
            price: self.price,
            duration: self.duration,
            location: self.location,
            category: self.category,
            images: self.images,
            schedule: self.schedule,
            highlights: self.highlights,
            includes: self.includes,
            meeting_point: self.meeting_point.filter(|m| !m.trim().is_empty()),
            max_participants: self.max_participants,
            featured: self.featured,
            rating: self.rating,
            created_at: created_at.or(Some(now)),
            updated_at: Some(now),
        }
    }
}

/// Tour categories offered by the back office form.
pub const TOUR_CATEGORIES: [&str; 6] =
    ["Adventure", "Cultural", "Nature", "Food & Drink", "Historical", "Photography"];

pub fn split_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LinesOrList {
    Text(String),
    List(Vec<String>),
}

/// Accepts either a JSON list or newline-separated text (textarea input).
fn lines<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<LinesOrList>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(LinesOrList::Text(text)) => split_lines(&text),
        Some(LinesOrList::List(items)) => items
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Number(f64),
}

fn text_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<TextOrNumber>::deserialize(deserializer)? {
        None => String::new(),
        Some(TextOrNumber::Text(text)) => text,
        Some(TextOrNumber::Number(n)) if n.fract() == 0.0 => format!("{}", n as i64),
        Some(TextOrNumber::Number(n)) => n.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_parse_accepts_storefront_names() {
        assert_eq!(ProductKind::parse("travel"), Some(ProductKind::Package));
        assert_eq!(ProductKind::parse("Packages"), Some(ProductKind::Package));
        assert_eq!(ProductKind::parse("tours"), Some(ProductKind::Tour));
        assert_eq!(ProductKind::parse("cruise"), None);
        assert_eq!(ProductKind::Tour.booking_collection(), Collection::TourBookings);
    }

    #[test]
    fn test_package_input_splits_textarea_lines() {
        let input: PackageInput = serde_json::from_value(json!({
            "title": "  Zanzibar Escape ",
            "price": 450000,
            "duration": 5,
            "includes": "Flights\n\n Hotel \n",
            "excludes": ["Visa", " "]
        }))
        .unwrap();
        let now = Utc::now();
        let package = input.into_package(None, now);

        assert_eq!(package.title, "Zanzibar Escape");
        assert_eq!(package.duration, "5");
        assert_eq!(package.includes, vec!["Flights", "Hotel"]);
        assert_eq!(package.excludes, vec!["Visa"]);
        assert_eq!(package.created_at, Some(now));
    }

    #[test]
    fn test_update_keeps_original_creation_time() {
        let created = Utc::now() - chrono::Duration::days(3);
        let input: TourInput = serde_json::from_value(json!({
            "title": "Lekki Walk",
            "price": 15000.0,
            "maxParticipants": 12,
            "meetingPoint": "  "
        }))
        .unwrap();
        let tour = input.into_tour(Some(created), Utc::now());
        assert_eq!(tour.created_at, Some(created));
        assert_eq!(tour.meeting_point, None);
        assert_eq!(tour.capacity(), Some(12));
    }

    #[test]
    fn test_snapshot_copies_listing_fields() {
        let id = Uuid::new_v4();
        let stored = Stored {
            id,
            record: serde_json::from_value::<Tour>(json!({
                "title": "Olumo Rock",
                "price": 25000,
                "maxParticipants": 8
            }))
            .unwrap(),
        };
        let snapshot = ProductSnapshot::of(&stored);
        assert_eq!(snapshot.kind, ProductKind::Tour);
        assert_eq!(snapshot.product_id, id);
        assert_eq!(snapshot.price, 25000.0);
        assert_eq!(snapshot.capacity, Some(8));
    }
}
