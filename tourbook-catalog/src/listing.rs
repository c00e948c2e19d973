use serde::Deserialize;
use std::cmp::Ordering;
use uuid::Uuid;
use tourbook_core::Stored;

use crate::product::Listable;

/// Storefront sort options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Featured items first, otherwise store order.
    #[default]
    Featured,
    PriceLow,
    PriceHigh,
    Rating,
    Duration,
}

impl SortOrder {
    /// Unknown values fall back to the featured ordering.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "price-low" => SortOrder::PriceLow,
            "price-high" => SortOrder::PriceHigh,
            "rating" => SortOrder::Rating,
            "duration" => SortOrder::Duration,
            _ => SortOrder::Featured,
        }
    }
}

/// Query string of the public listing endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingQuery {
    pub sort: Option<String>,
    pub featured: Option<bool>,
    /// Matches a package destination or a tour location, case-insensitively.
    pub destination: Option<String>,
    pub category: Option<String>,
    pub limit: Option<usize>,
}

impl ListingQuery {
    pub fn sort_order(&self) -> SortOrder {
        self.sort.as_deref().map(SortOrder::parse).unwrap_or_default()
    }

    fn matches<T: Listable>(&self, item: &T) -> bool {
        if let Some(featured) = self.featured {
            if item.featured() != featured {
                return false;
            }
        }
        if let Some(destination) = self.destination.as_deref().filter(|d| !d.is_empty()) {
            if !item.place().to_lowercase().contains(&destination.to_lowercase()) {
                return false;
            }
        }
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            match item.category() {
                Some(c) if c.eq_ignore_ascii_case(category) => {}
                _ => return false,
            }
        }
        true
    }

    /// Filter, sort and truncate a whole-collection fetch.
    pub fn apply<T: Listable>(&self, items: Vec<Stored<T>>) -> Vec<Stored<T>> {
        let mut selected: Vec<Stored<T>> =
            items.into_iter().filter(|s| self.matches(&s.record)).collect();
        sort_listing(&mut selected, self.sort_order());
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

/// Leading whole number of a free-text duration ("5 days" → 5).
pub fn duration_days(duration: &str) -> Option<u32> {
    let digits: String = duration
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Stable sort; items missing the sort key go last.
pub fn sort_listing<T: Listable>(items: &mut [Stored<T>], order: SortOrder) {
    match order {
        SortOrder::Featured => {
            items.sort_by_key(|s| !s.record.featured());
        }
        SortOrder::PriceLow => {
            items.sort_by(|a, b| cmp_f64(a.record.price(), b.record.price()));
        }
        SortOrder::PriceHigh => {
            items.sort_by(|a, b| cmp_f64(b.record.price(), a.record.price()));
        }
        SortOrder::Rating => {
            items.sort_by(|a, b| match (a.record.rating(), b.record.rating()) {
                (Some(x), Some(y)) => cmp_f64(y, x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            });
        }
        SortOrder::Duration => {
            items.sort_by(|a, b| {
                match (duration_days(a.record.duration()), duration_days(b.record.duration())) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                }
            });
        }
    }
}

/// Everything except the item being viewed.
pub fn related<T>(items: Vec<Stored<T>>, current: Uuid, limit: Option<usize>) -> Vec<Stored<T>> {
    let others = items.into_iter().filter(|s| s.id != current);
    match limit {
        Some(n) => others.take(n).collect(),
        None => others.collect(),
    }
}
