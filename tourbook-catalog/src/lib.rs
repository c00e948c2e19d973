pub mod blog;
pub mod listing;
pub mod product;
pub mod service;

pub use blog::{BlogInput, BlogPost};
pub use listing::{ListingQuery, SortOrder};
pub use product::{Listable, Package, PackageInput, ProductKind, ProductSnapshot, Tour, TourInput};
pub use service::{CatalogError, CatalogService};
