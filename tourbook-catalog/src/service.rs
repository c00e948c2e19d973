use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;
use tourbook_core::repository::{find_records, get_record, insert_record, list_records, update_record};
use tourbook_core::{Collection, DocumentStore, StoreError, Stored};

use crate::blog::{BlogInput, BlogPost};
use crate::listing::{related, ListingQuery};
use crate::product::{Listable, Package, PackageInput, ProductKind, ProductSnapshot, Tour, TourInput};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{0} not found: {1}")]
    NotFound(&'static str, Uuid),
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedListing {
    pub packages: Vec<Stored<Package>>,
    pub tours: Vec<Stored<Tour>>,
}

/// Packages, tours and blog posts over the document store. Listings are a
/// whole-collection fetch filtered in process; the only store-side predicate
/// is `featured == true`.
pub struct CatalogService {
    store: Arc<dyn DocumentStore>,
}

fn validate_listing(title: &str, price: f64) -> CatalogResult<()> {
    if title.trim().is_empty() {
        return Err(CatalogError::Invalid("title is required".to_string()));
    }
    if !price.is_finite() || price < 0.0 {
        return Err(CatalogError::Invalid(format!("price must be a non-negative number, got {}", price)));
    }
    Ok(())
}

impl CatalogService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn list_kind<T>(&self, collection: Collection, query: &ListingQuery) -> CatalogResult<Vec<Stored<T>>>
    where
        T: Listable + DeserializeOwned,
    {
        let items = if query.featured == Some(true) {
            find_records(self.store.as_ref(), collection, "featured", &Value::Bool(true)).await?
        } else {
            list_records(self.store.as_ref(), collection).await?
        };
        Ok(query.apply(items))
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        collection: Collection,
        label: &'static str,
        id: Uuid,
    ) -> CatalogResult<Stored<T>> {
        get_record(self.store.as_ref(), collection, id)
            .await?
            .ok_or(CatalogError::NotFound(label, id))
    }

    async fn save_new<T: Serialize + Sync>(&self, collection: Collection, record: T) -> CatalogResult<Stored<T>> {
        let id = insert_record(self.store.as_ref(), collection, &record).await?;
        tracing::info!("Created {}/{}", collection, id);
        Ok(Stored { id, record })
    }

    async fn save_existing<T: Serialize + Sync>(
        &self,
        collection: Collection,
        id: Uuid,
        record: T,
    ) -> CatalogResult<Stored<T>> {
        update_record(self.store.as_ref(), collection, id, &record).await?;
        tracing::info!("Updated {}/{}", collection, id);
        Ok(Stored { id, record })
    }

    async fn remove(&self, collection: Collection, label: &'static str, id: Uuid) -> CatalogResult<()> {
        match self.store.delete(collection, id).await {
            Ok(()) => {
                tracing::info!("Deleted {}/{}", collection, id);
                Ok(())
            }
            Err(StoreError::NotFound { .. }) => Err(CatalogError::NotFound(label, id)),
            Err(e) => Err(e.into()),
        }
    }

    // ------------------------------------------------------------------
    // Packages
    // ------------------------------------------------------------------

    pub async fn list_packages(&self, query: &ListingQuery) -> CatalogResult<Vec<Stored<Package>>> {
        self.list_kind(Collection::Packages, query).await
    }

    pub async fn package(&self, id: Uuid) -> CatalogResult<Stored<Package>> {
        self.fetch(Collection::Packages, "Package", id).await
    }

    pub async fn related_packages(&self, id: Uuid, limit: Option<usize>) -> CatalogResult<Vec<Stored<Package>>> {
        let all = list_records(self.store.as_ref(), Collection::Packages).await?;
        Ok(related(all, id, limit))
    }

    pub async fn create_package(&self, input: PackageInput) -> CatalogResult<Stored<Package>> {
        validate_listing(&input.title, input.price)?;
        self.save_new(Collection::Packages, input.into_package(None, Utc::now())).await
    }

    pub async fn update_package(&self, id: Uuid, input: PackageInput) -> CatalogResult<Stored<Package>> {
        validate_listing(&input.title, input.price)?;
        let existing: Stored<Package> = self.package(id).await?;
        let package = input.into_package(existing.record.created_at, Utc::now());
        self.save_existing(Collection::Packages, id, package).await
    }

    pub async fn delete_package(&self, id: Uuid) -> CatalogResult<()> {
        self.remove(Collection::Packages, "Package", id).await
    }

    // ------------------------------------------------------------------
    // Tours
    // ------------------------------------------------------------------

    pub async fn list_tours(&self, query: &ListingQuery) -> CatalogResult<Vec<Stored<Tour>>> {
        self.list_kind(Collection::Tours, query).await
    }

    pub async fn tour(&self, id: Uuid) -> CatalogResult<Stored<Tour>> {
        self.fetch(Collection::Tours, "Tour", id).await
    }

    pub async fn related_tours(&self, id: Uuid, limit: Option<usize>) -> CatalogResult<Vec<Stored<Tour>>> {
        let all = list_records(self.store.as_ref(), Collection::Tours).await?;
        Ok(related(all, id, limit))
    }

    pub async fn create_tour(&self, input: TourInput) -> CatalogResult<Stored<Tour>> {
        validate_listing(&input.title, input.price)?;
        self.save_new(Collection::Tours, input.into_tour(None, Utc::now())).await
    }

    pub async fn update_tour(&self, id: Uuid, input: TourInput) -> CatalogResult<Stored<Tour>> {
        validate_listing(&input.title, input.price)?;
        let existing: Stored<Tour> = self.tour(id).await?;
        let tour = input.into_tour(existing.record.created_at, Utc::now());
        self.save_existing(Collection::Tours, id, tour).await
    }

    pub async fn delete_tour(&self, id: Uuid) -> CatalogResult<()> {
        self.remove(Collection::Tours, "Tour", id).await
    }

    // ------------------------------------------------------------------
    // Shared
    // ------------------------------------------------------------------

    pub async fn featured(&self) -> CatalogResult<FeaturedListing> {
        let query = ListingQuery { featured: Some(true), ..Default::default() };
        Ok(FeaturedListing {
            packages: self.list_packages(&query).await?,
            tours: self.list_tours(&query).await?,
        })
    }

    /// Price snapshot a checkout session is opened with.
    pub async fn snapshot(&self, kind: ProductKind, id: Uuid) -> CatalogResult<ProductSnapshot> {
        match kind {
            ProductKind::Package => Ok(ProductSnapshot::of(&self.package(id).await?)),
            ProductKind::Tour => Ok(ProductSnapshot::of(&self.tour(id).await?)),
        }
    }

    // ------------------------------------------------------------------
    // Blog
    // ------------------------------------------------------------------

    pub async fn list_blogs(&self, featured_only: bool) -> CatalogResult<Vec<Stored<BlogPost>>> {
        let posts = if featured_only {
            find_records(self.store.as_ref(), Collection::Blogs, "featured", &Value::Bool(true)).await?
        } else {
            list_records(self.store.as_ref(), Collection::Blogs).await?
        };
        Ok(posts)
    }

    pub async fn blog(&self, id: Uuid) -> CatalogResult<Stored<BlogPost>> {
        self.fetch(Collection::Blogs, "Blog post", id).await
    }

    pub async fn create_blog(&self, input: BlogInput) -> CatalogResult<Stored<BlogPost>> {
        if input.title.trim().is_empty() {
            return Err(CatalogError::Invalid("title is required".to_string()));
        }
        self.save_new(Collection::Blogs, input.into_post(Utc::now())).await
    }

    pub async fn update_blog(&self, id: Uuid, input: BlogInput) -> CatalogResult<Stored<BlogPost>> {
        if input.title.trim().is_empty() {
            return Err(CatalogError::Invalid("title is required".to_string()));
        }
        self.blog(id).await?;
        self.save_existing(Collection::Blogs, id, input.into_post(Utc::now())).await
    }

    pub async fn delete_blog(&self, id: Uuid) -> CatalogResult<()> {
        self.remove(Collection::Blogs, "Blog post", id).await
    }
}
