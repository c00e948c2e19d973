use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use tourbook_catalog::service::FeaturedListing;
use tourbook_catalog::{BlogPost, ListingQuery, Package, Tour};
use tourbook_core::Stored;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct RelatedQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct BlogQuery {
    #[serde(default)]
    pub featured: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/packages", get(list_packages))
        .route("/v1/packages/{id}", get(get_package))
        .route("/v1/packages/{id}/related", get(related_packages))
        .route("/v1/tours", get(list_tours))
        .route("/v1/tours/{id}", get(get_tour))
        .route("/v1/tours/{id}/related", get(related_tours))
        .route("/v1/featured", get(featured))
        .route("/v1/blogs", get(list_blogs))
        .route("/v1/blogs/{id}", get(get_blog))
}

async fn list_packages(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<Vec<Stored<Package>>>, AppError> {
    Ok(Json(state.catalog.list_packages(&query).await?))
}

async fn get_package(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Stored<Package>>, AppError> {
    Ok(Json(state.catalog.package(id).await?))
}

async fn related_packages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<RelatedQuery>,
) -> Result<Json<Vec<Stored<Package>>>, AppError> {
    Ok(Json(state.catalog.related_packages(id, query.limit).await?))
}

async fn list_tours(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<Vec<Stored<Tour>>>, AppError> {
    Ok(Json(state.catalog.list_tours(&query).await?))
}

async fn get_tour(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Stored<Tour>>, AppError> {
    Ok(Json(state.catalog.tour(id).await?))
}

async fn related_tours(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<RelatedQuery>,
) -> Result<Json<Vec<Stored<Tour>>>, AppError> {
    Ok(Json(state.catalog.related_tours(id, query.limit).await?))
}

async fn featured(State(state): State<AppState>) -> Result<Json<FeaturedListing>, AppError> {
    Ok(Json(state.catalog.featured().await?))
}

async fn list_blogs(
    State(state): State<AppState>,
    Query(query): Query<BlogQuery>,
) -> Result<Json<Vec<Stored<BlogPost>>>, AppError> {
    Ok(Json(state.catalog.list_blogs(query.featured).await?))
}

async fn get_blog(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Stored<BlogPost>>, AppError> {
    Ok(Json(state.catalog.blog(id).await?))
}
