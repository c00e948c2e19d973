use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;
use tourbook_booking::{Booking, BookingStatus, NormalizeReport, Overview};
use tourbook_catalog::{BlogInput, BlogPost, Package, PackageInput, Tour, TourInput};
use tourbook_core::pending::PendingWrite;
use tourbook_core::Stored;

use crate::{checkout::parse_kind, error::AppError, middleware::auth::AdminClaims, state::AppState};

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct BookingFilter {
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub status: String,
}

/// Admin routes. Mounted behind `admin_auth_middleware`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/packages", get(list_packages).post(create_package))
        .route("/v1/admin/packages/{id}", put(update_package).delete(delete_package))
        .route("/v1/admin/tours", get(list_tours).post(create_tour))
        .route("/v1/admin/tours/{id}", put(update_tour).delete(delete_tour))
        .route("/v1/admin/blogs", get(list_blogs).post(create_blog))
        .route("/v1/admin/blogs/{id}", put(update_blog).delete(delete_blog))
        .route("/v1/admin/bookings", get(list_bookings))
        .route("/v1/admin/bookings/normalize", post(normalize_bookings))
        .route("/v1/admin/bookings/{kind}/{id}", get(get_booking))
        .route("/v1/admin/bookings/{kind}/{id}/status", patch(change_booking_status))
        .route("/v1/admin/overview", get(overview))
        .route("/v1/admin/pending-writes", get(pending_writes))
}

// ============================================================================
// Packages
// ============================================================================

async fn list_packages(State(state): State<AppState>) -> Result<Json<Vec<Stored<Package>>>, AppError> {
    let packages = state.catalog.list_packages(&Default::default()).await?;
    Ok(Json(packages))
}

async fn create_package(
    State(state): State<AppState>,
    Json(input): Json<PackageInput>,
) -> Result<(StatusCode, Json<Stored<Package>>), AppError> {
    let package = state.catalog.create_package(input).await?;
    tracing::info!("Created package {}", package.id);
    Ok((StatusCode::CREATED, Json(package)))
}

async fn update_package(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<PackageInput>,
) -> Result<Json<Stored<Package>>, AppError> {
    Ok(Json(state.catalog.update_package(id, input).await?))
}

async fn delete_package(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, AppError> {
    state.catalog.delete_package(id).await?;
    tracing::info!("Deleted package {}", id);
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Tours
// ============================================================================

async fn list_tours(State(state): State<AppState>) -> Result<Json<Vec<Stored<Tour>>>, AppError> {
    let tours = state.catalog.list_tours(&Default::default()).await?;
    Ok(Json(tours))
}

async fn create_tour(
    State(state): State<AppState>,
    Json(input): Json<TourInput>,
) -> Result<(StatusCode, Json<Stored<Tour>>), AppError> {
    let tour = state.catalog.create_tour(input).await?;
    tracing::info!("Created tour {}", tour.id);
    Ok((StatusCode::CREATED, Json(tour)))
}

async fn update_tour(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<TourInput>,
) -> Result<Json<Stored<Tour>>, AppError> {
    Ok(Json(state.catalog.update_tour(id, input).await?))
}

async fn delete_tour(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, AppError> {
    state.catalog.delete_tour(id).await?;
    tracing::info!("Deleted tour {}", id);
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Blogs
// ============================================================================

async fn list_blogs(State(state): State<AppState>) -> Result<Json<Vec<Stored<BlogPost>>>, AppError> {
    Ok(Json(state.catalog.list_blogs(false).await?))
}

async fn create_blog(
    State(state): State<AppState>,
    Json(input): Json<BlogInput>,
) -> Result<(StatusCode, Json<Stored<BlogPost>>), AppError> {
    let post = state.catalog.create_blog(input).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn update_blog(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<BlogInput>,
) -> Result<Json<Stored<BlogPost>>, AppError> {
    Ok(Json(state.catalog.update_blog(id, input).await?))
}

async fn delete_blog(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, AppError> {
    state.catalog.delete_blog(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Bookings
// ============================================================================

async fn list_bookings(
    State(state): State<AppState>,
    Query(filter): Query<BookingFilter>,
) -> Result<Json<Vec<Stored<Booking>>>, AppError> {
    let kind = filter.kind.as_deref().map(parse_kind).transpose()?;
    Ok(Json(state.records.list(kind).await?))
}

async fn get_booking(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<Json<Stored<Booking>>, AppError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(state.records.get(kind, id).await?))
}

async fn change_booking_status(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path((kind, id)): Path<(String, Uuid)>,
    Json(req): Json<StatusChangeRequest>,
) -> Result<Json<Stored<Booking>>, AppError> {
    let kind = parse_kind(&kind)?;
    let next = BookingStatus::parse(&req.status)
        .ok_or_else(|| AppError::ValidationError(format!("Unknown booking status: {}", req.status)))?;
    let booking = state.records.set_status(kind, id, next, &claims.email).await?;
    Ok(Json(booking))
}

async fn normalize_bookings(State(state): State<AppState>) -> Result<Json<NormalizeReport>, AppError> {
    let report = state.records.normalize_legacy().await?;
    tracing::info!(
        "Normalised bookings: {} scanned, {} rewritten, {} unreadable",
        report.scanned,
        report.rewritten,
        report.unreadable
    );
    Ok(Json(report))
}

// ============================================================================
// Dashboard
// ============================================================================

async fn overview(State(state): State<AppState>) -> Result<Json<Overview>, AppError> {
    Ok(Json(state.records.overview().await?))
}

async fn pending_writes(State(state): State<AppState>) -> Result<Json<Vec<PendingWrite>>, AppError> {
    Ok(Json(state.pending.list().await?))
}
