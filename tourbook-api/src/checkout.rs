use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;
use tourbook_booking::CheckoutView;
use tourbook_catalog::ProductKind;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenCheckoutRequest {
    pub kind: String,
    pub product_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct PaymentSuccessRequest {
    pub reference: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/checkout", post(open_checkout))
        .route("/v1/checkout/{id}", get(get_checkout).delete(close_checkout))
        .route("/v1/checkout/{id}/draft", patch(update_draft))
        .route("/v1/checkout/{id}/submit", post(submit_checkout))
        .route("/v1/checkout/{id}/payment/success", post(payment_success))
        .route("/v1/checkout/{id}/payment/cancel", post(payment_cancel))
        .route("/v1/checkout/{id}/retry", post(retry_checkout))
}

pub(crate) fn parse_kind(raw: &str) -> Result<ProductKind, AppError> {
    ProductKind::parse(raw).ok_or_else(|| AppError::ValidationError(format!("Unknown product kind: {}", raw)))
}

/// Form inputs arrive as JSON scalars; the draft takes them as raw text.
fn draft_fields(body: Map<String, Value>) -> Result<Vec<(String, String)>, AppError> {
    body.into_iter()
        .map(|(field, value)| {
            let raw = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => String::new(),
                _ => return Err(AppError::ValidationError(format!("Field {} must be a scalar", field))),
            };
            Ok((field, raw))
        })
        .collect()
}

async fn open_checkout(
    State(state): State<AppState>,
    Json(req): Json<OpenCheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutView>), AppError> {
    let kind = parse_kind(&req.kind)?;
    let view = state.checkout.open(kind, req.product_id).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_checkout(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<CheckoutView>, AppError> {
    Ok(Json(state.checkout.view(id).await?))
}

async fn update_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<CheckoutView>, AppError> {
    let fields = draft_fields(body)?;
    Ok(Json(state.checkout.update_draft(id, &fields).await?))
}

async fn submit_checkout(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<CheckoutView>, AppError> {
    Ok(Json(state.checkout.submit(id).await?))
}

async fn payment_success(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PaymentSuccessRequest>,
) -> Result<Json<CheckoutView>, AppError> {
    Ok(Json(state.checkout.payment_succeeded(id, req.reference.trim()).await?))
}

async fn payment_cancel(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<CheckoutView>, AppError> {
    Ok(Json(state.checkout.payment_cancelled(id).await?))
}

async fn retry_checkout(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<CheckoutView>, AppError> {
    Ok(Json(state.checkout.retry(id).await?))
}

async fn close_checkout(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode, AppError> {
    state.checkout.close(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
