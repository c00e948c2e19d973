use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tourbook_booking::{CheckoutError, FieldError, RecordsError};
use tourbook_catalog::CatalogError;
use tourbook_core::{CoreError, StoreError};

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    /// Form submission blocked; lists the offending fields.
    FieldErrors(Vec<FieldError>),
    NotFoundError(String),
    ConflictError(String),
    UpstreamError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::FieldErrors(fields) => {
                let body = Json(json!({
                    "error": "Form is incomplete",
                    "fields": fields,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::UpstreamError(msg) => {
                tracing::warn!("Upstream failure: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => AppError::NotFoundError(err.to_string()),
            StoreError::InvalidDocument => AppError::ValidationError(err.to_string()),
            StoreError::Duplicate { .. } => AppError::ConflictError(err.to_string()),
            StoreError::Backend(_) | StoreError::Serialization(_) => {
                AppError::InternalServerError(err.to_string())
            }
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => AppError::ValidationError(msg),
            CoreError::ProviderError(msg) => AppError::UpstreamError(msg),
            CoreError::ConfigurationError(_) | CoreError::InternalError(_) => {
                AppError::InternalServerError(err.to_string())
            }
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(..) => AppError::NotFoundError(err.to_string()),
            CatalogError::Invalid(msg) => AppError::ValidationError(msg),
            CatalogError::Store(e) => e.into(),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::NotFound(_) => AppError::NotFoundError(err.to_string()),
            CheckoutError::InvalidTransition { .. } | CheckoutError::PaymentInProgress(_) => {
                AppError::ConflictError(err.to_string())
            }
            CheckoutError::UnknownField(_) | CheckoutError::ReferenceMismatch { .. } => {
                AppError::ValidationError(err.to_string())
            }
            CheckoutError::Validation(fields) => AppError::FieldErrors(fields),
            CheckoutError::Catalog(e) => e.into(),
        }
    }
}

impl From<RecordsError> for AppError {
    fn from(err: RecordsError) -> Self {
        match err {
            RecordsError::NotFound(..) => AppError::NotFoundError(err.to_string()),
            RecordsError::InvalidTransition { .. } => AppError::ConflictError(err.to_string()),
            RecordsError::Store(e) => e.into(),
        }
    }
}
