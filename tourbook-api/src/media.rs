use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use futures_util::future::try_join_all;
use serde::Serialize;
use tourbook_core::media::{ImageUpload, UploadedImage};

use crate::{error::AppError, state::AppState};

/// Files accepted in one upload request.
pub const MAX_FILES_PER_REQUEST: usize = 10;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub images: Vec<UploadedImage>,
}

/// Image upload for the admin forms. Each file is checked against
/// `max_upload_bytes`; the request body may hold a full batch.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    let body_limit = max_upload_bytes.saturating_mul(MAX_FILES_PER_REQUEST);
    Router::new()
        .route("/v1/admin/images", post(upload_images))
        .layer(DefaultBodyLimit::max(body_limit))
}

async fn upload_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::ValidationError(format!("Multipart error: {e}")))?
    {
        // Only file parts are images; plain form fields are ignored.
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::ValidationError(format!("Read error: {e}")))?;

        if bytes.is_empty() {
            return Err(AppError::ValidationError(format!("Empty file: {file_name}")));
        }
        if bytes.len() > state.max_upload_bytes {
            return Err(AppError::ValidationError(format!(
                "File too large: {} bytes (max {})",
                bytes.len(),
                state.max_upload_bytes
            )));
        }
        if uploads.len() == MAX_FILES_PER_REQUEST {
            return Err(AppError::ValidationError(format!(
                "At most {} files per upload",
                MAX_FILES_PER_REQUEST
            )));
        }
        uploads.push(ImageUpload { file_name, content_type, bytes: bytes.to_vec() });
    }

    if uploads.is_empty() {
        return Err(AppError::ValidationError("No file provided".to_string()));
    }

    let count = uploads.len();
    let images = try_join_all(uploads.into_iter().map(|upload| state.images.upload(upload))).await?;
    tracing::info!("Uploaded {} images", count);

    Ok(Json(UploadResponse { images }))
}
