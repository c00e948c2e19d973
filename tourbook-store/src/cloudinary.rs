use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{error, info};
use tourbook_core::media::{ImageHost, ImageUpload, UploadedImage};
use tourbook_core::{CoreError, CoreResult};

/// Unsigned uploads to Cloudinary using an upload preset.
#[derive(Clone)]
pub struct CloudinaryImageHost {
    http: reqwest::Client,
    upload_url: String,
    upload_preset: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    public_id: Option<String>,
    error: Option<UploadError>,
}

#[derive(Debug, Deserialize)]
struct UploadError {
    message: String,
}

impl CloudinaryImageHost {
    pub fn new(api_base_url: &str, cloud_name: &str, upload_preset: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            upload_url: format!(
                "{}/{}/image/upload",
                api_base_url.trim_end_matches('/'),
                cloud_name
            ),
            upload_preset: upload_preset.to_string(),
        }
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }
}

fn parse_response(resp: UploadResponse) -> CoreResult<UploadedImage> {
    match (resp.secure_url, resp.error) {
        (Some(secure_url), _) => Ok(UploadedImage {
            secure_url,
            public_id: resp.public_id,
        }),
        (None, Some(err)) => Err(CoreError::ProviderError(format!("cloudinary: {}", err.message))),
        (None, None) => Err(CoreError::ProviderError(
            "cloudinary: response carried no secure_url".to_string(),
        )),
    }
}

#[async_trait]
impl ImageHost for CloudinaryImageHost {
    async fn upload(&self, image: ImageUpload) -> CoreResult<UploadedImage> {
        let file_name = image.file_name.clone();
        let mut part = Part::bytes(image.bytes).file_name(image.file_name);
        if let Some(content_type) = image.content_type.as_deref() {
            part = part
                .mime_str(content_type)
                .map_err(|e| CoreError::ValidationError(format!("content type: {}", e)))?;
        }

        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone());

        let resp: UploadResponse = self
            .http
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!("Image upload of {} failed: {}", file_name, e);
                CoreError::ProviderError(format!("cloudinary: {}", e))
            })?
            .json()
            .await
            .map_err(|e| CoreError::ProviderError(format!("cloudinary response: {}", e)))?;

        let uploaded = parse_response(resp)?;
        info!("Uploaded {} -> {}", file_name, uploaded.secure_url);
        Ok(uploaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_url_shape() {
        let host = CloudinaryImageHost::new("https://api.cloudinary.com/v1_1/", "demo", "unsigned");
        assert_eq!(host.upload_url(), "https://api.cloudinary.com/v1_1/demo/image/upload");
    }

    #[test]
    fn test_parse_success_and_error() {
        let ok: UploadResponse = serde_json::from_str(
            r#"{"secure_url":"https://res.cloudinary.com/demo/a.jpg","public_id":"a","bytes":12}"#,
        )
        .unwrap();
        assert_eq!(parse_response(ok).unwrap().public_id.as_deref(), Some("a"));

        let err: UploadResponse =
            serde_json::from_str(r#"{"error":{"message":"Upload preset not found"}}"#).unwrap();
        assert!(matches!(parse_response(err), Err(CoreError::ProviderError(m)) if m.contains("preset")));
    }
}
