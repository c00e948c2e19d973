use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::CoreResult;

/// One file received from an admin form, ready to forward to the image host.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub secure_url: String,
    pub public_id: Option<String>,
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, image: ImageUpload) -> CoreResult<UploadedImage>;
}
