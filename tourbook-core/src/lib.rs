pub mod events;
pub mod media;
pub mod payment;
pub mod pending;
pub mod repository;

pub use repository::{Collection, Document, DocumentStore, StoreError, StoreResult, Stored};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Configuration missing: {0}")]
    ConfigurationError(String),
    #[error("Provider request failed: {0}")]
    ProviderError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
