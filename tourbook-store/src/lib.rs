pub mod app_config;
pub mod cloudinary;
pub mod database;
pub mod events;
pub mod memory;
pub mod paystack;
pub mod redis_repo;

pub use cloudinary::CloudinaryImageHost;
pub use database::PgDocumentStore;
pub use events::{EventProducer, LogEventPublisher};
pub use memory::{MemoryDocumentStore, MemoryPendingLog};
pub use paystack::{InlinePopupLauncher, PaystackClient};
pub use redis_repo::RedisPendingLog;
