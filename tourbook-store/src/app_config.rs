use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub kafka: Option<KafkaConfig>,
    pub auth: AuthConfig,
    pub payment: PaymentConfig,
    pub media: MediaConfig,
    #[serde(default)]
    pub checkout: CheckoutConfig,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdminAccount {
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
    #[serde(default)]
    pub admins: Vec<AdminAccount>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    /// Public key handed to the popup SDK. Checkout fails fast without it.
    #[serde(default)]
    pub public_key: Option<String>,
    /// Secret key, only needed when transactions are verified server-side.
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_reference_prefix")]
    pub reference_prefix: String,
    #[serde(default)]
    pub verify_transactions: bool,
    #[serde(default = "default_paystack_url")]
    pub api_base_url: String,
}

fn default_currency() -> String { tourbook_shared::money::DEFAULT_CURRENCY.to_string() }
fn default_reference_prefix() -> String { "BAO".to_string() }
fn default_paystack_url() -> String { "https://api.paystack.co".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct MediaConfig {
    pub cloud_name: String,
    pub upload_preset: String,
    #[serde(default = "default_cloudinary_url")]
    pub api_base_url: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_cloudinary_url() -> String { "https://api.cloudinary.com/v1_1".to_string() }
fn default_max_upload_bytes() -> usize { 10 * 1024 * 1024 }

#[derive(Debug, Deserialize, Clone)]
pub struct CheckoutConfig {
    /// Advisory upper bound of the quantity input.
    #[serde(default = "default_max_quantity")]
    pub max_quantity: i64,
    /// Sessions idle in `form`/`failure` longer than this are dropped.
    #[serde(default = "default_idle_session_seconds")]
    pub idle_session_seconds: u64,
}

fn default_max_quantity() -> i64 { 20 }
fn default_idle_session_seconds() -> u64 { 3600 }

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            max_quantity: default_max_quantity(),
            idle_session_seconds: default_idle_session_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReconciliationConfig {
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_interval_seconds() -> u64 { 60 }
fn default_max_attempts() -> u32 { 10 }

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl PaymentConfig {
    /// Blank keys count as missing.
    pub fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. TOURBOOK__PAYMENT__PUBLIC_KEY=pk_test_...
            .add_source(config::Environment::with_prefix("TOURBOOK").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
