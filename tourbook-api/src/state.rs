use std::sync::Arc;
use chrono::Duration;
use tourbook_booking::{BookingRecords, CheckoutOrchestrator, CheckoutSettings, Reconciler};
use tourbook_catalog::CatalogService;
use tourbook_core::events::EventPublisher;
use tourbook_core::media::ImageHost;
use tourbook_core::payment::{PaymentLauncher, TransactionVerifier};
use tourbook_core::pending::PendingWriteLog;
use tourbook_core::DocumentStore;
use tourbook_store::app_config::{AdminAccount, Config};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
    pub admins: Vec<AdminAccount>,
}

/// Backends the services are wired to. `main` picks real or in-memory ones
/// from configuration; tests pass stubs.
pub struct Integrations {
    pub store: Arc<dyn DocumentStore>,
    pub pending: Arc<dyn PendingWriteLog>,
    pub events: Arc<dyn EventPublisher>,
    pub launcher: Arc<dyn PaymentLauncher>,
    pub verifier: Option<Arc<dyn TransactionVerifier>>,
    pub images: Arc<dyn ImageHost>,
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService>,
    pub checkout: Arc<CheckoutOrchestrator>,
    pub records: Arc<BookingRecords>,
    pub reconciler: Arc<Reconciler>,
    pub pending: Arc<dyn PendingWriteLog>,
    pub images: Arc<dyn ImageHost>,
    pub auth: AuthConfig,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(config: &Config, deps: Integrations) -> Self {
        let catalog = Arc::new(CatalogService::new(deps.store.clone()));

        let settings = CheckoutSettings {
            public_key: config.payment.public_key().map(str::to_string),
            currency: config.payment.currency.clone(),
            reference_prefix: config.payment.reference_prefix.clone(),
            max_quantity: config.checkout.max_quantity,
            idle_session: Duration::seconds(config.checkout.idle_session_seconds as i64),
        };
        let mut checkout = CheckoutOrchestrator::new(
            catalog.clone(),
            deps.store.clone(),
            deps.launcher,
            deps.pending.clone(),
            deps.events.clone(),
            settings,
        );
        if let Some(verifier) = deps.verifier {
            checkout = checkout.with_verifier(verifier);
        }

        let records = BookingRecords::new(deps.store.clone(), deps.events.clone());
        let reconciler = Reconciler::new(
            deps.store,
            deps.pending.clone(),
            deps.events,
            config.reconciliation.max_attempts,
        );

        Self {
            catalog,
            checkout: Arc::new(checkout),
            records: Arc::new(records),
            reconciler: Arc::new(reconciler),
            pending: deps.pending,
            images: deps.images,
            auth: AuthConfig {
                secret: config.auth.jwt_secret.clone(),
                expiration: config.auth.jwt_expiration_seconds,
                admins: config.auth.admins.clone(),
            },
            max_upload_bytes: config.media.max_upload_bytes,
        }
    }
}
