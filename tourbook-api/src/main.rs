use std::net::SocketAddr;
use std::sync::Arc;
use anyhow::Context;
use tourbook_api::{app, state::Integrations, worker, AppState};
use tourbook_core::events::EventPublisher;
use tourbook_core::payment::TransactionVerifier;
use tourbook_core::pending::PendingWriteLog;
use tourbook_core::DocumentStore;
use tourbook_store::app_config::{Config, StoreBackend};
use tourbook_store::{
    CloudinaryImageHost, EventProducer, InlinePopupLauncher, LogEventPublisher, MemoryDocumentStore,
    MemoryPendingLog, PaystackClient, PgDocumentStore, RedisPendingLog,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tourbook_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Tourbook API on port {}", config.server.port);

    // Document store
    let store: Arc<dyn DocumentStore> = match config.store.backend {
        StoreBackend::Postgres => {
            let url = config
                .store
                .url
                .as_deref()
                .context("store.url is required for the postgres backend")?;
            let db = PgDocumentStore::connect(url, config.store.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Arc::new(db)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory document store; data is lost on restart");
            Arc::new(MemoryDocumentStore::new())
        }
    };

    // Pending-write log
    let pending: Arc<dyn PendingWriteLog> = match &config.redis {
        Some(redis) => Arc::new(
            RedisPendingLog::new(&redis.url)
                .await
                .context("Failed to connect to Redis")?,
        ),
        None => {
            tracing::warn!("No redis configured; pending booking writes are kept in memory");
            Arc::new(MemoryPendingLog::new())
        }
    };

    // Booking events
    let events: Arc<dyn EventPublisher> = match &config.kafka {
        Some(kafka) => Arc::new(EventProducer::new(&kafka.brokers).context("Failed to create Kafka producer")?),
        None => Arc::new(LogEventPublisher),
    };

    let verifier: Option<Arc<dyn TransactionVerifier>> = if config.payment.verify_transactions {
        let secret = config
            .payment
            .secret_key
            .as_deref()
            .context("payment.secret_key is required when verify_transactions is on")?;
        Some(Arc::new(PaystackClient::new(&config.payment.api_base_url, secret)))
    } else {
        None
    };

    if config.payment.public_key().is_none() {
        tracing::warn!("No payment public key configured; every checkout will fail at submit");
    }

    let images = Arc::new(CloudinaryImageHost::new(
        &config.media.api_base_url,
        &config.media.cloud_name,
        &config.media.upload_preset,
    ));

    let app_state = AppState::new(
        &config,
        Integrations {
            store,
            pending,
            events,
            launcher: Arc::new(InlinePopupLauncher),
            verifier,
            images,
        },
    );

    tokio::spawn(worker::start_maintenance_worker(
        app_state.reconciler.clone(),
        app_state.checkout.clone(),
        config.reconciliation.interval_seconds,
    ));

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
