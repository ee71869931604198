//! Usage Dashboard Server
//!
//! Serves the API key usage dashboard API: key management, usage
//! aggregation, duplicate resolution, and cleanup.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use usage_dashboard::{
    config::{AppConfig, DatabaseConfig, StorageBackend},
    router::build_router,
    scheduler::RefreshScheduler,
    services::{Aggregator, CredentialService},
    state::AppState,
    store::{CredentialStore, MemoryStore, PgCredentialStore},
    usage::HttpUsageFetcher,
};

/// Default encryption key for development (should be overridden in production).
const DEFAULT_ENCRYPTION_KEY: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

/// Initialize tracing/logging.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,usage_dashboard=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Get the encryption key from config or fall back to the default.
fn encryption_key(config: &AppConfig) -> String {
    config.encryption_key.clone().unwrap_or_else(|| {
        tracing::warn!("USAGE_ENCRYPTION_KEY not set, using default (not secure for production)");
        DEFAULT_ENCRYPTION_KEY.to_string()
    })
}

/// Open the configured credential store.
async fn open_store(
    config: &AppConfig,
) -> anyhow::Result<(Arc<dyn CredentialStore>, Option<PgCredentialStore>)> {
    match config.storage {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory credential store (keys are lost on restart)");
            let store: Arc<dyn CredentialStore> = Arc::new(MemoryStore::new());
            Ok((store, None))
        }
        StorageBackend::Postgres => {
            let db_config = DatabaseConfig::from_env().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to load database config, using defaults");
                DatabaseConfig::default()
            });
            let store = PgCredentialStore::open(&db_config, &encryption_key(config)).await?;
            let shared: Arc<dyn CredentialStore> = Arc::new(store.clone());
            Ok((shared, Some(store)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting usage dashboard"
    );

    let app_config = AppConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load app config, using defaults");
        AppConfig::default()
    });

    tracing::info!(
        host = %app_config.host,
        port = app_config.port,
        api_url = %app_config.api_url,
        fetch_concurrency = app_config.fetch_concurrency(),
        storage = ?app_config.storage,
        auth = app_config.admin_password().is_some(),
        "Configuration loaded"
    );

    let (store, postgres) = open_store(&app_config).await?;

    let fetcher = HttpUsageFetcher::new(&app_config.api_url, app_config.request_timeout());
    let aggregator = Aggregator::new(Arc::new(fetcher), app_config.fetch_concurrency());
    let credential_service = CredentialService::new(store, aggregator);

    let scheduler = Arc::new(RefreshScheduler::new(
        credential_service.clone(),
        app_config.refresh_interval().unwrap_or_default(),
    ));
    if app_config.refresh_interval().is_some() {
        scheduler.start()?;
    }

    let addr: SocketAddr = app_config.bind_address().parse()?;
    let state = AppState::new(credential_service, scheduler.clone(), app_config, postgres);
    let app = build_router(state);

    let listener = TcpListener::bind(addr).await?;

    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop();
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
