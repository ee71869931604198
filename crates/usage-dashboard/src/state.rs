//! Application state for the usage dashboard server.
//!
//! Shared resources handed to handlers via Axum's state management.

use crate::config::AppConfig;
use crate::scheduler::RefreshScheduler;
use crate::services::CredentialService;
use crate::store::PgCredentialStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Credential operations and the aggregate cache
    pub credentials: CredentialService,

    /// Auto-refresh scheduler
    pub scheduler: Arc<RefreshScheduler>,

    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Postgres store, pinged by the health endpoint
    pub postgres: Option<PgCredentialStore>,

    /// Server start time for uptime calculation
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        credentials: CredentialService,
        scheduler: Arc<RefreshScheduler>,
        config: AppConfig,
        postgres: Option<PgCredentialStore>,
    ) -> Self {
        Self {
            credentials,
            scheduler,
            config: Arc::new(config),
            postgres,
            start_time: std::time::Instant::now(),
        }
    }

    /// Get the server uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
