//! Application configuration for the usage dashboard server.

use serde::Deserialize;
use std::time::Duration;

/// Which credential store backend the server runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process store, lost on restart.
    #[default]
    Memory,
    /// PostgreSQL, configured through `POSTGRES_*`.
    Postgres,
}

/// Application configuration loaded from environment variables.
///
/// Environment variables are prefixed with `USAGE_`:
/// - `USAGE_HOST`: Server bind address (default: "0.0.0.0")
/// - `USAGE_PORT`: Server port (default: 8090)
/// - `USAGE_API_URL`: Remote usage accounting endpoint
/// - `USAGE_FETCH_CONCURRENCY`: Max in-flight usage requests (default: 5)
/// - `USAGE_REQUEST_TIMEOUT_SECS`: Per-request timeout (default: 30)
/// - `USAGE_REFRESH_INTERVAL_SECS`: Auto-refresh period, 0 disables (default: 0)
/// - `USAGE_ADMIN_PASSWORD`: Password gating the API (optional)
/// - `USAGE_STORAGE`: `memory` or `postgres` (default: memory)
/// - `USAGE_ENCRYPTION_KEY`: Base64 32-byte key for secrets at rest (optional)
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Remote usage accounting endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Maximum number of usage requests in flight at once
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,

    /// Transport timeout for a single usage request, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Auto-refresh period in seconds (0 = disabled)
    #[serde(default)]
    pub refresh_interval_secs: u64,

    /// Admin password; the API is open when unset
    #[serde(default)]
    pub admin_password: Option<String>,

    /// Credential store backend
    #[serde(default)]
    pub storage: StorageBackend,

    /// Encryption key for the Postgres store
    #[serde(default)]
    pub encryption_key: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_api_url() -> String {
    "https://app.factory.ai/api/organization/members/chat-usage".to_string()
}

fn default_fetch_concurrency() -> usize {
    5
}

fn default_request_timeout() -> u64 {
    30
}

impl AppConfig {
    /// Load configuration from environment variables prefixed with `USAGE_`.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("USAGE_").from_env::<AppConfig>()
    }

    /// Get the server bind address as a string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// In-flight request bound, never below one.
    pub fn fetch_concurrency(&self) -> usize {
        self.fetch_concurrency.max(1)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Auto-refresh period, `None` when disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }

    /// Admin password, ignoring a blank value.
    pub fn admin_password(&self) -> Option<&str> {
        self.admin_password
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_url: default_api_url(),
            fetch_concurrency: default_fetch_concurrency(),
            request_timeout_secs: default_request_timeout(),
            refresh_interval_secs: 0,
            admin_password: None,
            storage: StorageBackend::Memory,
            encryption_key: None,
        }
    }
}
