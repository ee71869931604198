//! API Key Usage Dashboard
//!
//! This crate provides the server behind the usage dashboard:
//!
//! - **Credential Store**: API keys with optional name and note, in memory or PostgreSQL
//! - **Usage Fetching**: One bearer-authenticated request per key to the accounting API
//! - **Aggregation**: Bounded concurrent fan-out, totals, and valid/exhausted/invalid classification
//! - **Duplicate Resolution**: Group identical keys and keep the earliest of each group
//! - **Batch Operations**: Import, delete, and cleanup of exhausted or unreachable keys
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading from environment variables
//! - [`store`]: Credential store trait and backends
//! - [`usage`]: Remote usage fetcher and snapshot types
//! - [`services`]: Aggregation, duplicates, and batch operations
//! - [`scheduler`]: Periodic background refresh
//! - [`handlers`] / [`router`]: HTTP transport
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use usage_dashboard::{
//!     services::{Aggregator, CredentialService},
//!     store::MemoryStore,
//!     usage::HttpUsageFetcher,
//! };
//!
//! let fetcher = HttpUsageFetcher::new(api_url, Duration::from_secs(30));
//! let service = CredentialService::new(
//!     Arc::new(MemoryStore::new()),
//!     Aggregator::new(Arc::new(fetcher), 5),
//! );
//! service.batch_import(&keys).await?;
//! let view = service.aggregate().await?;
//! ```

pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod handlers;
pub mod mask;
pub mod result_ext;
pub mod router;
pub mod scheduler;
pub mod services;
pub mod state;
pub mod store;
pub mod usage;

pub use error::{AppError, AppResult};
pub use result_ext::ResultExt;
