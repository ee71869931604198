//! Configuration module for the usage dashboard.
//!
//! Configuration is loaded from environment variables using the `envy`
//! crate for type-safe parsing.

mod app;
mod database;

pub use app::{AppConfig, StorageBackend};
pub use database::DatabaseConfig;
