//! HTTP handlers for the usage dashboard API.
//!
//! Thin adapters from routes to [`crate::services`], organized by area.

pub mod credentials;
pub mod health;
pub mod refresh;
pub mod usage;

pub use health::{api_health, health_check};
