//! Database models.

pub mod credential;

pub use credential::*;
