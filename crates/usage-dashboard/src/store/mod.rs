//! Credential store.
//!
//! The store is the only shared mutable resource of the dashboard. Every
//! operation is atomic for a single key; nothing spans several keys, so
//! batch operations built on top are best-effort sequences of single-key
//! calls.

mod memory;
mod model;
mod postgres;

use async_trait::async_trait;

use crate::error::AppResult;

pub use memory::MemoryStore;
pub use model::{Credential, CredentialSummary};
pub use postgres::PgCredentialStore;

/// Storage backend for credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert or replace the credential under its ID.
    async fn put(&self, credential: Credential) -> AppResult<()>;

    /// Fetch a credential by ID.
    async fn get(&self, id: &str) -> AppResult<Option<Credential>>;

    /// All credentials, oldest first. Ties on `created_at` keep insertion order.
    async fn list(&self) -> AppResult<Vec<Credential>>;

    /// Remove a credential. Returns `false` when the ID was not present;
    /// deleting a missing ID is not an error.
    async fn delete(&self, id: &str) -> AppResult<bool>;
}
