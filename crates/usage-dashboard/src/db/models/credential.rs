//! Credential row model.
//!
//! Keys are stored encrypted at rest using AES-GCM.

use sqlx::FromRow;

/// Row of the `usage_dashboard.credential` table.
#[derive(Debug, Clone, FromRow)]
pub struct CredentialRow {
    /// Credential ID
    pub id: String,

    /// Encrypted API key (nonce-prefixed)
    pub key_data: Vec<u8>,

    /// Display name
    #[sqlx(default)]
    pub name: Option<String>,

    /// Free-text note
    #[sqlx(default)]
    pub note: Option<String>,

    /// Creation time, epoch milliseconds
    pub created_at: i64,
}
