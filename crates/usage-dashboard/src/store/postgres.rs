//! PostgreSQL credential store.

use async_trait::async_trait;

use super::{Credential, CredentialStore};
use crate::config::DatabaseConfig;
use crate::crypto::Encryptor;
use crate::db::models::CredentialRow;
use crate::db::queries::credential as queries;
use crate::db::DbPool;
use crate::error::AppResult;

/// Credential store backed by PostgreSQL, keys encrypted at rest.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: DbPool,
    encryptor: Encryptor,
}

impl PgCredentialStore {
    /// Connect to PostgreSQL and make sure the credential table exists.
    ///
    /// The encryption key is checked before any connection is made.
    ///
    /// # Arguments
    ///
    /// * `config` - Connection settings
    /// * `encryption_key` - Base64-encoded 32-byte encryption key
    pub async fn open(config: &DatabaseConfig, encryption_key: &str) -> AppResult<Self> {
        let encryptor = Encryptor::from_base64(encryption_key)?;
        let options = config.connect_options()?;

        let pool = config.pool_options().connect_with(options).await?;
        queries::ensure_schema(&pool).await?;

        tracing::info!(
            host = %pool.connect_options().get_host(),
            database = ?pool.connect_options().get_database(),
            max_connections = config.max_connections,
            "Credential store connected"
        );

        Ok(Self { pool, encryptor })
    }

    /// Whether the database answers a trivial query.
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    fn row_to_credential(&self, row: CredentialRow) -> AppResult<Credential> {
        Ok(Credential {
            key: self.encryptor.decrypt_secret(&row.key_data)?,
            id: row.id,
            name: row.name,
            note: row.note,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn put(&self, credential: Credential) -> AppResult<()> {
        let row = CredentialRow {
            key_data: self.encryptor.encrypt_secret(&credential.key)?,
            id: credential.id,
            name: credential.name,
            note: credential.note,
            created_at: credential.created_at,
        };
        queries::upsert_credential(&self.pool, &row).await
    }

    async fn get(&self, id: &str) -> AppResult<Option<Credential>> {
        queries::get_credential(&self.pool, id)
            .await?
            .map(|row| self.row_to_credential(row))
            .transpose()
    }

    async fn list(&self) -> AppResult<Vec<Credential>> {
        queries::list_credentials(&self.pool)
            .await?
            .into_iter()
            .map(|row| self.row_to_credential(row))
            .collect()
    }

    async fn delete(&self, id: &str) -> AppResult<bool> {
        queries::delete_credential(&self.pool, id).await
    }
}
