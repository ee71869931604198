//! Credential table queries.

use crate::db::models::CredentialRow;
use crate::db::DbPool;
use crate::error::AppResult;

/// Create the schema and table if they do not exist yet.
pub async fn ensure_schema(pool: &DbPool) -> AppResult<()> {
    sqlx::query("CREATE SCHEMA IF NOT EXISTS usage_dashboard")
        .execute(pool)
        .await?;

    // `seq` breaks ties between keys created in the same millisecond.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS usage_dashboard.credential (
            id TEXT PRIMARY KEY,
            key_data BYTEA NOT NULL,
            name TEXT,
            note TEXT,
            created_at BIGINT NOT NULL,
            seq BIGSERIAL NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert a credential, or overwrite key, name, and note of an existing ID.
pub async fn upsert_credential(pool: &DbPool, row: &CredentialRow) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO usage_dashboard.credential (id, key_data, name, note, created_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (id) DO UPDATE
        SET key_data = EXCLUDED.key_data, name = EXCLUDED.name, note = EXCLUDED.note
        "#,
    )
    .bind(&row.id)
    .bind(&row.key_data)
    .bind(row.name.as_deref())
    .bind(row.note.as_deref())
    .bind(row.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a credential by ID.
pub async fn get_credential(pool: &DbPool, id: &str) -> AppResult<Option<CredentialRow>> {
    let row = sqlx::query_as::<_, CredentialRow>(
        r#"
        SELECT id, key_data, name, note, created_at
        FROM usage_dashboard.credential
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// List all credentials, oldest first.
pub async fn list_credentials(pool: &DbPool) -> AppResult<Vec<CredentialRow>> {
    let rows = sqlx::query_as::<_, CredentialRow>(
        r#"
        SELECT id, key_data, name, note, created_at
        FROM usage_dashboard.credential
        ORDER BY created_at ASC, seq ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Delete a credential by ID. Returns whether a row was removed.
pub async fn delete_credential(pool: &DbPool, id: &str) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM usage_dashboard.credential WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
