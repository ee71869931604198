//! Row models and queries for the PostgreSQL credential store.

pub mod models;
pub mod queries;

/// Connection pool shared by the store's queries.
pub type DbPool = sqlx::PgPool;
