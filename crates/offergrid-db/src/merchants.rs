//! Database operations for the `merchants` table.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::DbError;

/// A row from the `merchants` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MerchantRow {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub source_type: String,
    /// Tagged per-source configuration blob; only the feed client reads it.
    pub source_config: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Returns a single active merchant by id, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_active_merchant(pool: &PgPool, id: i64) -> Result<Option<MerchantRow>, DbError> {
    let row = sqlx::query_as::<_, MerchantRow>(
        "SELECT id, name, email, source_type, source_config, is_active, created_at, updated_at \
         FROM merchants \
         WHERE id = $1 AND is_active = true",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns all active merchants, ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_merchants(pool: &PgPool) -> Result<Vec<MerchantRow>, DbError> {
    let rows = sqlx::query_as::<_, MerchantRow>(
        "SELECT id, name, email, source_type, source_config, is_active, created_at, updated_at \
         FROM merchants \
         WHERE is_active = true \
         ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Upserts a merchant row by name, returning its internal id.
///
/// Used by the config seeder; conflicts on `name` refresh the email and
/// source configuration in place.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_merchant(
    conn: &mut PgConnection,
    name: &str,
    email: Option<&str>,
    source_type: &str,
    source_config: &serde_json::Value,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO merchants (name, email, source_type, source_config, is_active) \
         VALUES ($1, $2, $3, $4, true) \
         ON CONFLICT (name) DO UPDATE SET \
             email         = EXCLUDED.email, \
             source_type   = EXCLUDED.source_type, \
             source_config = EXCLUDED.source_config, \
             updated_at    = NOW() \
         RETURNING id",
    )
    .bind(name)
    .bind(email)
    .bind(source_type)
    .bind(source_config)
    .fetch_one(conn)
    .await?;

    Ok(id)
}
