//! Database operations for the `brands` table.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::DbError;

/// A row from the `brands` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BrandRow {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub logo_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Resolves a merchant-supplied vendor string to a brand.
///
/// Matches on case-insensitive name or on the slug-normalized form of the
/// vendor string. Returns `None` when no active brand matches — the caller
/// treats an unresolved vendor as "no brand", never as an error.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn resolve_brand_by_vendor(
    conn: &mut PgConnection,
    vendor: &str,
) -> Result<Option<BrandRow>, DbError> {
    let normalized = vendor.trim().to_lowercase();
    if normalized.is_empty() {
        return Ok(None);
    }
    let slug = normalized.split_whitespace().collect::<Vec<_>>().join("-");

    let row = sqlx::query_as::<_, BrandRow>(
        "SELECT id, name, slug, logo_url, is_active, created_at, updated_at \
         FROM brands \
         WHERE (LOWER(name) = $1 OR slug = $2) AND is_active = true \
         LIMIT 1",
    )
    .bind(&normalized)
    .bind(&slug)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Returns a brand by id, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_brand(pool: &PgPool, id: i64) -> Result<Option<BrandRow>, DbError> {
    let row = sqlx::query_as::<_, BrandRow>(
        "SELECT id, name, slug, logo_url, is_active, created_at, updated_at \
         FROM brands \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Creates a new brand row and returns its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails (including unique violations
/// on name or slug).
pub async fn create_brand(pool: &PgPool, name: &str, slug: &str) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO brands (name, slug, is_active) VALUES ($1, $2, true) RETURNING id",
    )
    .bind(name)
    .bind(slug)
    .fetch_one(pool)
    .await?;

    Ok(id)
}
