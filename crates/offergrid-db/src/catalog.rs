//! Database operations for the master catalog: `products` and `variants`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub brand_id: Option<i64>,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub base_price_minor: i64,
    pub rating: Decimal,
    pub review_count: i32,
    /// `DRAFT`, `ACTIVE`, or `ARCHIVED`.
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `variants` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VariantRow {
    pub id: i64,
    pub product_id: i64,
    pub internal_sku: String,
    /// Unique among active variants system-wide (partial unique index).
    pub gtin: Option<String>,
    pub mpn: Option<String>,
    /// Normalized key/value attribute map stored as JSONB.
    pub attributes: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An active variant joined with the owning product's identity fields,
/// as consumed by the matching engine's identifier index.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CatalogVariantRow {
    pub id: i64,
    pub product_id: i64,
    pub product_title: String,
    pub product_brand_id: Option<i64>,
    pub internal_sku: String,
    pub gtin: Option<String>,
    pub mpn: Option<String>,
    pub attributes: serde_json::Value,
}

/// Product id + title pair for the title-similarity scorer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductTitleRow {
    pub id: i64,
    pub title: String,
}

// ---------------------------------------------------------------------------
// products operations
// ---------------------------------------------------------------------------

/// Returns a product by id, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product(pool: &PgPool, id: i64) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(
        "SELECT id, brand_id, title, slug, description, image_url, base_price_minor, \
                rating, review_count, status, created_at, updated_at \
         FROM products \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns a product by id, locking the row for the duration of the enclosing
/// transaction. Serializes concurrent merges targeting the same product so
/// two merges cannot both miss an in-flight attribute-match candidate.
///
/// Returns `None` when the product does not exist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn lock_product(conn: &mut PgConnection, id: i64) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(
        "SELECT id, brand_id, title, slug, description, image_url, base_price_minor, \
                rating, review_count, status, created_at, updated_at \
         FROM products \
         WHERE id = $1 \
         FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Inserts a master product and returns its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including a unique
/// violation on `slug`).
#[allow(clippy::too_many_arguments)] // full product creation; no sensible grouping
pub async fn insert_product(
    conn: &mut PgConnection,
    title: &str,
    slug: &str,
    description: Option<&str>,
    image_url: Option<&str>,
    base_price_minor: i64,
    brand_id: Option<i64>,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO products (title, slug, description, image_url, base_price_minor, brand_id, status) \
         VALUES ($1, $2, $3, $4, $5, $6, 'ACTIVE') \
         RETURNING id",
    )
    .bind(title)
    .bind(slug)
    .bind(description)
    .bind(image_url)
    .bind(base_price_minor)
    .bind(brand_id)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

/// Returns id + title for every active product; input to the title scorer.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_product_titles(
    conn: &mut PgConnection,
) -> Result<Vec<ProductTitleRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductTitleRow>(
        "SELECT id, title FROM products WHERE status = 'ACTIVE' ORDER BY id",
    )
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Case-insensitive title search over active products, for the admin
/// manual-match screen.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn search_products_by_title(
    pool: &PgPool,
    query: &str,
    limit: i64,
) -> Result<Vec<ProductRow>, DbError> {
    let pattern = format!("%{}%", query.trim());
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT id, brand_id, title, slug, description, image_url, base_price_minor, \
                rating, review_count, status, created_at, updated_at \
         FROM products \
         WHERE status = 'ACTIVE' AND title ILIKE $1 \
         ORDER BY id \
         LIMIT $2",
    )
    .bind(&pattern)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// variants operations
// ---------------------------------------------------------------------------

/// Returns the active variants under one product, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_variants_for_product(
    conn: &mut PgConnection,
    product_id: i64,
) -> Result<Vec<CatalogVariantRow>, DbError> {
    let rows = sqlx::query_as::<_, CatalogVariantRow>(
        "SELECT v.id, v.product_id, p.title AS product_title, p.brand_id AS product_brand_id, \
                v.internal_sku, v.gtin, v.mpn, v.attributes \
         FROM variants v \
         JOIN products p ON p.id = v.product_id \
         WHERE v.product_id = $1 AND v.is_active = true \
         ORDER BY v.id",
    )
    .bind(product_id)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Returns every active variant in the catalog joined with product identity,
/// the snapshot the identifier index is built from.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_catalog_variants(
    conn: &mut PgConnection,
) -> Result<Vec<CatalogVariantRow>, DbError> {
    let rows = sqlx::query_as::<_, CatalogVariantRow>(
        "SELECT v.id, v.product_id, p.title AS product_title, p.brand_id AS product_brand_id, \
                v.internal_sku, v.gtin, v.mpn, v.attributes \
         FROM variants v \
         JOIN products p ON p.id = v.product_id \
         WHERE v.is_active = true AND p.status = 'ACTIVE' \
         ORDER BY v.id",
    )
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Inserts a master variant and returns its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including unique violations
/// on `internal_sku` or the active-GTIN partial index).
pub async fn insert_variant(
    conn: &mut PgConnection,
    product_id: i64,
    internal_sku: &str,
    gtin: Option<&str>,
    mpn: Option<&str>,
    attributes: &serde_json::Value,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO variants (product_id, internal_sku, gtin, mpn, attributes, is_active) \
         VALUES ($1, $2, $3, $4, $5, true) \
         RETURNING id",
    )
    .bind(product_id)
    .bind(internal_sku)
    .bind(gtin)
    .bind(mpn)
    .bind(attributes)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

/// Returns a variant by id, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_variant(conn: &mut PgConnection, id: i64) -> Result<Option<VariantRow>, DbError> {
    let row = sqlx::query_as::<_, VariantRow>(
        "SELECT id, product_id, internal_sku, gtin, mpn, attributes, is_active, \
                created_at, updated_at \
         FROM variants \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}
