//! Database operations for `staging_products` and `staging_variants`.
//!
//! Staging rows are the merchant-local, unreconciled representation of a
//! product. They are upserted on every feed sync, adjudicated by an admin,
//! and never hard-deleted (kept for audit and resubmission).

use chrono::{DateTime, Utc};
use offergrid_core::{FeedProduct, FeedVariant};
use sqlx::{PgConnection, PgPool};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `staging_products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StagingProductRow {
    pub id: i64,
    pub merchant_id: i64,
    pub external_product_id: String,
    pub raw_title: String,
    pub raw_body_html: Option<String>,
    pub raw_vendor: Option<String>,
    pub raw_product_type: Option<String>,
    pub raw_tags: Vec<String>,
    /// The merchant's native JSON representation, verbatim.
    pub raw_payload: serde_json::Value,
    /// `PENDING_SYNC`, `NEEDS_REVIEW`, `APPROVED`, or `REJECTED`.
    pub status: String,
    pub suggested_product_id: Option<i64>,
    pub match_confidence_score: i32,
    pub admin_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `staging_variants` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StagingVariantRow {
    pub id: i64,
    pub staging_product_id: i64,
    pub external_variant_id: String,
    pub raw_sku: Option<String>,
    pub raw_barcode: Option<String>,
    pub raw_price_minor: i64,
    pub raw_stock: i32,
    /// Option key/value pairs as the feed declared them.
    pub raw_options: serde_json::Value,
    /// Set during a merge once the variant resolves to a master variant.
    pub matched_variant_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A review-queue entry: staging row joined with the merchant's name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReviewQueueRow {
    pub id: i64,
    pub merchant_id: i64,
    pub merchant_name: String,
    pub raw_title: String,
    pub raw_vendor: Option<String>,
    pub status: String,
    pub suggested_product_id: Option<i64>,
    pub match_confidence_score: i32,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// staging_products operations
// ---------------------------------------------------------------------------

/// Upserts a staging product by `(merchant_id, external_product_id)`.
///
/// New rows start in `PENDING_SYNC`. On conflict the raw fields are
/// refreshed; a previously `REJECTED` row is reset to `PENDING_SYNC` with its
/// rejection reason cleared (merchant resubmission path), while every other
/// status is retained so re-ingest cannot silently re-open an approved row.
///
/// Returns the internal `id` of the upserted row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_staging_product(
    conn: &mut PgConnection,
    merchant_id: i64,
    product: &FeedProduct,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO staging_products \
             (merchant_id, external_product_id, raw_title, raw_body_html, raw_vendor, \
              raw_product_type, raw_tags, raw_payload, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'PENDING_SYNC') \
         ON CONFLICT (merchant_id, external_product_id) DO UPDATE SET \
             raw_title        = EXCLUDED.raw_title, \
             raw_body_html    = EXCLUDED.raw_body_html, \
             raw_vendor       = EXCLUDED.raw_vendor, \
             raw_product_type = EXCLUDED.raw_product_type, \
             raw_tags         = EXCLUDED.raw_tags, \
             raw_payload      = EXCLUDED.raw_payload, \
             status           = CASE WHEN staging_products.status = 'REJECTED' \
                                     THEN 'PENDING_SYNC' \
                                     ELSE staging_products.status END, \
             rejection_reason = CASE WHEN staging_products.status = 'REJECTED' \
                                     THEN NULL \
                                     ELSE staging_products.rejection_reason END, \
             updated_at       = NOW() \
         RETURNING id",
    )
    .bind(merchant_id)
    .bind(&product.external_product_id)
    .bind(&product.title)
    .bind(&product.body_html)
    .bind(&product.vendor)
    .bind(&product.product_type)
    .bind(&product.tags)
    .bind(&product.raw)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

/// Returns a staging product by id, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_staging_product(
    pool: &PgPool,
    id: i64,
) -> Result<Option<StagingProductRow>, DbError> {
    let row = sqlx::query_as::<_, StagingProductRow>(
        "SELECT id, merchant_id, external_product_id, raw_title, raw_body_html, raw_vendor, \
                raw_product_type, raw_tags, raw_payload, status, suggested_product_id, \
                match_confidence_score, admin_notes, rejection_reason, created_at, updated_at \
         FROM staging_products \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns a staging product by id, locking the row for the duration of the
/// enclosing transaction. A merge holds this lock so a concurrent auto-match
/// or second decision on the same row waits for the outcome.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_staging_product_for_update(
    conn: &mut PgConnection,
    id: i64,
) -> Result<Option<StagingProductRow>, DbError> {
    let row = sqlx::query_as::<_, StagingProductRow>(
        "SELECT id, merchant_id, external_product_id, raw_title, raw_body_html, raw_vendor, \
                raw_product_type, raw_tags, raw_payload, status, suggested_product_id, \
                match_confidence_score, admin_notes, rejection_reason, created_at, updated_at \
         FROM staging_products \
         WHERE id = $1 \
         FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Returns the ids of staging products in the given status, oldest first,
/// optionally scoped to one merchant.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_staging_ids_by_status(
    pool: &PgPool,
    status: &str,
    merchant_id: Option<i64>,
) -> Result<Vec<i64>, DbError> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM staging_products \
         WHERE status = $1 AND ($2::BIGINT IS NULL OR merchant_id = $2) \
         ORDER BY created_at, id",
    )
    .bind(status)
    .bind(merchant_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Returns the review queue: staging rows in the given statuses joined with
/// merchant names, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn review_queue(
    pool: &PgPool,
    statuses: &[&str],
    limit: i64,
) -> Result<Vec<ReviewQueueRow>, DbError> {
    let statuses: Vec<String> = statuses.iter().map(ToString::to_string).collect();
    let rows = sqlx::query_as::<_, ReviewQueueRow>(
        "SELECT sp.id, sp.merchant_id, m.name AS merchant_name, sp.raw_title, sp.raw_vendor, \
                sp.status, sp.suggested_product_id, sp.match_confidence_score, sp.created_at \
         FROM staging_products sp \
         JOIN merchants m ON m.id = sp.merchant_id \
         WHERE sp.status = ANY($1) \
         ORDER BY sp.created_at, sp.id \
         LIMIT $2",
    )
    .bind(&statuses)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Persists an auto-match result: suggestion, confidence, and the
/// `NEEDS_REVIEW` status. Rerunning overwrites the previous suggestion.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn set_suggestion(
    conn: &mut PgConnection,
    staging_id: i64,
    suggested_product_id: Option<i64>,
    confidence: i32,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE staging_products \
         SET suggested_product_id = $2, \
             match_confidence_score = $3, \
             status = 'NEEDS_REVIEW', \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(staging_id)
    .bind(suggested_product_id)
    .bind(confidence)
    .execute(conn)
    .await?;

    Ok(())
}

/// Flips a staging product to `APPROVED`, recording optional admin notes.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn set_approved(
    conn: &mut PgConnection,
    staging_id: i64,
    admin_notes: Option<&str>,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE staging_products \
         SET status = 'APPROVED', admin_notes = $2, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(staging_id)
    .bind(admin_notes)
    .execute(conn)
    .await?;

    Ok(())
}

/// Flips a staging product to `REJECTED` with the given reason.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn set_rejected(
    conn: &mut PgConnection,
    staging_id: i64,
    reason: &str,
    admin_notes: Option<&str>,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE staging_products \
         SET status = 'REJECTED', rejection_reason = $2, admin_notes = $3, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(staging_id)
    .bind(reason)
    .bind(admin_notes)
    .execute(conn)
    .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// staging_variants operations
// ---------------------------------------------------------------------------

/// Upserts a staging variant by `(staging_product_id, external_variant_id)`.
///
/// Returns the internal `id` of the upserted row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_staging_variant(
    conn: &mut PgConnection,
    staging_product_id: i64,
    variant: &FeedVariant,
) -> Result<i64, DbError> {
    let options = serde_json::to_value(&variant.options).unwrap_or_default();

    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO staging_variants \
             (staging_product_id, external_variant_id, raw_sku, raw_barcode, \
              raw_price_minor, raw_stock, raw_options) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (staging_product_id, external_variant_id) DO UPDATE SET \
             raw_sku         = EXCLUDED.raw_sku, \
             raw_barcode     = EXCLUDED.raw_barcode, \
             raw_price_minor = EXCLUDED.raw_price_minor, \
             raw_stock       = EXCLUDED.raw_stock, \
             raw_options     = EXCLUDED.raw_options, \
             updated_at      = NOW() \
         RETURNING id",
    )
    .bind(staging_product_id)
    .bind(&variant.external_variant_id)
    .bind(&variant.sku)
    .bind(&variant.barcode)
    .bind(variant.price_minor)
    .bind(variant.stock)
    .bind(&options)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

/// Deletes staging variants that are no longer present in the feed payload.
/// Keeps the staging variant set an exact mirror of the latest sync.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_stale_staging_variants(
    conn: &mut PgConnection,
    staging_product_id: i64,
    keep_external_ids: &[String],
) -> Result<u64, DbError> {
    let deleted = sqlx::query(
        "DELETE FROM staging_variants \
         WHERE staging_product_id = $1 AND external_variant_id != ALL($2)",
    )
    .bind(staging_product_id)
    .bind(keep_external_ids)
    .execute(conn)
    .await?
    .rows_affected();

    Ok(deleted)
}

/// Returns the staging variants under one staging product, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_staging_variants(
    conn: &mut PgConnection,
    staging_product_id: i64,
) -> Result<Vec<StagingVariantRow>, DbError> {
    let rows = sqlx::query_as::<_, StagingVariantRow>(
        "SELECT id, staging_product_id, external_variant_id, raw_sku, raw_barcode, \
                raw_price_minor, raw_stock, raw_options, matched_variant_id, \
                created_at, updated_at \
         FROM staging_variants \
         WHERE staging_product_id = $1 \
         ORDER BY id",
    )
    .bind(staging_product_id)
    .fetch_all(conn)
    .await?;

    Ok(rows)
}

/// Records which master variant a staging variant resolved to during a merge.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn set_matched_variant(
    conn: &mut PgConnection,
    staging_variant_id: i64,
    variant_id: i64,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE staging_variants \
         SET matched_variant_id = $2, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(staging_variant_id)
    .bind(variant_id)
    .execute(conn)
    .await?;

    Ok(())
}
