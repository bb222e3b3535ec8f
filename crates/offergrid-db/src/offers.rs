//! Database operations for the `merchant_offers` table.
//!
//! An offer is the commercial link between a merchant and a master variant;
//! `offer_status` is the customer-facing visibility gate.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::DbError;

/// A row from the `merchant_offers` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OfferRow {
    pub id: i64,
    pub merchant_id: i64,
    pub variant_id: i64,
    pub external_product_id: Option<String>,
    pub external_variant_id: Option<String>,
    pub merchant_sku: Option<String>,
    pub currency_code: String,
    pub cached_price_minor: i64,
    pub cached_settlement_price_minor: i64,
    pub current_stock: i32,
    /// `LIVE`, `PENDING_REVIEW`, or `REJECTED`.
    pub offer_status: String,
    pub is_active: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for [`upsert_offer`].
#[derive(Debug, Clone)]
pub struct NewOffer<'a> {
    pub merchant_id: i64,
    pub variant_id: i64,
    pub external_product_id: &'a str,
    pub external_variant_id: &'a str,
    pub merchant_sku: Option<&'a str>,
    pub currency_code: &'a str,
    pub cached_price_minor: i64,
    pub cached_settlement_price_minor: i64,
    pub current_stock: i32,
    pub offer_status: &'a str,
}

/// Upserts a merchant offer by the `(merchant_id, variant_id)` pair.
///
/// Conflicts refresh the external ids, prices, stock, and offer status in
/// place — re-approving a previously rejected staging product relinks the
/// same offer rows back to `LIVE`.
///
/// Returns the internal `id` of the upserted row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_offer(conn: &mut PgConnection, offer: &NewOffer<'_>) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO merchant_offers \
             (merchant_id, variant_id, external_product_id, external_variant_id, \
              merchant_sku, currency_code, cached_price_minor, cached_settlement_price_minor, \
              current_stock, offer_status, is_active, last_synced_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, true, NOW()) \
         ON CONFLICT (merchant_id, variant_id) DO UPDATE SET \
             external_product_id           = EXCLUDED.external_product_id, \
             external_variant_id           = EXCLUDED.external_variant_id, \
             merchant_sku                  = EXCLUDED.merchant_sku, \
             cached_price_minor            = EXCLUDED.cached_price_minor, \
             cached_settlement_price_minor = EXCLUDED.cached_settlement_price_minor, \
             current_stock                 = EXCLUDED.current_stock, \
             offer_status                  = EXCLUDED.offer_status, \
             last_synced_at                = NOW(), \
             updated_at                    = NOW() \
         RETURNING id",
    )
    .bind(offer.merchant_id)
    .bind(offer.variant_id)
    .bind(offer.external_product_id)
    .bind(offer.external_variant_id)
    .bind(offer.merchant_sku)
    .bind(offer.currency_code)
    .bind(offer.cached_price_minor)
    .bind(offer.cached_settlement_price_minor)
    .bind(offer.current_stock)
    .bind(offer.offer_status)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

/// Sets every offer a merchant created for one external product to
/// `REJECTED`. Rejected offers remain visible to the merchant as "needs
/// fixing" and are relinked (not recreated) on a later re-approval.
///
/// Returns the number of offers updated.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn reject_offers_for_external_product(
    conn: &mut PgConnection,
    merchant_id: i64,
    external_product_id: &str,
) -> Result<u64, DbError> {
    let updated = sqlx::query(
        "UPDATE merchant_offers \
         SET offer_status = 'REJECTED', updated_at = NOW() \
         WHERE merchant_id = $1 AND external_product_id = $2",
    )
    .bind(merchant_id)
    .bind(external_product_id)
    .execute(conn)
    .await?
    .rows_affected();

    Ok(updated)
}

/// Returns the offer for a `(merchant, variant)` pair, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_offer(
    pool: &PgPool,
    merchant_id: i64,
    variant_id: i64,
) -> Result<Option<OfferRow>, DbError> {
    let row = sqlx::query_as::<_, OfferRow>(
        "SELECT id, merchant_id, variant_id, external_product_id, external_variant_id, \
                merchant_sku, currency_code, cached_price_minor, cached_settlement_price_minor, \
                current_stock, offer_status, is_active, last_synced_at, created_at, updated_at \
         FROM merchant_offers \
         WHERE merchant_id = $1 AND variant_id = $2",
    )
    .bind(merchant_id)
    .bind(variant_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
