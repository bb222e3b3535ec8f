//! Database operations for the `margin_rules` table.
//!
//! A margin rule maps a (merchant, optional brand, optional category) scope
//! to a margin percentage within a validity window. The single-active-rule-
//! per-scope invariant is enforced at write time via [`find_conflicting_rule`],
//! not by a database constraint alone.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::DbError;

/// A row from the `margin_rules` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MarginRuleRow {
    pub id: i64,
    pub merchant_id: i64,
    pub brand_id: Option<i64>,
    pub category_id: Option<i64>,
    pub margin_percentage: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Returns the active rule with the most specific scope matching the given
/// (merchant, brand, category), or `None` when no rule applies.
///
/// Specificity order: brand+category, then brand-only, then category-only,
/// then merchant-only. The validity window must cover `NOW()`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_applicable_rule(
    conn: &mut PgConnection,
    merchant_id: i64,
    brand_id: Option<i64>,
    category_id: Option<i64>,
) -> Result<Option<MarginRuleRow>, DbError> {
    let row = sqlx::query_as::<_, MarginRuleRow>(
        "SELECT id, merchant_id, brand_id, category_id, margin_percentage, \
                valid_from, valid_to, is_active, created_at \
         FROM margin_rules \
         WHERE merchant_id = $1 \
           AND is_active = true \
           AND valid_from <= NOW() \
           AND (valid_to IS NULL OR valid_to > NOW()) \
           AND (brand_id IS NULL OR brand_id = $2) \
           AND (category_id IS NULL OR category_id = $3) \
         ORDER BY CASE \
             WHEN brand_id IS NOT NULL AND category_id IS NOT NULL THEN 0 \
             WHEN brand_id IS NOT NULL THEN 1 \
             WHEN category_id IS NOT NULL THEN 2 \
             ELSE 3 END, \
             id \
         LIMIT 1",
    )
    .bind(merchant_id)
    .bind(brand_id)
    .bind(category_id)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Returns the id of an active rule whose scope is identical to the given one
/// and whose validity window overlaps `[valid_from, valid_to)`. Used by the
/// write path to enforce the at-most-one-active-rule-per-scope invariant.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_conflicting_rule(
    pool: &PgPool,
    merchant_id: i64,
    brand_id: Option<i64>,
    category_id: Option<i64>,
    valid_from: DateTime<Utc>,
    valid_to: Option<DateTime<Utc>>,
) -> Result<Option<i64>, DbError> {
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM margin_rules \
         WHERE merchant_id = $1 \
           AND brand_id IS NOT DISTINCT FROM $2 \
           AND category_id IS NOT DISTINCT FROM $3 \
           AND is_active = true \
           AND valid_from < COALESCE($5, 'infinity'::timestamptz) \
           AND COALESCE(valid_to, 'infinity'::timestamptz) > $4 \
         LIMIT 1",
    )
    .bind(merchant_id)
    .bind(brand_id)
    .bind(category_id)
    .bind(valid_from)
    .bind(valid_to)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

/// Inserts a margin rule and returns the full row. Callers must run
/// [`find_conflicting_rule`] first; this function does not re-check.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_rule(
    pool: &PgPool,
    merchant_id: i64,
    brand_id: Option<i64>,
    category_id: Option<i64>,
    margin_percentage: Decimal,
    valid_from: DateTime<Utc>,
    valid_to: Option<DateTime<Utc>>,
) -> Result<MarginRuleRow, DbError> {
    let row = sqlx::query_as::<_, MarginRuleRow>(
        "INSERT INTO margin_rules \
             (merchant_id, brand_id, category_id, margin_percentage, valid_from, valid_to, is_active) \
         VALUES ($1, $2, $3, $4, $5, $6, true) \
         RETURNING id, merchant_id, brand_id, category_id, margin_percentage, \
                   valid_from, valid_to, is_active, created_at",
    )
    .bind(merchant_id)
    .bind(brand_id)
    .bind(category_id)
    .bind(margin_percentage)
    .bind(valid_from)
    .bind(valid_to)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns all margin rules, active first, newest window first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_rules(pool: &PgPool) -> Result<Vec<MarginRuleRow>, DbError> {
    let rows = sqlx::query_as::<_, MarginRuleRow>(
        "SELECT id, merchant_id, brand_id, category_id, margin_percentage, \
                valid_from, valid_to, is_active, created_at \
         FROM margin_rules \
         ORDER BY merchant_id, is_active DESC, valid_from DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Deactivates a margin rule. Returns `false` when no such rule exists.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn deactivate_rule(pool: &PgPool, id: i64) -> Result<bool, DbError> {
    let updated = sqlx::query("UPDATE margin_rules SET is_active = false WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();

    Ok(updated > 0)
}
