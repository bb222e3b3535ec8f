//! Margin resolution and settlement price calculation.
//!
//! Settlement is what the marketplace owes the merchant for a sale:
//! `settlement = listed × (1 − margin/100)`, rounded half-away-from-zero to
//! the minor unit. No matching margin rule means zero margin — settlement
//! equals the listed price exactly.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sqlx::PgConnection;

use crate::error::EngineError;

/// Applies a margin percentage to a listed price in minor units.
///
/// Margins are clamped to `[0, 100]`; rule validation enforces the same
/// range at write time.
#[must_use]
pub fn settlement_price_minor(listed_minor: i64, margin_percentage: Decimal) -> i64 {
    let margin = margin_percentage
        .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
    let settlement = Decimal::from(listed_minor) * (Decimal::ONE_HUNDRED - margin)
        / Decimal::ONE_HUNDRED;
    settlement
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(listed_minor)
}

/// Computes the settlement price for an offer by resolving the single active
/// margin rule with the most specific matching scope (brand+category >
/// brand-only > category-only > merchant-only).
///
/// # Errors
///
/// Returns [`EngineError::Persistence`] if the rule lookup fails.
pub async fn compute_settlement_price(
    conn: &mut PgConnection,
    merchant_id: i64,
    brand_id: Option<i64>,
    category_id: Option<i64>,
    listed_minor: i64,
) -> Result<i64, EngineError> {
    let rule =
        offergrid_db::margins::find_applicable_rule(conn, merchant_id, brand_id, category_id)
            .await?;

    Ok(match rule {
        Some(rule) => settlement_price_minor(listed_minor, rule.margin_percentage),
        None => listed_minor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_percent_margin_on_10000_is_9500() {
        assert_eq!(settlement_price_minor(10_000, Decimal::from(5)), 9_500);
    }

    #[test]
    fn zero_margin_is_identity() {
        assert_eq!(settlement_price_minor(12_345, Decimal::ZERO), 12_345);
    }

    #[test]
    fn full_margin_settles_to_zero() {
        assert_eq!(settlement_price_minor(9_999, Decimal::from(100)), 0);
    }

    #[test]
    fn midpoint_rounds_away_from_zero() {
        // 10 × 0.95 = 9.5 → 10
        assert_eq!(settlement_price_minor(10, Decimal::from(5)), 10);
        // 30 × 0.95 = 28.5 → 29
        assert_eq!(settlement_price_minor(30, Decimal::from(5)), 29);
    }

    #[test]
    fn fractional_margins_round_to_nearest_minor_unit() {
        // 999 × (1 − 0.05) = 949.05 → 949
        assert_eq!(settlement_price_minor(999, Decimal::from(5)), 949);
        // 10000 × (1 − 0.125) = 8750
        assert_eq!(
            settlement_price_minor(10_000, Decimal::new(125, 1)),
            8_750
        );
    }

    #[test]
    fn out_of_range_margins_are_clamped() {
        assert_eq!(settlement_price_minor(1_000, Decimal::from(-10)), 1_000);
        assert_eq!(settlement_price_minor(1_000, Decimal::from(250)), 0);
    }
}
