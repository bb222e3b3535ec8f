//! Seeding from YAML configuration into the database.

use offergrid_core::{MerchantConfig, SourceConfig};
use sqlx::PgPool;

use crate::DbError;

/// Upsert merchants from config into the database.
///
/// Returns the number of merchants processed (inserted or updated).
/// All upserts run inside a single transaction; if any operation fails
/// the entire batch is rolled back.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_merchants(pool: &PgPool, merchants: &[MerchantConfig]) -> Result<usize, DbError> {
    let mut tx = pool.begin().await?;
    let mut count = 0usize;

    for merchant in merchants {
        let (source_type, source_config) = match &merchant.source {
            SourceConfig::Shopify {
                store_url,
                access_token,
            } => (
                "SHOPIFY",
                serde_json::json!({
                    "store_url": store_url,
                    "access_token": access_token,
                }),
            ),
        };

        crate::merchants::upsert_merchant(
            &mut *tx,
            &merchant.name,
            merchant.email.as_deref(),
            source_type,
            &source_config,
        )
        .await?;

        count += 1;
    }

    tx.commit().await?;
    Ok(count)
}
