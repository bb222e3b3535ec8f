//! The staging reconciliation pipeline: feed ingestion, the auto-match batch
//! pass, admin decisions (approve-as-new, approve-as-match, reject), and
//! merchant-triggered resync.
//!
//! Every merge runs inside one database transaction. Merges targeting the
//! same master product serialize on a row-level lock on that product; merges
//! into different products do not contend. The auto-match pass only touches
//! `PENDING_SYNC` rows and merges only touch `NEEDS_REVIEW` rows, so a
//! staging row is matched or merged, never both at once.

use std::collections::HashMap;

use offergrid_core::{slugify, OfferStatus, StagingStatus};
use offergrid_db::offers::NewOffer;
use offergrid_db::{
    catalog, categories, staging, CatalogVariantRow, StagingProductRow, StagingVariantRow,
};
use offergrid_feed::FeedClient;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};

use crate::error::EngineError;
use crate::identifier::IdentifierIndex;
use crate::pricing::compute_settlement_price;
use crate::product_match::suggest_product;
use crate::variant_match::{
    attributes_from_value, match_variant, normalize_attributes, ExplicitMapping, VariantInput,
    VariantMatch,
};

const DEFAULT_CURRENCY: &str = "USD";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Outcome of one feed ingestion batch.
#[derive(Debug, Clone, Copy)]
pub struct IngestSummary {
    pub sync_log_id: i64,
    pub processed: u32,
    pub failed: u32,
}

/// Admin decision action on a staging product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    ApproveNew,
    ApproveMatch,
    Reject,
}

/// Admin decision payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Decision {
    pub action: DecisionAction,
    /// Overrides the stored suggestion for `approve_match`.
    #[serde(default)]
    pub target_product_id: Option<i64>,
    /// Explicit per-variant mappings keyed by external variant id; a `null`
    /// value is the explicit instruction to create a new variant.
    #[serde(default)]
    pub variant_mappings: HashMap<String, Option<i64>>,
    /// Brand assignment for `approve_new`; defaults to the resolved vendor brand.
    #[serde(default)]
    pub brand_id: Option<i64>,
    /// Category assignment for `approve_new`; defaults to a top-level category.
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

/// Result of a merge or rejection, returned to the caller.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub staging_id: i64,
    /// The master product written to (absent on reject).
    pub product_id: Option<i64>,
    pub variants_matched: u32,
    pub variants_created: u32,
    pub offers_written: u32,
    pub offers_rejected: u32,
    /// Advisory warnings (GTIN cross-product hits); never blocking.
    pub warnings: Vec<String>,
}

/// Per-variant match results for the admin review screen.
#[derive(Debug, Clone)]
pub struct VariantMatchReport {
    pub staging_product_id: i64,
    pub target_product_id: Option<i64>,
    pub vendor_brand_id: Option<i64>,
    pub entries: Vec<VariantMatchEntry>,
    pub summary: MatchSummary,
}

#[derive(Debug, Clone)]
pub struct VariantMatchEntry {
    pub staging_variant_id: i64,
    pub external_variant_id: String,
    pub raw_sku: Option<String>,
    pub raw_barcode: Option<String>,
    pub options: std::collections::BTreeMap<String, String>,
    pub result: VariantMatch,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MatchSummary {
    pub total: u32,
    pub matched: u32,
    pub unmatched: u32,
    pub warnings: u32,
}

#[derive(Debug, Deserialize)]
struct ShopifySourceConfig {
    store_url: String,
    #[serde(default)]
    access_token: Option<String>,
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

/// Fetches a merchant's feed and ingests it into staging, then runs the
/// auto-match pass over the merchant's `PENDING_SYNC` rows.
///
/// # Errors
///
/// - [`EngineError::NotFound`] if the merchant does not exist or is inactive.
/// - [`EngineError::Validation`] if the merchant's source config is malformed.
/// - [`EngineError::Upstream`] if the feed fetch itself fails (the sync log
///   records the failure).
/// - [`EngineError::Persistence`] on database failures outside per-product
///   ingestion (per-product failures are counted, not propagated).
pub async fn sync_merchant(
    pool: &PgPool,
    client: &FeedClient,
    merchant_id: i64,
) -> Result<IngestSummary, EngineError> {
    let merchant = offergrid_db::merchants::get_active_merchant(pool, merchant_id)
        .await?
        .ok_or_else(|| EngineError::not_found("merchant", merchant_id))?;

    let source: ShopifySourceConfig = serde_json::from_value(merchant.source_config.clone())
        .map_err(|e| {
            EngineError::Validation(format!(
                "merchant {merchant_id} has malformed source config: {e}"
            ))
        })?;

    let sync_log_id =
        offergrid_db::sync_logs::start_sync_log(pool, merchant_id, "feed sync started").await?;

    let raw_products = match client
        .fetch_products(&source.store_url, source.access_token.as_deref())
        .await
    {
        Ok(products) => products,
        Err(e) => {
            offergrid_db::sync_logs::finish_sync_log(
                pool,
                sync_log_id,
                "FAILED",
                0,
                0,
                &format!("feed fetch failed: {e}"),
            )
            .await?;
            return Err(EngineError::Upstream(e));
        }
    };

    let summary = ingest_batch(pool, merchant_id, sync_log_id, &raw_products).await?;
    auto_match_pending(pool, Some(merchant_id)).await?;

    Ok(summary)
}

/// Ingests already-fetched raw feed products for a merchant, opening and
/// closing a sync log around the batch. Exposed separately from
/// [`sync_merchant`] for callers that supply the payload directly.
///
/// # Errors
///
/// Returns [`EngineError::NotFound`] for an unknown merchant and
/// [`EngineError::Persistence`] for failures outside per-product ingestion.
pub async fn ingest_products(
    pool: &PgPool,
    merchant_id: i64,
    raw_products: &[serde_json::Value],
) -> Result<IngestSummary, EngineError> {
    offergrid_db::merchants::get_active_merchant(pool, merchant_id)
        .await?
        .ok_or_else(|| EngineError::not_found("merchant", merchant_id))?;

    let sync_log_id =
        offergrid_db::sync_logs::start_sync_log(pool, merchant_id, "feed ingest started").await?;

    ingest_batch(pool, merchant_id, sync_log_id, raw_products).await
}

/// Ingestion is per-product resilient: one bad product is counted as failed
/// and logged, the rest of the batch continues.
async fn ingest_batch(
    pool: &PgPool,
    merchant_id: i64,
    sync_log_id: i64,
    raw_products: &[serde_json::Value],
) -> Result<IngestSummary, EngineError> {
    let mut processed = 0u32;
    let mut failed = 0u32;

    for raw in raw_products {
        match ingest_one(pool, merchant_id, raw).await {
            Ok(()) => processed += 1,
            Err(e) => {
                tracing::warn!(
                    merchant_id,
                    error = %e,
                    "failed to ingest feed product; continuing with batch"
                );
                failed += 1;
            }
        }
    }

    let status = if failed == 0 {
        "SUCCESS"
    } else if processed == 0 && !raw_products.is_empty() {
        "FAILED"
    } else {
        "PARTIAL_SUCCESS"
    };

    offergrid_db::sync_logs::finish_sync_log(
        pool,
        sync_log_id,
        status,
        i32::try_from(processed).unwrap_or(i32::MAX),
        i32::try_from(failed).unwrap_or(i32::MAX),
        &format!("ingested {processed} products, {failed} failed"),
    )
    .await?;

    tracing::info!(merchant_id, processed, failed, "feed ingest finished");

    Ok(IngestSummary {
        sync_log_id,
        processed,
        failed,
    })
}

/// Upserts one staging product and its variants inside a single transaction.
async fn ingest_one(
    pool: &PgPool,
    merchant_id: i64,
    raw: &serde_json::Value,
) -> Result<(), EngineError> {
    let product = offergrid_feed::normalize_product(raw)?;
    tracing::debug!(
        merchant_id,
        external_product_id = %product.external_product_id,
        variants = product.variant_count(),
        "staging feed product"
    );

    let mut tx = pool.begin().await?;

    let staging_id = staging::upsert_staging_product(&mut tx, merchant_id, &product).await?;

    let keep: Vec<String> = product
        .variants
        .iter()
        .map(|v| v.external_variant_id.clone())
        .collect();
    staging::delete_stale_staging_variants(&mut tx, staging_id, &keep).await?;

    for variant in &product.variants {
        staging::upsert_staging_variant(&mut tx, staging_id, variant).await?;
    }

    tx.commit().await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Auto-match
// ---------------------------------------------------------------------------

/// Runs the product matcher over every `PENDING_SYNC` staging product
/// (optionally scoped to one merchant), persisting suggestions and
/// transitioning the rows to `NEEDS_REVIEW`. Idempotent: rerunning
/// recomputes and overwrites suggestions.
///
/// Returns the number of staging products matched.
///
/// # Errors
///
/// Returns [`EngineError::Persistence`] if any database operation fails.
pub async fn auto_match_pending(
    pool: &PgPool,
    merchant_id: Option<i64>,
) -> Result<u32, EngineError> {
    let ids = staging::list_staging_ids_by_status(pool, "PENDING_SYNC", merchant_id).await?;

    let mut matched = 0u32;
    for staging_id in &ids {
        rematch_staging(pool, *staging_id).await?;
        matched += 1;
    }

    if matched > 0 {
        tracing::info!(count = matched, "auto-match pass complete");
    }
    Ok(matched)
}

/// Re-runs the product matcher for one staging product. Legal from
/// `PENDING_SYNC` (first match) and from `NEEDS_REVIEW` (idempotent
/// re-match); anything else is an invalid transition.
///
/// # Errors
///
/// - [`EngineError::NotFound`] if the staging product does not exist.
/// - [`EngineError::InvalidTransition`] for `APPROVED`/`REJECTED` rows.
/// - [`EngineError::Persistence`] on database failures.
pub async fn rematch_staging(pool: &PgPool, staging_id: i64) -> Result<(), EngineError> {
    let mut tx = pool.begin().await?;

    let staging = staging::get_staging_product_for_update(&mut tx, staging_id)
        .await?
        .ok_or_else(|| EngineError::not_found("staging product", staging_id))?;
    let status = parse_status(&staging)?;

    if !matches!(
        status,
        StagingStatus::PendingSync | StagingStatus::NeedsReview
    ) {
        return Err(EngineError::InvalidTransition {
            status,
            action: "auto-match",
        });
    }

    let variants = staging::list_staging_variants(&mut tx, staging_id).await?;
    let catalog = catalog::list_active_catalog_variants(&mut tx).await?;
    let titles = catalog::list_active_product_titles(&mut tx).await?;
    let index = IdentifierIndex::build(&catalog);

    let barcodes: Vec<&str> = variants.iter().filter_map(|v| v.raw_barcode.as_deref()).collect();
    let suggestion = suggest_product(&barcodes, &staging.raw_title, &index, &titles);

    let (suggested_id, confidence) = match &suggestion {
        Some(s) => (Some(s.product_id), s.confidence),
        None => (None, 0),
    };
    staging::set_suggestion(&mut tx, staging_id, suggested_id, confidence).await?;

    tx.commit().await?;

    tracing::debug!(
        staging_id,
        suggested_product_id = ?suggested_id,
        confidence,
        "staging product matched"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Admin decisions
// ---------------------------------------------------------------------------

/// Applies an admin decision to a staging product.
///
/// The whole operation is atomic per staging product: either every variant is
/// merged and the status flips, or nothing is committed and the row stays in
/// `NEEDS_REVIEW` — a failed merge is safely retryable.
///
/// # Errors
///
/// - [`EngineError::NotFound`] for a missing staging row or target product.
/// - [`EngineError::InvalidTransition`] when the row is not in `NEEDS_REVIEW`.
/// - [`EngineError::Validation`] for a missing rejection reason or missing
///   merge target.
/// - [`EngineError::Conflict`] on duplicate slug/SKU/GTIN.
/// - [`EngineError::Persistence`] on other database failures.
pub async fn decide(
    pool: &PgPool,
    staging_id: i64,
    decision: &Decision,
) -> Result<MergeOutcome, EngineError> {
    let mut tx = pool.begin().await?;

    let staging = staging::get_staging_product_for_update(&mut tx, staging_id)
        .await?
        .ok_or_else(|| EngineError::not_found("staging product", staging_id))?;
    let status = parse_status(&staging)?;

    let (action_name, next) = match decision.action {
        DecisionAction::ApproveNew => ("approve as new", StagingStatus::Approved),
        DecisionAction::ApproveMatch => ("approve as match", StagingStatus::Approved),
        DecisionAction::Reject => ("reject", StagingStatus::Rejected),
    };
    if !status.can_transition_to(next) {
        return Err(EngineError::InvalidTransition {
            status,
            action: action_name,
        });
    }

    let outcome = match decision.action {
        DecisionAction::Reject => reject(&mut tx, &staging, decision).await?,
        DecisionAction::ApproveNew => approve_new(&mut tx, &staging, decision).await?,
        DecisionAction::ApproveMatch => approve_match(&mut tx, &staging, decision).await?,
    };

    tx.commit().await?;

    for warning in &outcome.warnings {
        tracing::warn!(staging_id, warning = %warning, "merge produced a data-quality warning");
    }
    tracing::info!(
        staging_id,
        action = action_name,
        product_id = ?outcome.product_id,
        variants_matched = outcome.variants_matched,
        variants_created = outcome.variants_created,
        "decision applied"
    );

    Ok(outcome)
}

async fn reject(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    staging: &StagingProductRow,
    decision: &Decision,
) -> Result<MergeOutcome, EngineError> {
    let reason = decision
        .rejection_reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| {
            EngineError::Validation("a non-empty rejection reason is required".to_string())
        })?;

    staging::set_rejected(&mut *tx, staging.id, reason, decision.admin_notes.as_deref()).await?;

    // Offers created by a prior approval stay visible to the merchant as
    // "needs fixing"; a later resync + re-approval relinks them.
    let offers_rejected = offergrid_db::offers::reject_offers_for_external_product(
        &mut *tx,
        staging.merchant_id,
        &staging.external_product_id,
    )
    .await?;

    Ok(MergeOutcome {
        staging_id: staging.id,
        offers_rejected: u32::try_from(offers_rejected).unwrap_or(u32::MAX),
        ..MergeOutcome::default()
    })
}

async fn approve_new(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    staging: &StagingProductRow,
    decision: &Decision,
) -> Result<MergeOutcome, EngineError> {
    let variants = staging::list_staging_variants(&mut *tx, staging.id).await?;

    let brand_id = match decision.brand_id {
        Some(id) => Some(id),
        None => resolve_vendor_brand(&mut *tx, staging).await?,
    };

    let slug = unique_product_slug(staging);
    let base_price_minor = variants.first().map_or(0, |v| v.raw_price_minor);
    let image_url = payload_image_url(&staging.raw_payload);

    let product_id = catalog::insert_product(
        &mut *tx,
        &staging.raw_title,
        &slug,
        staging.raw_body_html.as_deref(),
        image_url.as_deref(),
        base_price_minor,
        brand_id,
    )
    .await?;

    let category_id = match decision.category_id {
        Some(id) => Some(id),
        None => categories::default_top_level_category(&mut *tx).await?,
    };
    if let Some(category_id) = category_id {
        categories::link_product_category(&mut *tx, product_id, category_id).await?;
    }

    let mut outcome = MergeOutcome {
        staging_id: staging.id,
        product_id: Some(product_id),
        ..MergeOutcome::default()
    };

    for sv in &variants {
        let attrs = normalize_attributes(&attributes_from_value(&sv.raw_options));
        let internal_sku = sv
            .raw_sku
            .clone()
            .unwrap_or_else(|| format!("STG-{}-{}", staging.id, sv.id));

        let variant_id = catalog::insert_variant(
            &mut *tx,
            product_id,
            &internal_sku,
            sv.raw_barcode.as_deref(),
            sv.raw_sku.as_deref(),
            &serde_json::to_value(&attrs).unwrap_or_default(),
        )
        .await?;
        staging::set_matched_variant(&mut *tx, sv.id, variant_id).await?;
        outcome.variants_created += 1;

        write_offer(&mut *tx, staging, sv, variant_id, brand_id, category_id).await?;
        outcome.offers_written += 1;
    }

    staging::set_approved(&mut *tx, staging.id, decision.admin_notes.as_deref()).await?;
    Ok(outcome)
}

async fn approve_match(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    staging: &StagingProductRow,
    decision: &Decision,
) -> Result<MergeOutcome, EngineError> {
    let target_id = decision
        .target_product_id
        .or(staging.suggested_product_id)
        .ok_or_else(|| {
            EngineError::Validation(
                "approve_match requires a target product id or a stored suggestion".to_string(),
            )
        })?;

    // Row-level lock: concurrent merges into the same product serialize here.
    let target = catalog::lock_product(&mut *tx, target_id)
        .await?
        .ok_or_else(|| EngineError::not_found("master product", target_id))?;

    let variants = staging::list_staging_variants(&mut *tx, staging.id).await?;
    let mut target_variants = catalog::list_active_variants_for_product(&mut *tx, target_id).await?;
    let catalog_snapshot = catalog::list_active_catalog_variants(&mut *tx).await?;
    let index = IdentifierIndex::build(&catalog_snapshot);

    let vendor_brand_id = resolve_vendor_brand(&mut *tx, staging).await?;
    let category_id = categories::first_category_for_product(&mut *tx, target_id).await?;

    let mut outcome = MergeOutcome {
        staging_id: staging.id,
        product_id: Some(target_id),
        ..MergeOutcome::default()
    };

    for sv in &variants {
        let explicit = explicit_mapping_for(&mut *tx, decision, sv).await?;
        let raw_options = attributes_from_value(&sv.raw_options);
        let input = VariantInput {
            sku: sv.raw_sku.as_deref(),
            barcode: sv.raw_barcode.as_deref(),
            options: &raw_options,
        };

        let result = match_variant(
            &input,
            Some(target_id),
            &target_variants,
            &index,
            vendor_brand_id,
            explicit,
        );
        if let Some(warning) = &result.warning {
            outcome.warnings.push(warning.clone());
        }

        let variant_id = match result.matched_variant_id {
            Some(id) => {
                outcome.variants_matched += 1;
                id
            }
            None => {
                let attrs = normalize_attributes(&raw_options);
                let internal_sku = sv
                    .raw_sku
                    .clone()
                    .unwrap_or_else(|| format!("LINK-{}-{}", staging.id, sv.id));
                let attrs_value = serde_json::to_value(&attrs).unwrap_or_default();

                let id = catalog::insert_variant(
                    &mut *tx,
                    target_id,
                    &internal_sku,
                    sv.raw_barcode.as_deref(),
                    sv.raw_sku.as_deref(),
                    &attrs_value,
                )
                .await?;

                // Later variants in this same merge must see the new row as
                // an attribute-match candidate.
                target_variants.push(CatalogVariantRow {
                    id,
                    product_id: target_id,
                    product_title: target.title.clone(),
                    product_brand_id: target.brand_id,
                    internal_sku,
                    gtin: sv.raw_barcode.clone(),
                    mpn: sv.raw_sku.clone(),
                    attributes: attrs_value,
                });
                outcome.variants_created += 1;
                id
            }
        };

        staging::set_matched_variant(&mut *tx, sv.id, variant_id).await?;
        write_offer(&mut *tx, staging, sv, variant_id, target.brand_id, category_id).await?;
        outcome.offers_written += 1;
    }

    staging::set_approved(&mut *tx, staging.id, decision.admin_notes.as_deref()).await?;
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Variant-match report (admin review screen)
// ---------------------------------------------------------------------------

/// Computes per-variant match results for a staging product without writing
/// anything — the data the admin UI renders on the manual-override screen.
///
/// `target_override` takes precedence over the stored suggestion; with
/// neither, matching runs unscoped (global identifier strategies only).
///
/// # Errors
///
/// - [`EngineError::NotFound`] for a missing staging row or target product.
/// - [`EngineError::Persistence`] on database failures.
pub async fn variant_matches(
    pool: &PgPool,
    staging_id: i64,
    target_override: Option<i64>,
) -> Result<VariantMatchReport, EngineError> {
    let staging = staging::get_staging_product(pool, staging_id)
        .await?
        .ok_or_else(|| EngineError::not_found("staging product", staging_id))?;

    let target_id = target_override.or(staging.suggested_product_id);
    if let Some(target_id) = target_id {
        catalog::get_product(pool, target_id)
            .await?
            .ok_or_else(|| EngineError::not_found("master product", target_id))?;
    }

    let mut conn = pool.acquire().await.map_err(offergrid_db::DbError::from)?;

    let variants = staging::list_staging_variants(&mut conn, staging_id).await?;
    let target_variants = match target_id {
        Some(id) => catalog::list_active_variants_for_product(&mut conn, id).await?,
        None => Vec::new(),
    };
    let catalog_snapshot = catalog::list_active_catalog_variants(&mut conn).await?;
    let index = IdentifierIndex::build(&catalog_snapshot);
    let vendor_brand_id = resolve_vendor_brand(&mut conn, &staging).await?;

    let mut entries = Vec::with_capacity(variants.len());
    let mut summary = MatchSummary::default();

    for sv in &variants {
        let options = attributes_from_value(&sv.raw_options);
        let input = VariantInput {
            sku: sv.raw_sku.as_deref(),
            barcode: sv.raw_barcode.as_deref(),
            options: &options,
        };
        let result = match_variant(&input, target_id, &target_variants, &index, vendor_brand_id, None);

        summary.total += 1;
        if result.matched_variant_id.is_some() {
            summary.matched += 1;
        } else {
            summary.unmatched += 1;
        }
        if result.warning.is_some() {
            summary.warnings += 1;
        }

        entries.push(VariantMatchEntry {
            staging_variant_id: sv.id,
            external_variant_id: sv.external_variant_id.clone(),
            raw_sku: sv.raw_sku.clone(),
            raw_barcode: sv.raw_barcode.clone(),
            options,
            result,
        });
    }

    Ok(VariantMatchReport {
        staging_product_id: staging_id,
        target_product_id: target_id,
        vendor_brand_id,
        entries,
        summary,
    })
}

// ---------------------------------------------------------------------------
// Resync
// ---------------------------------------------------------------------------

/// Merchant-triggered re-fetch of one external product: re-ingests it
/// (clearing any stale rejection) and re-runs the matcher.
///
/// # Errors
///
/// - [`EngineError::NotFound`] for a missing staging row or merchant, or when
///   the product is no longer present in the merchant's feed.
/// - [`EngineError::Upstream`] if the feed fetch fails.
/// - [`EngineError::Persistence`] on database failures.
pub async fn resync_staging(
    pool: &PgPool,
    client: &FeedClient,
    staging_id: i64,
) -> Result<(), EngineError> {
    let staging = staging::get_staging_product(pool, staging_id)
        .await?
        .ok_or_else(|| EngineError::not_found("staging product", staging_id))?;

    let merchant = offergrid_db::merchants::get_active_merchant(pool, staging.merchant_id)
        .await?
        .ok_or_else(|| EngineError::not_found("merchant", staging.merchant_id))?;

    let source: ShopifySourceConfig =
        serde_json::from_value(merchant.source_config.clone()).map_err(|e| {
            EngineError::Validation(format!(
                "merchant {} has malformed source config: {e}",
                merchant.id
            ))
        })?;

    let raw_products = client
        .fetch_products(&source.store_url, source.access_token.as_deref())
        .await?;

    let raw = raw_products
        .iter()
        .find(|raw| {
            raw.get("id")
                .map(ToString::to_string)
                .is_some_and(|id| id == staging.external_product_id)
        })
        .ok_or_else(|| {
            EngineError::not_found("feed product", &staging.external_product_id)
        })?;

    ingest_one(pool, staging.merchant_id, raw).await?;

    // Re-ingest resets REJECTED rows to PENDING_SYNC; APPROVED rows keep
    // their status and are not re-matched.
    let refreshed = staging::get_staging_product(pool, staging_id)
        .await?
        .ok_or_else(|| EngineError::not_found("staging product", staging_id))?;
    if matches!(
        parse_status(&refreshed)?,
        StagingStatus::PendingSync | StagingStatus::NeedsReview
    ) {
        rematch_staging(pool, staging_id).await?;
    }

    tracing::info!(staging_id, "resync complete");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_status(staging: &StagingProductRow) -> Result<StagingStatus, EngineError> {
    StagingStatus::parse(&staging.status).ok_or_else(|| {
        EngineError::Validation(format!(
            "staging product {} has unknown status \"{}\"",
            staging.id, staging.status
        ))
    })
}

async fn resolve_vendor_brand(
    conn: &mut PgConnection,
    staging: &StagingProductRow,
) -> Result<Option<i64>, EngineError> {
    let Some(vendor) = staging.raw_vendor.as_deref() else {
        return Ok(None);
    };
    let brand = offergrid_db::brands::resolve_brand_by_vendor(conn, vendor).await?;
    Ok(brand.map(|b| b.id))
}

/// Slug for a newly promoted product: slugified title plus the merchant and
/// staging ids, unique per staging row without clock-derived suffixes.
fn unique_product_slug(staging: &StagingProductRow) -> String {
    let base = slugify(&staging.raw_title);
    let base = if base.is_empty() { "product".to_string() } else { base };
    format!("{base}-m{}-s{}", staging.merchant_id, staging.id)
}

/// Pulls the primary image URL out of the raw feed payload, if present.
fn payload_image_url(raw: &serde_json::Value) -> Option<String> {
    raw.get("image")
        .and_then(|i| i.get("src"))
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string)
        .or_else(|| {
            raw.get("images")
                .and_then(|imgs| imgs.get(0))
                .and_then(|i| i.get("src"))
                .and_then(serde_json::Value::as_str)
                .map(ToString::to_string)
        })
}

async fn explicit_mapping_for(
    conn: &mut PgConnection,
    decision: &Decision,
    sv: &StagingVariantRow,
) -> Result<Option<ExplicitMapping>, EngineError> {
    match decision.variant_mappings.get(&sv.external_variant_id) {
        None => Ok(None),
        Some(None) => Ok(Some(ExplicitMapping::CreateNew)),
        Some(Some(variant_id)) => {
            catalog::get_variant(conn, *variant_id)
                .await?
                .ok_or_else(|| EngineError::not_found("master variant", *variant_id))?;
            Ok(Some(ExplicitMapping::UseVariant(*variant_id)))
        }
    }
}

/// Creates or refreshes the merchant's offer for a variant, pricing the
/// settlement through the margin calculator.
async fn write_offer(
    conn: &mut PgConnection,
    staging: &StagingProductRow,
    sv: &StagingVariantRow,
    variant_id: i64,
    brand_id: Option<i64>,
    category_id: Option<i64>,
) -> Result<(), EngineError> {
    let settlement = compute_settlement_price(
        &mut *conn,
        staging.merchant_id,
        brand_id,
        category_id,
        sv.raw_price_minor,
    )
    .await?;

    offergrid_db::offers::upsert_offer(
        conn,
        &NewOffer {
            merchant_id: staging.merchant_id,
            variant_id,
            external_product_id: &staging.external_product_id,
            external_variant_id: &sv.external_variant_id,
            merchant_sku: sv.raw_sku.as_deref(),
            currency_code: DEFAULT_CURRENCY,
            cached_price_minor: sv.raw_price_minor,
            cached_settlement_price_minor: settlement,
            current_stock: sv.raw_stock,
            offer_status: OfferStatus::Live.as_str(),
        },
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn make_staging(id: i64, merchant_id: i64, title: &str, status: &str) -> StagingProductRow {
        StagingProductRow {
            id,
            merchant_id,
            external_product_id: format!("ext-{id}"),
            raw_title: title.to_string(),
            raw_body_html: None,
            raw_vendor: None,
            raw_product_type: None,
            raw_tags: vec![],
            raw_payload: json!({}),
            status: status.to_string(),
            suggested_product_id: None,
            match_confidence_score: 0,
            admin_notes: None,
            rejection_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn unique_product_slug_embeds_merchant_and_staging_ids() {
        let staging = make_staging(12, 3, "Prestige Pressure Cooker 5L", "NEEDS_REVIEW");
        assert_eq!(
            unique_product_slug(&staging),
            "prestige-pressure-cooker-5l-m3-s12"
        );
    }

    #[test]
    fn unique_product_slug_falls_back_for_unslugifiable_titles() {
        let staging = make_staging(7, 2, "###", "NEEDS_REVIEW");
        assert_eq!(unique_product_slug(&staging), "product-m2-s7");
    }

    #[test]
    fn payload_image_url_prefers_primary_image() {
        let raw = json!({
            "image": {"src": "https://cdn.example.com/primary.jpg"},
            "images": [{"src": "https://cdn.example.com/gallery.jpg"}]
        });
        assert_eq!(
            payload_image_url(&raw).as_deref(),
            Some("https://cdn.example.com/primary.jpg")
        );
    }

    #[test]
    fn payload_image_url_falls_back_to_gallery() {
        let raw = json!({"images": [{"src": "https://cdn.example.com/gallery.jpg"}]});
        assert_eq!(
            payload_image_url(&raw).as_deref(),
            Some("https://cdn.example.com/gallery.jpg")
        );
    }

    #[test]
    fn payload_image_url_absent_when_no_images() {
        assert!(payload_image_url(&json!({})).is_none());
    }

    #[test]
    fn parse_status_rejects_unknown_values() {
        let staging = make_staging(1, 1, "Anything", "AUTO_MATCHED");
        assert!(matches!(
            parse_status(&staging),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn decision_payload_deserializes_null_mapping_as_create_new() {
        let decision: Decision = serde_json::from_value(json!({
            "action": "approve_match",
            "target_product_id": 5,
            "variant_mappings": {"111": 9, "112": null}
        }))
        .expect("decision should deserialize");

        assert_eq!(decision.action, DecisionAction::ApproveMatch);
        assert_eq!(decision.variant_mappings.get("111"), Some(&Some(9)));
        assert_eq!(decision.variant_mappings.get("112"), Some(&None));
    }
}
