//! Review-queue handlers: queue listing, staging detail, variant-match
//! report, and the admin decision endpoint.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{
    map_db_error, map_engine_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta,
};

/// Statuses shown when no explicit filter is given.
const DEFAULT_QUEUE_STATUSES: &[&str] = &["PENDING_SYNC", "NEEDS_REVIEW"];

#[derive(Debug, Serialize)]
pub(super) struct ReviewQueueItem {
    pub staging_id: i64,
    pub merchant_id: i64,
    pub merchant_name: String,
    pub title: String,
    pub vendor: Option<String>,
    pub status: String,
    pub suggested_product_id: Option<i64>,
    pub match_confidence: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ReviewQueueQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub(super) async fn list_review_queue(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ReviewQueueQuery>,
) -> Result<Json<ApiResponse<Vec<ReviewQueueItem>>>, ApiError> {
    let statuses: Vec<&str> = match query.status.as_deref() {
        Some(status) => vec![status],
        None => DEFAULT_QUEUE_STATUSES.to_vec(),
    };

    let rows = offergrid_db::staging::review_queue(
        &state.pool,
        &statuses,
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| ReviewQueueItem {
            staging_id: row.id,
            merchant_id: row.merchant_id,
            merchant_name: row.merchant_name,
            title: row.raw_title,
            vendor: row.raw_vendor,
            status: row.status,
            suggested_product_id: row.suggested_product_id,
            match_confidence: row.match_confidence_score,
            created_at: row.created_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Serialize)]
pub(super) struct StagingVariantDetail {
    pub staging_variant_id: i64,
    pub external_variant_id: String,
    pub raw_sku: Option<String>,
    pub raw_barcode: Option<String>,
    pub raw_price_minor: i64,
    pub raw_stock: i32,
    pub options: serde_json::Value,
    pub matched_variant_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct StagingDetail {
    pub staging_id: i64,
    pub merchant_id: i64,
    pub external_product_id: String,
    pub title: String,
    pub vendor: Option<String>,
    pub product_type: Option<String>,
    pub tags: Vec<String>,
    pub status: String,
    pub suggested_product_id: Option<i64>,
    pub match_confidence: i32,
    pub admin_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub variants: Vec<StagingVariantDetail>,
}

pub(super) async fn get_staging_detail(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(staging_id): Path<i64>,
) -> Result<Json<ApiResponse<StagingDetail>>, ApiError> {
    let staging = offergrid_db::staging::get_staging_product(&state.pool, staging_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("staging product {staging_id} not found"),
            )
        })?;

    let mut conn = state
        .pool
        .acquire()
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &offergrid_db::DbError::from(e)))?;
    let variants = offergrid_db::staging::list_staging_variants(&mut conn, staging_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = StagingDetail {
        staging_id: staging.id,
        merchant_id: staging.merchant_id,
        external_product_id: staging.external_product_id,
        title: staging.raw_title,
        vendor: staging.raw_vendor,
        product_type: staging.raw_product_type,
        tags: staging.raw_tags,
        status: staging.status,
        suggested_product_id: staging.suggested_product_id,
        match_confidence: staging.match_confidence_score,
        admin_notes: staging.admin_notes,
        rejection_reason: staging.rejection_reason,
        created_at: staging.created_at,
        variants: variants
            .into_iter()
            .map(|v| StagingVariantDetail {
                staging_variant_id: v.id,
                external_variant_id: v.external_variant_id,
                raw_sku: v.raw_sku,
                raw_barcode: v.raw_barcode,
                raw_price_minor: v.raw_price_minor,
                raw_stock: v.raw_stock,
                options: v.raw_options,
                matched_variant_id: v.matched_variant_id,
            })
            .collect(),
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct VariantMatchesQuery {
    pub target_product_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct VariantMatchItem {
    pub staging_variant_id: i64,
    pub external_variant_id: String,
    pub raw_sku: Option<String>,
    pub raw_barcode: Option<String>,
    pub options: BTreeMap<String, String>,
    pub strategy: &'static str,
    pub matched_variant_id: Option<i64>,
    pub matched_product_id: Option<i64>,
    pub confidence: i32,
    pub warning: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct VariantMatchSummary {
    pub total: u32,
    pub matched: u32,
    pub unmatched: u32,
    pub warnings: u32,
}

#[derive(Debug, Serialize)]
pub(super) struct VariantMatchesResponse {
    pub staging_product_id: i64,
    pub target_product_id: Option<i64>,
    pub vendor_brand_id: Option<i64>,
    pub matches: Vec<VariantMatchItem>,
    pub summary: VariantMatchSummary,
}

pub(super) async fn get_variant_matches(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(staging_id): Path<i64>,
    Query(query): Query<VariantMatchesQuery>,
) -> Result<Json<ApiResponse<VariantMatchesResponse>>, ApiError> {
    let report =
        offergrid_engine::variant_matches(&state.pool, staging_id, query.target_product_id)
            .await
            .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;

    let data = VariantMatchesResponse {
        staging_product_id: report.staging_product_id,
        target_product_id: report.target_product_id,
        vendor_brand_id: report.vendor_brand_id,
        matches: report
            .entries
            .into_iter()
            .map(|entry| VariantMatchItem {
                staging_variant_id: entry.staging_variant_id,
                external_variant_id: entry.external_variant_id,
                raw_sku: entry.raw_sku,
                raw_barcode: entry.raw_barcode,
                options: entry.options,
                strategy: entry.result.strategy.as_str(),
                matched_variant_id: entry.result.matched_variant_id,
                matched_product_id: entry.result.matched_product_id,
                confidence: entry.result.confidence,
                warning: entry.result.warning,
            })
            .collect(),
        summary: VariantMatchSummary {
            total: report.summary.total,
            matched: report.summary.matched,
            unmatched: report.summary.unmatched,
            warnings: report.summary.warnings,
        },
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Serialize)]
pub(super) struct DecisionResponse {
    pub staging_id: i64,
    pub product_id: Option<i64>,
    pub variants_matched: u32,
    pub variants_created: u32,
    pub offers_written: u32,
    pub offers_rejected: u32,
    pub warnings: Vec<String>,
}

pub(super) async fn post_decision(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(staging_id): Path<i64>,
    Json(decision): Json<offergrid_engine::Decision>,
) -> Result<(StatusCode, Json<ApiResponse<DecisionResponse>>), ApiError> {
    let outcome = offergrid_engine::decide(&state.pool, staging_id, &decision)
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;

    let data = DecisionResponse {
        staging_id: outcome.staging_id,
        product_id: outcome.product_id,
        variants_matched: outcome.variants_matched,
        variants_created: outcome.variants_created,
        offers_written: outcome.offers_written,
        offers_rejected: outcome.offers_rejected,
        warnings: outcome.warnings,
    };

    Ok((
        StatusCode::OK,
        Json(ApiResponse {
            data,
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}
