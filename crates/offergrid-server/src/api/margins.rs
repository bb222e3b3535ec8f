//! Margin-rule handlers. The at-most-one-active-rule-per-scope invariant is
//! enforced here at write time with an overlap query, not by a constraint.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct MarginRuleItem {
    pub id: i64,
    pub merchant_id: i64,
    pub brand_id: Option<i64>,
    pub category_id: Option<i64>,
    pub margin_percentage: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateMarginRuleRequest {
    pub merchant_id: i64,
    pub brand_id: Option<i64>,
    pub category_id: Option<i64>,
    pub margin_percentage: Decimal,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
}

fn to_item(row: offergrid_db::MarginRuleRow) -> MarginRuleItem {
    MarginRuleItem {
        id: row.id,
        merchant_id: row.merchant_id,
        brand_id: row.brand_id,
        category_id: row.category_id,
        margin_percentage: row.margin_percentage,
        valid_from: row.valid_from,
        valid_to: row.valid_to,
        is_active: row.is_active,
    }
}

pub(super) async fn list_margin_rules(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<MarginRuleItem>>>, ApiError> {
    let rows = offergrid_db::margins::list_rules(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(to_item).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn create_margin_rule(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<CreateMarginRuleRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MarginRuleItem>>), ApiError> {
    if request.margin_percentage < Decimal::ZERO || request.margin_percentage > Decimal::ONE_HUNDRED
    {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            format!(
                "margin_percentage must be between 0 and 100, got {}",
                request.margin_percentage
            ),
        ));
    }

    if let (Some(from), Some(to)) = (request.valid_from, request.valid_to) {
        if to <= from {
            return Err(ApiError::new(
                req_id.0,
                "validation_error",
                "valid_to must be after valid_from",
            ));
        }
    }

    let merchant = offergrid_db::merchants::get_active_merchant(&state.pool, request.merchant_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    if merchant.is_none() {
        return Err(ApiError::new(
            req_id.0,
            "not_found",
            format!("merchant {} not found", request.merchant_id),
        ));
    }

    if let Some(brand_id) = request.brand_id {
        let brand = offergrid_db::brands::get_brand(&state.pool, brand_id)
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
        if brand.is_none() {
            return Err(ApiError::new(
                req_id.0,
                "not_found",
                format!("brand {brand_id} not found"),
            ));
        }
    }

    if let Some(category_id) = request.category_id {
        let category = offergrid_db::categories::get_category(&state.pool, category_id)
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
        if category.is_none() {
            return Err(ApiError::new(
                req_id.0,
                "not_found",
                format!("category {category_id} not found"),
            ));
        }
    }

    let valid_from = request.valid_from.unwrap_or_else(Utc::now);

    let conflicting = offergrid_db::margins::find_conflicting_rule(
        &state.pool,
        request.merchant_id,
        request.brand_id,
        request.category_id,
        valid_from,
        request.valid_to,
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    if let Some(existing_id) = conflicting {
        return Err(ApiError::new(
            req_id.0,
            "conflict",
            format!(
                "an active margin rule ({existing_id}) already covers this scope and window"
            ),
        ));
    }

    let row = offergrid_db::margins::create_rule(
        &state.pool,
        request.merchant_id,
        request.brand_id,
        request.category_id,
        request.margin_percentage,
        valid_from,
        request.valid_to,
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: to_item(row),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

pub(super) async fn deactivate_margin_rule(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(rule_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let deactivated = offergrid_db::margins::deactivate_rule(&state.pool, rule_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    if deactivated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::new(
            req_id.0,
            "not_found",
            format!("margin rule {rule_id} not found"),
        ))
    }
}
