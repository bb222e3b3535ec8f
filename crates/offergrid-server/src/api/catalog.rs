//! Master catalog handlers for the admin manual-match screen.

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct ProductItem {
    pub id: i64,
    pub brand_id: Option<i64>,
    pub title: String,
    pub slug: String,
    pub image_url: Option<String>,
    pub base_price_minor: i64,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ProductQuery {
    pub search: Option<String>,
    pub limit: Option<i64>,
}

pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ApiResponse<Vec<ProductItem>>>, ApiError> {
    let rows = offergrid_db::catalog::search_products_by_title(
        &state.pool,
        query.search.as_deref().unwrap_or(""),
        normalize_limit(query.limit),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| ProductItem {
            id: row.id,
            brand_id: row.brand_id,
            title: row.title,
            slug: row.slug,
            image_url: row.image_url,
            base_price_minor: row.base_price_minor,
            status: row.status,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
