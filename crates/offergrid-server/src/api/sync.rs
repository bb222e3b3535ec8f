//! Feed synchronization handlers: whole-merchant sync and single-product
//! resync.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{map_engine_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct SyncResponse {
    pub sync_log_id: i64,
    pub processed: u32,
    pub failed: u32,
}

pub(super) async fn post_merchant_sync(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(merchant_id): Path<i64>,
) -> Result<Json<ApiResponse<SyncResponse>>, ApiError> {
    let summary = offergrid_engine::sync_merchant(&state.pool, &state.feed, merchant_id)
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: SyncResponse {
            sync_log_id: summary.sync_log_id,
            processed: summary.processed,
            failed: summary.failed,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Serialize)]
pub(super) struct ResyncResponse {
    pub staging_id: i64,
    pub resynced: bool,
}

pub(super) async fn post_resync(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(staging_id): Path<i64>,
) -> Result<Json<ApiResponse<ResyncResponse>>, ApiError> {
    offergrid_engine::resync_staging(&state.pool, &state.feed, staging_id)
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: ResyncResponse {
            staging_id,
            resynced: true,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
