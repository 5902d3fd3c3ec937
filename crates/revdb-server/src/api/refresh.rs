use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{map_db_error, resolve_brand, ActingUser, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct RefreshStatusItem {
    pub last_manual_refresh_at: Option<DateTime<Utc>>,
    pub can_refresh: bool,
    pub remaining_seconds: i64,
    pub next_allowed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub(super) struct RefreshResultItem {
    pub brand_id: i64,
    pub refreshed_at: DateTime<Utc>,
    pub sources: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub reviews_inserted: usize,
}

pub(super) async fn get_refresh_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    user: ActingUser,
) -> Result<Json<ApiResponse<RefreshStatusItem>>, ApiError> {
    let rid = &req_id.0;
    let brand = resolve_brand(&state.pool, user, rid).await?;

    let status = revdb_db::refresh_status(
        &state.pool,
        brand.id,
        &state.config.refresh_cooldown,
        state.clock.now(),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        RefreshStatusItem {
            last_manual_refresh_at: status.last_manual_refresh_at,
            can_refresh: status.can_refresh,
            remaining_seconds: revdb_core::whole_seconds_ceil(status.remaining),
            next_allowed_at: status.next_allowed_at,
        },
        req_id.0,
    )))
}

/// POST /api/v1/refresh: start the cooldown and sync every active source now.
///
/// The sync runs inside the request; a plan caps a brand at a handful of
/// sources, and per-source failures land on the sources, not in the response
/// status.
pub(super) async fn trigger_refresh(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    user: ActingUser,
) -> Result<Json<ApiResponse<RefreshResultItem>>, ApiError> {
    let rid = &req_id.0;
    let brand = resolve_brand(&state.pool, user, rid).await?;

    let refresh = revdb_db::trigger_manual_refresh(
        &state.pool,
        brand.id,
        user.0,
        &state.config.refresh_cooldown,
        state.clock.now(),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    let report = revdb_sync::sync_batch(
        &state.pool,
        state.fetcher.as_ref(),
        &refresh.sources,
        &state.config.sync_window,
        state.clock.as_ref(),
        state.config.sync_concurrency,
    )
    .await;

    Ok(Json(ApiResponse::new(
        RefreshResultItem {
            brand_id: refresh.brand_id,
            refreshed_at: refresh.refreshed_at,
            sources: report.sources,
            succeeded: report.succeeded,
            failed: report.failed + report.errored,
            reviews_inserted: report.reviews_inserted,
        },
        req_id.0,
    )))
}
