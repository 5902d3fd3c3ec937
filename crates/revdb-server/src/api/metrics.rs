use axum::{extract::State, Extension, Json};
use revdb_core::SuccessMetrics;
use serde::Serialize;

use crate::middleware::RequestId;

use super::{map_db_error, resolve_brand, ActingUser, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct SentimentAccuracyItem {
    pub ai_assigned: i64,
    pub human_corrected: i64,
    /// Share of machine labels nobody corrected; null before any labelling.
    pub accuracy: Option<f64>,
}

pub(super) async fn success_metrics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    user: ActingUser,
) -> Result<Json<ApiResponse<SuccessMetrics>>, ApiError> {
    let rid = &req_id.0;
    let known = revdb_db::get_user(&state.pool, user.0)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    if known.is_none() {
        return Err(ApiError::new(
            rid,
            "not_found",
            format!("user {} not found", user.0),
        ));
    }

    // No qualifying events summarize to absent timestamps and false flags.
    let timeline = revdb_db::load_user_timeline(&state.pool, user.0)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        timeline.summarize(&state.config.metrics_policy),
        req_id.0,
    )))
}

pub(super) async fn sentiment_accuracy(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    user: ActingUser,
) -> Result<Json<ApiResponse<SentimentAccuracyItem>>, ApiError> {
    let rid = &req_id.0;
    let brand = resolve_brand(&state.pool, user, rid).await?;

    let counts = revdb_db::sentiment_accuracy(&state.pool, brand.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        SentimentAccuracyItem {
            ai_assigned: counts.ai_assigned,
            human_corrected: counts.human_corrected,
            accuracy: counts.accuracy(),
        },
        req_id.0,
    )))
}
