use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use revdb_core::Sentiment;
use revdb_db::{SentimentChangeRow, SentimentCorrection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, resolve_brand, ActingUser, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct CorrectSentimentRequest {
    pub sentiment: String,
}

#[derive(Debug, Serialize)]
pub(super) struct CorrectionItem {
    pub review_id: i64,
    pub sentiment: Sentiment,
    pub previous_sentiment: Option<Sentiment>,
    /// False when the review already had this value and nothing was written.
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct SentimentChangeItem {
    pub id: i64,
    pub old_sentiment: Option<String>,
    pub new_sentiment: String,
    pub reason: String,
    pub changed_by_user_id: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
}

impl From<SentimentChangeRow> for SentimentChangeItem {
    fn from(row: SentimentChangeRow) -> Self {
        Self {
            id: row.id,
            old_sentiment: row.old_sentiment,
            new_sentiment: row.new_sentiment,
            reason: row.reason,
            changed_by_user_id: row.changed_by_user_id,
            changed_at: row.changed_at,
        }
    }
}

/// PUT /api/v1/reviews/{id}/sentiment: manual correction by the acting user.
pub(super) async fn correct_sentiment(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    user: ActingUser,
    Path(review_id): Path<i64>,
    Json(body): Json<CorrectSentimentRequest>,
) -> Result<Json<ApiResponse<CorrectionItem>>, ApiError> {
    let rid = &req_id.0;
    let sentiment: Sentiment = body.sentiment.trim().parse().map_err(|_| {
        ApiError::new(
            rid,
            "validation_error",
            format!(
                "sentiment must be 'positive', 'neutral' or 'negative', got '{}'",
                body.sentiment
            ),
        )
    })?;

    let brand = resolve_brand(&state.pool, user, rid).await?;
    let outcome = revdb_db::correct_sentiment(
        &state.pool,
        brand.id,
        user.0,
        review_id,
        sentiment,
        state.clock.now(),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    let (previous_sentiment, changed) = match outcome {
        SentimentCorrection::Updated { previous } => (previous, true),
        SentimentCorrection::Unchanged => (Some(sentiment), false),
    };

    Ok(Json(ApiResponse::new(
        CorrectionItem {
            review_id,
            sentiment,
            previous_sentiment,
            changed,
        },
        req_id.0,
    )))
}

/// GET /api/v1/reviews/{id}/sentiment/history: newest first.
pub(super) async fn sentiment_history(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    user: ActingUser,
    Path(review_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<SentimentChangeItem>>>, ApiError> {
    let rid = &req_id.0;
    let brand = resolve_brand(&state.pool, user, rid).await?;

    let rows = revdb_db::sentiment_history(&state.pool, brand.id, review_id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        rows.into_iter().map(SentimentChangeItem::from).collect(),
        req_id.0,
    )))
}
