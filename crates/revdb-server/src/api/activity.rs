use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use revdb_core::ActivityType;
use revdb_db::{ActivityRow, NewActivityEntry};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::middleware::RequestId;

use super::{map_db_error, ActingUser, ApiError, ApiResponse, AppState};

const DEFAULT_PAGE_SIZE: i64 = 20;

#[derive(Debug, Deserialize)]
pub(super) struct ActivityQuery {
    pub page: Option<i64>,
    pub size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LogActivityRequest {
    pub activity_type: String,
    pub metadata: Option<Value>,
}

#[derive(Debug, Serialize)]
pub(super) struct ActivityItem {
    pub id: i64,
    pub brand_id: Option<i64>,
    pub activity_type: String,
    pub metadata: Value,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct ActivityPageItem {
    pub entries: Vec<ActivityItem>,
    pub total: i64,
    pub page: i64,
    pub size: i64,
}

impl From<ActivityRow> for ActivityItem {
    fn from(row: ActivityRow) -> Self {
        Self {
            id: row.id,
            brand_id: row.brand_id,
            activity_type: row.activity_type,
            metadata: row.metadata,
            occurred_at: row.occurred_at,
        }
    }
}

pub(super) async fn list_activity(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    user: ActingUser,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<ApiResponse<ActivityPageItem>>, ApiError> {
    let rid = &req_id.0;
    let page = revdb_db::list_activity(
        &state.pool,
        user.0,
        query.page.unwrap_or(1),
        query.size.unwrap_or(DEFAULT_PAGE_SIZE),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        ActivityPageItem {
            entries: page.entries.into_iter().map(ActivityItem::from).collect(),
            total: page.total,
            page: page.page,
            size: page.size,
        },
        req_id.0,
    )))
}

/// POST /api/v1/activity: record a client-side event (login, dashboard view,
/// filter). Server-side events are written only by the operations that cause
/// them and are rejected here.
pub(super) async fn log_activity(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    user: ActingUser,
    Json(body): Json<LogActivityRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ActivityItem>>), ApiError> {
    let rid = &req_id.0;

    let activity_type: ActivityType = body.activity_type.trim().parse().map_err(|_| {
        ApiError::new(
            rid,
            "validation_error",
            format!("unknown activity_type '{}'", body.activity_type),
        )
    })?;
    if !activity_type.is_client_reportable() {
        return Err(ApiError::new(
            rid,
            "validation_error",
            format!("activity_type '{activity_type}' is recorded by the server"),
        ));
    }

    let metadata = body.metadata.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    if !metadata.is_object() {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "metadata must be a JSON object",
        ));
    }

    let mut entry =
        NewActivityEntry::new(user.0, activity_type, state.clock.now()).with_metadata(metadata);
    if let Some(brand) = revdb_db::get_brand_for_owner(&state.pool, user.0)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
    {
        entry = entry.with_brand(brand.id);
    }

    let row = revdb_db::log_activity(&state.pool, &entry)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(ActivityItem::from(row), req_id.0)),
    ))
}
