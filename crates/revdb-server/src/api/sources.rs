//! Review source handlers.
//!
//! - `GET    /api/v1/sources`     : the caller's brand sources
//! - `POST   /api/v1/sources`     : add a source (quota and duplicate checked)
//! - `GET    /api/v1/sources/{id}`: one source
//! - `PATCH  /api/v1/sources/{id}`: toggle activation or change the profile URL
//! - `DELETE /api/v1/sources/{id}`: soft-delete

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use revdb_core::{AuthMethod, PlatformType};
use revdb_db::{NewReviewSource, ReviewSourceRow, ReviewSourceUpdate};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, resolve_brand, ActingUser, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct CreateSourceRequest {
    pub platform_type: String,
    pub external_profile_id: String,
    pub profile_url: String,
    pub auth_method: String,
    /// Opaque, already-encrypted credential blob; stored as given.
    pub encrypted_credentials: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateSourceRequest {
    pub is_active: Option<bool>,
    pub profile_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct SourceItem {
    pub id: i64,
    pub brand_id: i64,
    pub platform_type: String,
    pub external_profile_id: String,
    pub profile_url: String,
    pub auth_method: String,
    pub is_active: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_status: Option<String>,
    pub last_sync_error: Option<String>,
    pub next_scheduled_sync_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ReviewSourceRow> for SourceItem {
    fn from(row: ReviewSourceRow) -> Self {
        Self {
            id: row.id,
            brand_id: row.brand_id,
            platform_type: row.platform_type,
            external_profile_id: row.external_profile_id,
            profile_url: row.profile_url,
            auth_method: row.auth_method,
            is_active: row.is_active,
            last_sync_at: row.last_sync_at,
            last_sync_status: row.last_sync_status,
            last_sync_error: row.last_sync_error,
            next_scheduled_sync_at: row.next_scheduled_sync_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn parse_field<T: std::str::FromStr>(req_id: &str, field: &str, value: &str) -> Result<T, ApiError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ApiError::new(req_id, "validation_error", format!("{field}: {e}")))
}

/// Profile URLs must be absolute http(s) URLs.
fn validate_profile_url(req_id: &str, value: &str) -> Result<(), ApiError> {
    let url = reqwest::Url::parse(value.trim()).map_err(|_| {
        ApiError::new(
            req_id,
            "validation_error",
            format!("profile_url is not a valid URL: '{value}'"),
        )
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ApiError::new(
            req_id,
            "validation_error",
            format!("profile_url must use http or https, got '{other}'"),
        )),
    }
}

pub(super) async fn list_sources(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    user: ActingUser,
) -> Result<Json<ApiResponse<Vec<SourceItem>>>, ApiError> {
    let rid = &req_id.0;
    let brand = resolve_brand(&state.pool, user, rid).await?;

    let rows = revdb_db::list_brand_sources(&state.pool, brand.id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        rows.into_iter().map(SourceItem::from).collect(),
        req_id.0,
    )))
}

pub(super) async fn create_source(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    user: ActingUser,
    Json(body): Json<CreateSourceRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SourceItem>>), ApiError> {
    let rid = &req_id.0;

    let platform_type: PlatformType = parse_field(rid, "platform_type", &body.platform_type)?;
    let auth_method: AuthMethod = parse_field(rid, "auth_method", &body.auth_method)?;
    validate_profile_url(rid, &body.profile_url)?;

    let brand = resolve_brand(&state.pool, user, rid).await?;
    let source = NewReviewSource {
        platform_type,
        external_profile_id: &body.external_profile_id,
        profile_url: &body.profile_url,
        auth_method,
        encrypted_credentials: body.encrypted_credentials.as_deref().map(str::as_bytes),
    };

    let row = revdb_db::create_review_source(
        &state.pool,
        brand.id,
        user.0,
        &source,
        &state.config.sync_window,
        state.clock.now(),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(SourceItem::from(row), req_id.0)),
    ))
}

pub(super) async fn get_source(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    user: ActingUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<SourceItem>>, ApiError> {
    let rid = &req_id.0;
    let brand = resolve_brand(&state.pool, user, rid).await?;

    let row = revdb_db::get_review_source(&state.pool, brand.id, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(SourceItem::from(row), req_id.0)))
}

pub(super) async fn update_source(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    user: ActingUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateSourceRequest>,
) -> Result<Json<ApiResponse<SourceItem>>, ApiError> {
    let rid = &req_id.0;
    if let Some(ref url) = body.profile_url {
        validate_profile_url(rid, url)?;
    }

    let brand = resolve_brand(&state.pool, user, rid).await?;
    let update = ReviewSourceUpdate {
        is_active: body.is_active,
        profile_url: body.profile_url.as_deref(),
    };

    let row = revdb_db::update_review_source(
        &state.pool,
        brand.id,
        user.0,
        id,
        &update,
        state.clock.now(),
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(SourceItem::from(row), req_id.0)))
}

pub(super) async fn delete_source(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    user: ActingUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let rid = &req_id.0;
    let brand = resolve_brand(&state.pool, user, rid).await?;

    revdb_db::delete_review_source(&state.pool, brand.id, user.0, id, state.clock.now())
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        serde_json::json!({ "deleted": true }),
        req_id.0,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_url_must_be_http() {
        assert!(validate_profile_url("r", "https://maps.example.com/place/1").is_ok());
        assert!(validate_profile_url("r", "http://yelp.example.com/biz/x").is_ok());

        let err = validate_profile_url("r", "ftp://files.example.com").unwrap_err();
        assert_eq!(err.error.code, "validation_error");
        assert!(validate_profile_url("r", "not a url").is_err());
    }

    #[test]
    fn unknown_platform_is_a_validation_error() {
        let err = parse_field::<PlatformType>("r", "platform_type", "myspace").unwrap_err();
        assert_eq!(err.error.code, "validation_error");
        assert!(err.error.message.starts_with("platform_type:"));

        let ok: PlatformType = parse_field("r", "platform_type", " google ").unwrap();
        assert_eq!(ok, PlatformType::Google);
    }
}
