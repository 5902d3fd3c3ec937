mod activity;
mod metrics;
mod refresh;
mod reviews;
mod sources;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use revdb_core::{AppConfig, Clock};
use revdb_db::DbError;
use revdb_sync::ReviewFetcher;
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

/// Header naming the user a protected request acts for.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub clock: Arc<dyn Clock>,
    pub fetcher: Arc<dyn ReviewFetcher>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(data: T, request_id: String) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
                details: None,
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.error.details = Some(details);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "access_denied" | "quota_exceeded" => StatusCode::FORBIDDEN,
            "conflict" | "duplicate_resource" => StatusCode::CONFLICT,
            "cooldown_active" | "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_db_error(request_id: String, error: &DbError) -> ApiError {
    match error {
        DbError::Validation(reason) => {
            ApiError::new(request_id, "validation_error", reason.clone())
        }
        DbError::NotFound => ApiError::new(request_id, "not_found", "record not found"),
        DbError::UnknownUser(_) => ApiError::new(request_id, "not_found", error.to_string()),
        DbError::AccessDenied => ApiError::new(
            request_id,
            "access_denied",
            "record belongs to another brand",
        ),
        DbError::QuotaExceeded(details) => {
            ApiError::new(request_id, "quota_exceeded", error.to_string()).with_details(json!({
                "current_count": details.current_count,
                "max_allowed": details.max_allowed,
                "plan_type": details.plan_type,
            }))
        }
        DbError::DuplicateSource { key } => {
            ApiError::new(request_id, "duplicate_resource", error.to_string()).with_details(
                json!({
                    "key": {
                        "brand_id": key.brand_id,
                        "platform_type": key.platform_type,
                        "external_profile_id": key.external_profile_id,
                    }
                }),
            )
        }
        DbError::CooldownActive { remaining } => {
            ApiError::new(request_id, "cooldown_active", error.to_string()).with_details(json!({
                "remaining_seconds": revdb_core::whole_seconds_ceil(*remaining),
            }))
        }
        DbError::Conflict => ApiError::new(request_id, "conflict", error.to_string())
            .with_details(json!({ "retryable": true })),
        DbError::Core(_)
        | DbError::Sqlx(_)
        | DbError::Migration(_)
        | DbError::MissingDatabaseUrl => {
            tracing::error!(error = %error, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

/// The user a protected request acts for, read from [`USER_ID_HEADER`].
#[derive(Debug, Clone, Copy)]
pub(super) struct ActingUser(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for ActingUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let rid = parts
            .extensions
            .get::<RequestId>()
            .map(|r| r.0.clone())
            .unwrap_or_default();

        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ApiError::new(&rid, "unauthorized", "x-user-id header is required")
            })?;

        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| ApiError::new(&rid, "validation_error", "x-user-id must be a UUID"))
    }
}

/// Resolve the live brand owned by the acting user, returning 404 if none.
pub(super) async fn resolve_brand(
    pool: &PgPool,
    user: ActingUser,
    request_id: &str,
) -> Result<revdb_db::BrandRow, ApiError> {
    revdb_db::get_brand_for_owner(pool, user.0)
        .await
        .map_err(|e| map_db_error(request_id.to_owned(), &e))?
        .ok_or_else(|| ApiError::new(request_id, "not_found", "no brand configured for this user"))
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static(USER_ID_HEADER),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/sources",
            get(sources::list_sources).post(sources::create_source),
        )
        .route(
            "/api/v1/sources/{id}",
            get(sources::get_source)
                .patch(sources::update_source)
                .delete(sources::delete_source),
        )
        .route(
            "/api/v1/refresh",
            get(refresh::get_refresh_status).post(refresh::trigger_refresh),
        )
        .route(
            "/api/v1/reviews/{id}/sentiment",
            put(reviews::correct_sentiment),
        )
        .route(
            "/api/v1/reviews/{id}/sentiment/history",
            get(reviews::sentiment_history),
        )
        .route(
            "/api/v1/activity",
            get(activity::list_activity).post(activity::log_activity),
        )
        .route("/api/v1/metrics/success", get(metrics::success_metrics))
        .route(
            "/api/v1/metrics/sentiment-accuracy",
            get(metrics::sentiment_accuracy),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match revdb_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}
