use chrono::TimeDelta;
use revdb_core::{AppConfig, CoreError, QuotaExceeded, SourceKey};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, time::Duration};
use thiserror::Error;
use uuid::Uuid;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// Upper bound on how long a transaction waits for a contended row lock
/// before giving up with [`DbError::Conflict`].
pub(crate) const LOCK_TIMEOUT: &str = "SET LOCAL lock_timeout = '5s'";

// Path relative to crates/revdb-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self {
            max_connections: read_u32("REVDB_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS),
            min_connections: read_u32("REVDB_DB_MIN_CONNECTIONS", DEFAULT_MIN_CONNECTIONS),
            acquire_timeout_secs: read_u64(
                "REVDB_DB_ACQUIRE_TIMEOUT_SECS",
                DEFAULT_ACQUIRE_TIMEOUT_SECS,
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
    #[error("record not found")]
    NotFound,
    #[error("record belongs to another brand")]
    AccessDenied,
    #[error(
        "source limit reached: {} of {} sources on the {} plan",
        .0.current_count, .0.max_allowed, .0.plan_type
    )]
    QuotaExceeded(QuotaExceeded),
    #[error("review source already exists: {key}")]
    DuplicateSource { key: SourceKey },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("manual refresh is cooling down for another {}s", .remaining.num_seconds())]
    CooldownActive { remaining: TimeDelta },
    #[error("concurrent modification, retry the operation")]
    Conflict,
    #[error("unknown user {0}")]
    UnknownUser(Uuid),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Sqlx(sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    /// Whether the same call may succeed if simply repeated.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}

/// Lock timeouts, serialization failures and deadlocks surface as
/// [`DbError::Conflict`]; everything else stays a raw [`DbError::Sqlx`].
impl From<sqlx::Error> for DbError {
    fn from(error: sqlx::Error) -> Self {
        match sqlstate(&error).as_deref() {
            Some("55P03" | "40001" | "40P01") => Self::Conflict,
            _ => Self::Sqlx(error),
        }
    }
}

/// The Postgres SQLSTATE of a database error, if it is one.
pub(crate) fn sqlstate(error: &sqlx::Error) -> Option<String> {
    match error {
        sqlx::Error::Database(db_err) => db_err.code().map(std::borrow::Cow::into_owned),
        _ => None,
    }
}

/// The violated constraint name of a database error, if any.
pub(crate) fn violated_constraint(error: &sqlx::Error) -> Option<&str> {
    match error {
        sqlx::Error::Database(db_err) => db_err.constraint(),
        _ => None,
    }
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Connect to a Postgres pool, reading `DATABASE_URL` and pool settings from env.
///
/// # Errors
///
/// Returns [`DbError::MissingDatabaseUrl`] if `DATABASE_URL` is unset, or
/// [`DbError::Sqlx`] if the connection cannot be established.
pub async fn connect_pool_from_env() -> Result<PgPool, DbError> {
    let database_url = env::var("DATABASE_URL").map_err(|_| DbError::MissingDatabaseUrl)?;
    let config = PoolConfig::from_env();
    connect_pool(&database_url, config)
        .await
        .map_err(DbError::from)
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // _sqlx_migrations does not exist on a fresh database; treat that as zero applied.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Run a full health check: ping the pool and return a typed error on failure.
///
/// # Errors
///
/// Returns [`DbError`] if the ping fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    ping(pool).await?;
    Ok(())
}

fn read_u32(var: &str, default: u32) -> u32 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}

fn read_u64(var: &str, default: u64) -> u64 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_config_has_sane_defaults() {
        let config = PoolConfig::default();

        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.min_connections, DEFAULT_MIN_CONNECTIONS);
        assert_eq!(config.acquire_timeout_secs, DEFAULT_ACQUIRE_TIMEOUT_SECS);
    }

    #[test]
    fn only_conflict_is_retryable() {
        assert!(DbError::Conflict.is_retryable());
        assert!(!DbError::NotFound.is_retryable());
        assert!(!DbError::Validation("x".to_string()).is_retryable());
    }

    #[test]
    fn non_database_sqlx_errors_stay_raw() {
        let err = DbError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, DbError::Sqlx(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn cooldown_message_reports_whole_seconds() {
        let err = DbError::CooldownActive {
            remaining: TimeDelta::minutes(90),
        };
        assert_eq!(
            err.to_string(),
            "manual refresh is cooling down for another 5400s"
        );
    }
}

pub mod activity;
pub mod brands;
pub mod review_sources;
pub mod reviews;
pub mod sentiment;
pub mod users;

pub use activity::{
    list_activity, load_user_timeline, log_activity, ActivityPage, ActivityRow, NewActivityEntry,
};
pub use brands::{
    create_brand, get_brand, get_brand_for_owner, refresh_status, soft_delete_brand,
    trigger_manual_refresh, BrandRow, ManualRefresh, RefreshStatus,
};
pub use review_sources::{
    count_active_sources, create_review_source, delete_review_source,
    find_sources_ready_for_sync, get_review_source, list_brand_sources, record_sync_outcome,
    update_review_source, NewReviewSource, ReviewSourceRow, ReviewSourceUpdate,
};
pub use reviews::{
    find_unlabelled_duplicate, get_review, get_review_for_brand, insert_review_if_new, NewReview,
    ReviewRow,
};
pub use sentiment::{
    apply_ai_sentiment, correct_sentiment, sentiment_accuracy, sentiment_history,
    SentimentAccuracy, SentimentChangeRow, SentimentCorrection,
};
pub use users::{create_user, get_user, UserRow};
