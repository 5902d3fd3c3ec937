//! Append-only activity ledger.
//!
//! Entries are built as [`NewActivityEntry`] values and consumed by an insert;
//! nothing in this crate updates or deletes an `activity_log` row, and a
//! trigger rejects it at the storage level.

use chrono::{DateTime, Utc};
use revdb_core::{ActivityType, LedgerEvent, UserTimeline};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{sqlstate, violated_constraint, DbError};

const MAX_PAGE_SIZE: i64 = 100;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `activity_log` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivityRow {
    pub id: i64,
    pub user_id: Uuid,
    pub brand_id: Option<i64>,
    pub activity_type: String,
    pub metadata: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

/// A ledger entry waiting to be written.
#[derive(Debug, Clone)]
pub struct NewActivityEntry {
    user_id: Uuid,
    brand_id: Option<i64>,
    activity_type: ActivityType,
    metadata: serde_json::Value,
    occurred_at: DateTime<Utc>,
}

impl NewActivityEntry {
    #[must_use]
    pub fn new(user_id: Uuid, activity_type: ActivityType, occurred_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            brand_id: None,
            activity_type,
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            occurred_at,
        }
    }

    #[must_use]
    pub fn with_brand(mut self, brand_id: i64) -> Self {
        self.brand_id = Some(brand_id);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn activity_type(&self) -> ActivityType {
        self.activity_type
    }
}

/// One page of a user's ledger, newest first.
#[derive(Debug, Clone)]
pub struct ActivityPage {
    pub entries: Vec<ActivityRow>,
    pub total: i64,
    pub page: i64,
    pub size: i64,
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Insert one entry on an existing connection or transaction.
///
/// Returns `None` when the entry collides with the once-per-brand
/// `first_source_configured_successfully` index; every other entry type is
/// always written.
pub(crate) async fn insert_entry(
    conn: &mut PgConnection,
    entry: &NewActivityEntry,
) -> Result<Option<ActivityRow>, DbError> {
    if !entry.metadata.is_object() {
        return Err(DbError::Validation(
            "activity metadata must be a JSON object".to_string(),
        ));
    }

    sqlx::query_as::<_, ActivityRow>(
        "INSERT INTO activity_log (user_id, brand_id, activity_type, metadata, occurred_at) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT DO NOTHING \
         RETURNING id, user_id, brand_id, activity_type, metadata, occurred_at, recorded_at",
    )
    .bind(entry.user_id)
    .bind(entry.brand_id)
    .bind(entry.activity_type.as_str())
    .bind(&entry.metadata)
    .bind(entry.occurred_at)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| map_foreign_key(e, entry))
}

fn map_foreign_key(error: sqlx::Error, entry: &NewActivityEntry) -> DbError {
    if sqlstate(&error).as_deref() == Some("23503") {
        return match violated_constraint(&error) {
            Some("activity_log_brand_id_fkey") => {
                DbError::Validation(format!("unknown brand {}", entry.brand_id.unwrap_or_default()))
            }
            _ => DbError::UnknownUser(entry.user_id),
        };
    }
    DbError::from(error)
}

/// Append one entry to the ledger.
///
/// # Errors
///
/// Returns [`DbError::UnknownUser`] if the user does not exist,
/// [`DbError::Validation`] for non-object metadata, an unknown brand, or a
/// second first-source event for the same brand, or [`DbError::Sqlx`] on
/// query failure.
pub async fn log_activity(pool: &PgPool, entry: &NewActivityEntry) -> Result<ActivityRow, DbError> {
    let mut conn = pool.acquire().await?;
    let row = insert_entry(&mut *conn, entry).await?;
    row.ok_or_else(|| {
        DbError::Validation(format!(
            "brand already recorded a {} event",
            entry.activity_type
        ))
    })
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Returns one page (1-based) of a user's ledger, newest first, plus the total.
///
/// # Errors
///
/// Returns [`DbError::Validation`] if `page < 1` or `size` is outside
/// `1..=100`, or [`DbError::Sqlx`] if the query fails.
pub async fn list_activity(
    pool: &PgPool,
    user_id: Uuid,
    page: i64,
    size: i64,
) -> Result<ActivityPage, DbError> {
    if page < 1 {
        return Err(DbError::Validation("page must be at least 1".to_string()));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&size) {
        return Err(DbError::Validation(format!(
            "size must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }

    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM activity_log WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    let entries = sqlx::query_as::<_, ActivityRow>(
        "SELECT id, user_id, brand_id, activity_type, metadata, occurred_at, recorded_at \
         FROM activity_log \
         WHERE user_id = $1 \
         ORDER BY occurred_at DESC, id DESC \
         LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(size)
    .bind((page - 1).saturating_mul(size))
    .fetch_all(pool)
    .await?;

    Ok(ActivityPage {
        entries,
        total,
        page,
        size,
    })
}

#[derive(sqlx::FromRow)]
struct LedgerEventRow {
    activity_type: String,
    occurred_at: DateTime<Utc>,
}

/// Load the ledger events the success metrics are derived from.
///
/// A user with no entries (or no such user) yields an empty timeline.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::Core`] if a
/// stored activity type is not recognised.
pub async fn load_user_timeline(pool: &PgPool, user_id: Uuid) -> Result<UserTimeline, DbError> {
    let relevant: Vec<&str> = [
        ActivityType::Registration,
        ActivityType::Login,
        ActivityType::FirstSourceConfiguredSuccessfully,
    ]
    .iter()
    .map(|t| t.as_str())
    .collect();

    let rows = sqlx::query_as::<_, LedgerEventRow>(
        "SELECT activity_type, occurred_at \
         FROM activity_log \
         WHERE user_id = $1 AND activity_type = ANY($2) \
         ORDER BY occurred_at, id",
    )
    .bind(user_id)
    .bind(relevant)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| -> Result<LedgerEvent, DbError> {
            Ok(LedgerEvent {
                activity_type: row.activity_type.parse::<ActivityType>()?,
                occurred_at: row.occurred_at,
            })
        })
        .collect()
}
