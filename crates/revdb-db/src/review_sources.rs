//! Review-source lifecycle: quota-guarded creation, edits, soft delete and
//! the sync bookkeeping written back by the sweep.

use chrono::{DateTime, Utc};
use revdb_core::{
    admit_source, ActivityType, AuthMethod, CoreError, CreateRejection, PlatformType, SourceKey,
    SyncOutcome, SyncStatus, SyncWindow,
};
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::activity::{insert_entry, NewActivityEntry};
use crate::brands::lock_brand;
use crate::{sqlstate, DbError};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `active_review_sources` view.
///
/// The encrypted credential blob is never selected.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReviewSourceRow {
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

impl ReviewSourceRow {
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownVariant`] if the stored value is not a known platform.
    pub fn platform(&self) -> Result<PlatformType, CoreError> {
        self.platform_type.parse()
    }

    /// # Errors
    ///
    /// Returns [`CoreError::UnknownVariant`] if the stored value is not a known auth method.
    pub fn auth(&self) -> Result<AuthMethod, CoreError> {
        self.auth_method.parse()
    }

    /// # Errors
    ///
    /// Returns [`CoreError::UnknownVariant`] if the stored value is not a known status.
    pub fn sync_status(&self) -> Result<Option<SyncStatus>, CoreError> {
        self.last_sync_status.as_deref().map(str::parse).transpose()
    }

    /// # Errors
    ///
    /// Returns [`CoreError::UnknownVariant`] if the stored platform is not known.
    pub fn key(&self) -> Result<SourceKey, CoreError> {
        Ok(SourceKey::new(
            self.brand_id,
            self.platform()?,
            &self.external_profile_id,
        ))
    }
}

pub(crate) const SOURCE_COLUMNS: &str =
    "id, brand_id, platform_type, external_profile_id, profile_url, auth_method, is_active, \
     last_sync_at, last_sync_status, last_sync_error, next_scheduled_sync_at, \
     created_at, updated_at";

/// Input for [`create_review_source`].
#[derive(Debug, Clone, Copy)]
pub struct NewReviewSource<'a> {
    pub platform_type: PlatformType,
    pub external_profile_id: &'a str,
    pub profile_url: &'a str,
    pub auth_method: AuthMethod,
    pub encrypted_credentials: Option<&'a [u8]>,
}

/// Sparse edit for [`update_review_source`]; `None` keeps the stored value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewSourceUpdate<'a> {
    pub is_active: Option<bool>,
    pub profile_url: Option<&'a str>,
}

impl ReviewSourceUpdate<'_> {
    fn is_empty(&self) -> bool {
        self.is_active.is_none() && self.profile_url.is_none()
    }
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct ExistingKeyRow {
    platform_type: String,
    external_profile_id: String,
}

/// Creates a review source for a brand, enforcing the owner's plan quota and
/// the duplicate-source rule.
///
/// Runs in one transaction holding the brand's row lock:
///
/// 1. count the brand's active sources and reject with
///    [`DbError::QuotaExceeded`] if the owner's limit is reached;
/// 2. reject with [`DbError::DuplicateSource`] if an active source already
///    has the same (platform, external profile id);
/// 3. insert with `is_active = true` and the first sync slot after `now`;
/// 4. record `source_added`, then `first_source_configured_successfully` if
///    the brand had no active source and has never recorded that event.
///
/// # Errors
///
/// Returns the rejections above, [`DbError::Validation`] for a blank
/// profile id or URL, [`DbError::NotFound`] if the brand is not live,
/// [`DbError::Conflict`] on lock contention, or [`DbError::Sqlx`].
pub async fn create_review_source(
    pool: &PgPool,
    brand_id: i64,
    actor: Uuid,
    source: &NewReviewSource<'_>,
    window: &SyncWindow,
    now: DateTime<Utc>,
) -> Result<ReviewSourceRow, DbError> {
    let candidate = SourceKey::new(brand_id, source.platform_type, source.external_profile_id);
    if candidate.external_profile_id.is_empty() {
        return Err(DbError::Validation(
            "external_profile_id must not be blank".to_string(),
        ));
    }
    let profile_url = source.profile_url.trim();
    if profile_url.is_empty() {
        return Err(DbError::Validation("profile_url must not be blank".to_string()));
    }

    let mut tx = pool.begin().await?;
    let brand = lock_brand(&mut *tx, brand_id).await?;
    let limit = brand.plan_limit()?;

    let existing = sqlx::query_as::<_, ExistingKeyRow>(
        "SELECT platform_type, external_profile_id \
         FROM active_review_sources \
         WHERE brand_id = $1",
    )
    .bind(brand_id)
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .map(|row| -> Result<SourceKey, DbError> {
        Ok(SourceKey::new(
            brand_id,
            row.platform_type.parse()?,
            &row.external_profile_id,
        ))
    })
    .collect::<Result<Vec<_>, _>>()?;

    let admission = admit_source(limit, &existing, &candidate).map_err(|rejection| {
        match rejection {
            CreateRejection::QuotaExceeded(details) => {
                tracing::warn!(
                    brand_id,
                    current = details.current_count,
                    max = details.max_allowed,
                    "review source rejected: quota exceeded"
                );
                DbError::QuotaExceeded(details)
            }
            CreateRejection::Duplicate(key) => {
                tracing::warn!(brand_id, key = %key, "review source rejected: duplicate");
                DbError::DuplicateSource { key }
            }
        }
    })?;

    let next_sync = window.next_after(now);
    let row = sqlx::query_as::<_, ReviewSourceRow>(&format!(
        "INSERT INTO review_sources \
           (brand_id, platform_type, external_profile_id, profile_url, auth_method, \
            encrypted_credentials, is_active, next_scheduled_sync_at) \
         VALUES ($1, $2, $3, $4, $5, $6, true, $7) \
         RETURNING {SOURCE_COLUMNS}"
    ))
    .bind(brand_id)
    .bind(candidate.platform_type.as_str())
    .bind(&candidate.external_profile_id)
    .bind(profile_url)
    .bind(source.auth_method.as_str())
    .bind(source.encrypted_credentials)
    .bind(next_sync)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        // The brand lock already serializes creates; a unique violation here
        // means something wrote around it.
        if sqlstate(&e).as_deref() == Some("23505") {
            DbError::Conflict
        } else {
            DbError::from(e)
        }
    })?;

    insert_entry(
        &mut *tx,
        &NewActivityEntry::new(actor, ActivityType::SourceAdded, now)
            .with_brand(brand_id)
            .with_metadata(source_metadata(&row)),
    )
    .await?;

    let mut first_recorded = false;
    if admission.is_first_source {
        first_recorded = insert_entry(
            &mut *tx,
            &NewActivityEntry::new(actor, ActivityType::FirstSourceConfiguredSuccessfully, now)
                .with_brand(brand_id)
                .with_metadata(source_metadata(&row)),
        )
        .await?
        .is_some();
    }

    tx.commit().await?;
    tracing::info!(
        brand_id,
        source_id = row.id,
        platform = %candidate.platform_type,
        first_source = first_recorded,
        next_sync = %next_sync,
        "review source created"
    );

    Ok(row)
}

fn source_metadata(row: &ReviewSourceRow) -> serde_json::Value {
    json!({
        "source_id": row.id,
        "platform_type": row.platform_type,
        "external_profile_id": row.external_profile_id,
    })
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Resolve a visible source and check it belongs to `brand_id`.
async fn owned_source(
    conn: &mut PgConnection,
    brand_id: i64,
    source_id: i64,
) -> Result<ReviewSourceRow, DbError> {
    let row = sqlx::query_as::<_, ReviewSourceRow>(&format!(
        "SELECT {SOURCE_COLUMNS} FROM active_review_sources WHERE id = $1"
    ))
    .bind(source_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(DbError::NotFound)?;

    if row.brand_id != brand_id {
        return Err(DbError::AccessDenied);
    }
    Ok(row)
}

/// Returns one of the brand's visible sources.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the source is missing or soft-deleted,
/// [`DbError::AccessDenied`] if it belongs to another brand, or
/// [`DbError::Sqlx`].
pub async fn get_review_source(
    pool: &PgPool,
    brand_id: i64,
    source_id: i64,
) -> Result<ReviewSourceRow, DbError> {
    let mut conn = pool.acquire().await?;
    owned_source(&mut *conn, brand_id, source_id).await
}

/// Returns the brand's visible sources, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_brand_sources(
    pool: &PgPool,
    brand_id: i64,
) -> Result<Vec<ReviewSourceRow>, DbError> {
    let rows = sqlx::query_as::<_, ReviewSourceRow>(&format!(
        "SELECT {SOURCE_COLUMNS} FROM active_review_sources \
         WHERE brand_id = $1 \
         ORDER BY created_at, id"
    ))
    .bind(brand_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Number of visible sources the brand holds; this is what the quota counts.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_active_sources(pool: &PgPool, brand_id: i64) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM active_review_sources WHERE brand_id = $1",
    )
    .bind(brand_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Sources whose scheduled slot has arrived: active, visible, and
/// `next_scheduled_sync_at <= now`, most overdue first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_sources_ready_for_sync(
    pool: &PgPool,
    now: DateTime<Utc>,
) -> Result<Vec<ReviewSourceRow>, DbError> {
    let rows = sqlx::query_as::<_, ReviewSourceRow>(&format!(
        "SELECT {SOURCE_COLUMNS} FROM active_review_sources \
         WHERE is_active AND next_scheduled_sync_at <= $1 \
         ORDER BY next_scheduled_sync_at, id"
    ))
    .bind(now)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Applies a sparse edit (activation toggle, profile URL) and records
/// `source_configured`.
///
/// # Errors
///
/// Returns [`DbError::Validation`] for an empty edit or a blank URL,
/// [`DbError::NotFound`] / [`DbError::AccessDenied`] as for
/// [`get_review_source`], or [`DbError::Sqlx`].
pub async fn update_review_source(
    pool: &PgPool,
    brand_id: i64,
    actor: Uuid,
    source_id: i64,
    update: &ReviewSourceUpdate<'_>,
    now: DateTime<Utc>,
) -> Result<ReviewSourceRow, DbError> {
    if update.is_empty() {
        return Err(DbError::Validation("no fields to update".to_string()));
    }
    let profile_url = update.profile_url.map(str::trim);
    if profile_url.is_some_and(str::is_empty) {
        return Err(DbError::Validation("profile_url must not be blank".to_string()));
    }

    let mut tx = pool.begin().await?;
    owned_source(&mut *tx, brand_id, source_id).await?;

    let row = sqlx::query_as::<_, ReviewSourceRow>(&format!(
        "UPDATE review_sources \
         SET is_active = COALESCE($2, is_active), \
             profile_url = COALESCE($3, profile_url), \
             updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL \
         RETURNING {SOURCE_COLUMNS}"
    ))
    .bind(source_id)
    .bind(update.is_active)
    .bind(profile_url)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(DbError::NotFound)?;

    insert_entry(
        &mut *tx,
        &NewActivityEntry::new(actor, ActivityType::SourceConfigured, now)
            .with_brand(brand_id)
            .with_metadata(json!({
                "source_id": source_id,
                "is_active": update.is_active,
                "profile_url_changed": profile_url.is_some(),
            })),
    )
    .await?;

    tx.commit().await?;
    tracing::info!(brand_id, source_id, is_active = row.is_active, "review source updated");
    Ok(row)
}

/// Soft-deletes a source, freeing its quota slot and duplicate key, and
/// records `source_deleted`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] / [`DbError::AccessDenied`] as for
/// [`get_review_source`], [`DbError::Conflict`] on lock contention, or
/// [`DbError::Sqlx`].
pub async fn delete_review_source(
    pool: &PgPool,
    brand_id: i64,
    actor: Uuid,
    source_id: i64,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;
    lock_brand(&mut *tx, brand_id).await?;
    let row = owned_source(&mut *tx, brand_id, source_id).await?;

    sqlx::query(
        "UPDATE review_sources \
         SET deleted_at = NOW(), updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(source_id)
    .execute(&mut *tx)
    .await?;

    insert_entry(
        &mut *tx,
        &NewActivityEntry::new(actor, ActivityType::SourceDeleted, now)
            .with_brand(brand_id)
            .with_metadata(source_metadata(&row)),
    )
    .await?;

    tx.commit().await?;
    tracing::info!(brand_id, source_id, "review source soft-deleted");
    Ok(())
}

/// Writes the result of a sync attempt onto the source.
///
/// Overwrites `last_sync_at`, status and error (cleared on success) and
/// moves `next_scheduled_sync_at` to the first window slot after `now`.
/// Repeating the call with the same arguments leaves the same state.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the source (or its brand) has been
/// deleted in the meantime, or [`DbError::Sqlx`].
pub async fn record_sync_outcome(
    pool: &PgPool,
    source_id: i64,
    outcome: &SyncOutcome,
    window: &SyncWindow,
    now: DateTime<Utc>,
) -> Result<ReviewSourceRow, DbError> {
    let next_sync = window.next_after(now);

    let row = sqlx::query_as::<_, ReviewSourceRow>(&format!(
        "UPDATE review_sources \
         SET last_sync_at = $2, \
             last_sync_status = $3, \
             last_sync_error = $4, \
             next_scheduled_sync_at = $5, \
             updated_at = $2 \
         WHERE id = $1 \
           AND id IN (SELECT id FROM active_review_sources) \
         RETURNING {SOURCE_COLUMNS}"
    ))
    .bind(source_id)
    .bind(now)
    .bind(outcome.status().as_str())
    .bind(outcome.error_message())
    .bind(next_sync)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    match outcome {
        SyncOutcome::Success => {
            tracing::info!(source_id, next_sync = %next_sync, "sync outcome recorded");
        }
        SyncOutcome::Failed { error } => {
            tracing::warn!(source_id, error = %error, next_sync = %next_sync, "sync failed");
        }
    }
    Ok(row)
}
