//! Database operations for the `brands` table, including the manual-refresh
//! cooldown that lives on the brand row.

use chrono::{DateTime, TimeDelta, Utc};
use revdb_core::{ActivityType, PlanLimit, PlanType, RefreshCooldown};
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::activity::{insert_entry, NewActivityEntry};
use crate::review_sources::{ReviewSourceRow, SOURCE_COLUMNS};
use crate::{sqlstate, DbError, LOCK_TIMEOUT};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `active_brands` view.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BrandRow {
    pub id: i64,
    pub owner_user_id: Uuid,
    pub name: String,
    pub last_manual_refresh_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A live brand row held under `FOR UPDATE`, joined with its owner's plan.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct LockedBrand {
    pub owner_user_id: Uuid,
    pub last_manual_refresh_at: Option<DateTime<Utc>>,
    pub plan_type: String,
    pub max_sources_allowed: i32,
}

impl LockedBrand {
    pub fn plan_limit(&self) -> Result<PlanLimit, DbError> {
        Ok(PlanLimit {
            plan_type: self.plan_type.parse::<PlanType>()?,
            max_sources_allowed: i64::from(self.max_sources_allowed),
        })
    }
}

/// Result of an accepted manual refresh: the stamped brand and the sources
/// that should be synced right away.
#[derive(Debug, Clone)]
pub struct ManualRefresh {
    pub brand_id: i64,
    pub refreshed_at: DateTime<Utc>,
    pub sources: Vec<ReviewSourceRow>,
}

/// Cooldown state of a brand as shown on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshStatus {
    pub last_manual_refresh_at: Option<DateTime<Utc>>,
    pub can_refresh: bool,
    pub remaining: TimeDelta,
    pub next_allowed_at: Option<DateTime<Utc>>,
}

const BRAND_COLUMNS: &str =
    "id, owner_user_id, name, last_manual_refresh_at, created_at, updated_at";

// ---------------------------------------------------------------------------
// Locking
// ---------------------------------------------------------------------------

/// Take the brand's row lock for the rest of the transaction.
///
/// Every operation that reads-then-writes per-brand state (source count,
/// refresh stamp) goes through here first, so such operations on one brand
/// run one at a time.
pub(crate) async fn lock_brand(
    conn: &mut PgConnection,
    brand_id: i64,
) -> Result<LockedBrand, DbError> {
    sqlx::query(LOCK_TIMEOUT).execute(&mut *conn).await?;

    sqlx::query_as::<_, LockedBrand>(
        "SELECT b.owner_user_id, b.last_manual_refresh_at, \
                u.plan_type, u.max_sources_allowed \
         FROM active_brands b \
         JOIN users u ON u.id = b.owner_user_id \
         WHERE b.id = $1 \
         FOR UPDATE OF b",
    )
    .bind(brand_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(DbError::NotFound)
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Creates a brand owned by `owner_user_id`.
///
/// # Errors
///
/// Returns [`DbError::Validation`] if the name is blank or the owner already
/// has a live brand, [`DbError::UnknownUser`] if the owner does not exist, or
/// [`DbError::Sqlx`] if the insert fails.
pub async fn create_brand(
    pool: &PgPool,
    owner_user_id: Uuid,
    name: &str,
) -> Result<BrandRow, DbError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DbError::Validation("brand name must not be blank".to_string()));
    }

    let row = sqlx::query_as::<_, BrandRow>(&format!(
        "INSERT INTO brands (owner_user_id, name) VALUES ($1, $2) RETURNING {BRAND_COLUMNS}"
    ))
    .bind(owner_user_id)
    .bind(name)
    .fetch_one(pool)
    .await
    .map_err(|e| match sqlstate(&e).as_deref() {
        Some("23505") => DbError::Validation("user already owns a brand".to_string()),
        Some("23503") => DbError::UnknownUser(owner_user_id),
        _ => DbError::from(e),
    })?;

    tracing::info!(brand_id = row.id, owner = %owner_user_id, "brand created");
    Ok(row)
}

/// Returns a live brand by id, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_brand(pool: &PgPool, brand_id: i64) -> Result<Option<BrandRow>, DbError> {
    let row = sqlx::query_as::<_, BrandRow>(&format!(
        "SELECT {BRAND_COLUMNS} FROM active_brands WHERE id = $1"
    ))
    .bind(brand_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the live brand owned by a user, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_brand_for_owner(
    pool: &PgPool,
    owner_user_id: Uuid,
) -> Result<Option<BrandRow>, DbError> {
    let row = sqlx::query_as::<_, BrandRow>(&format!(
        "SELECT {BRAND_COLUMNS} FROM active_brands WHERE owner_user_id = $1"
    ))
    .bind(owner_user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Soft-deletes a brand. Its sources and reviews disappear from every
/// active view with it.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no live brand has that id, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn soft_delete_brand(pool: &PgPool, brand_id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE brands \
         SET deleted_at = NOW(), updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(brand_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    tracing::info!(brand_id, "brand soft-deleted");
    Ok(())
}

/// Starts a manual refresh for a brand if its cooldown has elapsed.
///
/// Under the brand lock: checks the cooldown against `now`, stamps
/// `last_manual_refresh_at = now`, records `manual_refresh_triggered`, and
/// returns the brand's active sources for an immediate sync.
///
/// # Errors
///
/// Returns [`DbError::CooldownActive`] with the remaining wait if refreshed
/// too recently, [`DbError::NotFound`] if the brand is not live,
/// [`DbError::Conflict`] on lock contention, or [`DbError::Sqlx`].
pub async fn trigger_manual_refresh(
    pool: &PgPool,
    brand_id: i64,
    actor: Uuid,
    cooldown: &RefreshCooldown,
    now: DateTime<Utc>,
) -> Result<ManualRefresh, DbError> {
    let mut tx = pool.begin().await?;
    let brand = lock_brand(&mut *tx, brand_id).await?;

    if !cooldown.can_refresh(brand.last_manual_refresh_at, now) {
        let remaining = cooldown.time_until_next_refresh(brand.last_manual_refresh_at, now);
        tracing::warn!(
            brand_id,
            remaining_secs = remaining.num_seconds(),
            "manual refresh rejected: cooldown active"
        );
        return Err(DbError::CooldownActive { remaining });
    }

    sqlx::query(
        "UPDATE brands \
         SET last_manual_refresh_at = $2, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(brand_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    insert_entry(
        &mut *tx,
        &NewActivityEntry::new(actor, ActivityType::ManualRefreshTriggered, now)
            .with_brand(brand_id)
            .with_metadata(json!({ "previous_refresh_at": brand.last_manual_refresh_at })),
    )
    .await?;

    let sources = sqlx::query_as::<_, ReviewSourceRow>(&format!(
        "SELECT {SOURCE_COLUMNS} FROM active_review_sources \
         WHERE brand_id = $1 AND is_active \
         ORDER BY id"
    ))
    .bind(brand_id)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!(
        brand_id,
        owner = %brand.owner_user_id,
        sources = sources.len(),
        "manual refresh triggered"
    );

    Ok(ManualRefresh {
        brand_id,
        refreshed_at: now,
        sources,
    })
}

/// Reads the brand's cooldown state without changing it.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the brand is not live, or [`DbError::Sqlx`].
pub async fn refresh_status(
    pool: &PgPool,
    brand_id: i64,
    cooldown: &RefreshCooldown,
    now: DateTime<Utc>,
) -> Result<RefreshStatus, DbError> {
    let brand = get_brand(pool, brand_id).await?.ok_or(DbError::NotFound)?;
    let last = brand.last_manual_refresh_at;

    Ok(RefreshStatus {
        last_manual_refresh_at: last,
        can_refresh: cooldown.can_refresh(last, now),
        remaining: cooldown.time_until_next_refresh(last, now),
        next_allowed_at: cooldown.next_allowed_at(last),
    })
}
