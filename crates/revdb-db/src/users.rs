//! Database operations for the `users` table.

use chrono::{DateTime, Utc};
use revdb_core::{ActivityType, PlanType};
use sqlx::PgPool;
use uuid::Uuid;

use crate::activity::{insert_entry, NewActivityEntry};
use crate::{sqlstate, DbError};

/// A row from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub plan_type: String,
    pub max_sources_allowed: i32,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Creates a user on `plan_type` with that plan's default source limit and
/// records the `registration` ledger entry at `registered_at`, atomically.
///
/// # Errors
///
/// Returns [`DbError::Validation`] if the email is blank or already taken by
/// a live account, or [`DbError::Sqlx`] if the insert fails.
pub async fn create_user(
    pool: &PgPool,
    email: &str,
    plan_type: PlanType,
    registered_at: DateTime<Utc>,
) -> Result<UserRow, DbError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(DbError::Validation("email must not be blank".to_string()));
    }
    let max_sources = i32::try_from(plan_type.default_max_sources()).unwrap_or(i32::MAX);

    let mut tx = pool.begin().await?;

    let user = sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (email, plan_type, max_sources_allowed) \
         VALUES ($1, $2, $3) \
         RETURNING id, email, plan_type, max_sources_allowed, created_at, deleted_at",
    )
    .bind(email)
    .bind(plan_type.as_str())
    .bind(max_sources)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if sqlstate(&e).as_deref() == Some("23505") {
            DbError::Validation(format!("email '{email}' is already registered"))
        } else {
            DbError::from(e)
        }
    })?;

    insert_entry(
        &mut *tx,
        &NewActivityEntry::new(user.id, ActivityType::Registration, registered_at),
    )
    .await?;

    tx.commit().await?;
    tracing::info!(user_id = %user.id, plan = %plan_type, "user registered");
    Ok(user)
}

/// Returns a live user by id, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user(pool: &PgPool, user_id: Uuid) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, email, plan_type, max_sources_allowed, created_at, deleted_at \
         FROM users \
         WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
