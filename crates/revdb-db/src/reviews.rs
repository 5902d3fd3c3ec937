//! Database operations for the `reviews` table.

use chrono::{DateTime, Utc};
use revdb_core::{review_dedup_key, CoreError, Sentiment};
use sqlx::{PgConnection, PgPool};

use crate::DbError;

/// A row from the `active_reviews` view; `brand_id` comes from the source.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReviewRow {
    pub id: i64,
    pub review_source_id: i64,
    pub brand_id: i64,
    pub external_review_id: Option<String>,
    pub author_name: Option<String>,
    pub rating: Option<i16>,
    pub content: String,
    pub content_hash: String,
    pub sentiment: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewRow {
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownVariant`] if the stored value is not a known sentiment.
    pub fn current_sentiment(&self) -> Result<Option<Sentiment>, CoreError> {
        self.sentiment.as_deref().map(str::parse).transpose()
    }
}

const REVIEW_COLUMNS: &str =
    "id, review_source_id, brand_id, external_review_id, author_name, rating, content, \
     content_hash, sentiment, published_at, created_at, updated_at";

/// A review as delivered by a fetcher, before it has an id.
#[derive(Debug, Clone, Copy)]
pub struct NewReview<'a> {
    pub external_review_id: Option<&'a str>,
    pub author_name: Option<&'a str>,
    pub rating: Option<i16>,
    pub content: &'a str,
    pub published_at: Option<DateTime<Utc>>,
}

/// Inserts a review unless the source already holds one with the same
/// dedup key (external id when present, otherwise normalized author and
/// content).
///
/// Returns the new id, or `None` for a duplicate.
///
/// # Errors
///
/// Returns [`DbError::Validation`] if the rating is outside 1..=5, or
/// [`DbError::Sqlx`] if the insert fails.
pub async fn insert_review_if_new(
    pool: &PgPool,
    review_source_id: i64,
    review: &NewReview<'_>,
) -> Result<Option<i64>, DbError> {
    if review.rating.is_some_and(|r| !(1..=5).contains(&r)) {
        return Err(DbError::Validation(format!(
            "rating must be between 1 and 5, got {}",
            review.rating.unwrap_or_default()
        )));
    }

    let hash = review_dedup_key(
        review.external_review_id,
        review.author_name,
        review.content,
    );

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO reviews \
           (review_source_id, external_review_id, author_name, rating, content, \
            content_hash, published_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (review_source_id, content_hash) DO NOTHING \
         RETURNING id",
    )
    .bind(review_source_id)
    .bind(review.external_review_id)
    .bind(review.author_name)
    .bind(review.rating)
    .bind(review.content)
    .bind(&hash)
    .bind(review.published_at)
    .fetch_optional(pool)
    .await?;

    if id.is_none() {
        tracing::debug!(review_source_id, content_hash = %hash, "duplicate review skipped");
    }
    Ok(id)
}

/// Id of the stored duplicate of `review` when it still has no sentiment.
///
/// Lets a later sync finish labelling a review whose first labelling
/// attempt failed after the insert.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_unlabelled_duplicate(
    pool: &PgPool,
    review_source_id: i64,
    review: &NewReview<'_>,
) -> Result<Option<i64>, DbError> {
    let hash = review_dedup_key(
        review.external_review_id,
        review.author_name,
        review.content,
    );

    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM active_reviews \
         WHERE review_source_id = $1 AND content_hash = $2 AND sentiment IS NULL",
    )
    .bind(review_source_id)
    .bind(&hash)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

pub(crate) async fn fetch_review(
    conn: &mut PgConnection,
    review_id: i64,
) -> Result<Option<ReviewRow>, DbError> {
    let row = sqlx::query_as::<_, ReviewRow>(&format!(
        "SELECT {REVIEW_COLUMNS} FROM active_reviews WHERE id = $1"
    ))
    .bind(review_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row)
}

/// Returns a visible review by id, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_review(pool: &PgPool, review_id: i64) -> Result<Option<ReviewRow>, DbError> {
    let mut conn = pool.acquire().await?;
    fetch_review(&mut *conn, review_id).await
}

/// Returns a visible review that belongs to `brand_id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the review is missing or hidden,
/// [`DbError::AccessDenied`] if another brand owns it, or [`DbError::Sqlx`].
pub async fn get_review_for_brand(
    pool: &PgPool,
    brand_id: i64,
    review_id: i64,
) -> Result<ReviewRow, DbError> {
    let row = get_review(pool, review_id).await?.ok_or(DbError::NotFound)?;
    if row.brand_id != brand_id {
        return Err(DbError::AccessDenied);
    }
    Ok(row)
}
