//! Sentiment audit trail.
//!
//! A review's current sentiment and its `sentiment_changes` history are only
//! ever written together, in one transaction holding the review's row lock.
//! Setting a sentiment to the value it already has is a no-op: no history
//! row, no timestamp change.

use chrono::{DateTime, Utc};
use revdb_core::{ActivityType, ChangeReason, Sentiment};
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::activity::{insert_entry, NewActivityEntry};
use crate::reviews::get_review_for_brand;
use crate::{DbError, LOCK_TIMEOUT};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `sentiment_changes` table. Read-only.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SentimentChangeRow {
    pub id: i64,
    pub review_id: i64,
    pub old_sentiment: Option<String>,
    pub new_sentiment: String,
    pub reason: String,
    pub changed_by_user_id: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
}

/// What a sentiment write did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentCorrection {
    /// A history row was appended; `previous` is the value it replaced.
    Updated { previous: Option<Sentiment> },
    /// The review already had the requested value.
    Unchanged,
}

/// Per-brand counts behind the classifier accuracy figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct SentimentAccuracy {
    /// Reviews that received an initial machine sentiment.
    pub ai_assigned: i64,
    /// Reviews a person corrected at least once.
    pub human_corrected: i64,
}

impl SentimentAccuracy {
    /// Share of machine-labelled reviews nobody had to correct, or `None`
    /// before anything was labelled.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // review counts stay far below 2^52
    pub fn accuracy(&self) -> Option<f64> {
        if self.ai_assigned == 0 {
            return None;
        }
        let corrected = self.human_corrected.min(self.ai_assigned);
        Some(1.0 - corrected as f64 / self.ai_assigned as f64)
    }
}

/// One history row waiting to be appended.
struct NewSentimentChange {
    review_id: i64,
    old_sentiment: Option<Sentiment>,
    new_sentiment: Sentiment,
    reason: ChangeReason,
    changed_by_user_id: Option<Uuid>,
    changed_at: DateTime<Utc>,
}

async fn append_change(conn: &mut PgConnection, change: NewSentimentChange) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO sentiment_changes \
           (review_id, old_sentiment, new_sentiment, reason, changed_by_user_id, changed_at) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(change.review_id)
    .bind(change.old_sentiment.map(Sentiment::as_str))
    .bind(change.new_sentiment.as_str())
    .bind(change.reason.as_str())
    .bind(change.changed_by_user_id)
    .bind(change.changed_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct LockedReview {
    sentiment: Option<String>,
    brand_id: i64,
}

/// Lock a visible review and read its current sentiment and brand.
async fn lock_review(conn: &mut PgConnection, review_id: i64) -> Result<LockedReview, DbError> {
    sqlx::query(LOCK_TIMEOUT).execute(&mut *conn).await?;

    sqlx::query_as::<_, LockedReview>(
        "SELECT r.sentiment, a.brand_id \
         FROM reviews r \
         JOIN active_reviews a ON a.id = r.id \
         WHERE r.id = $1 \
         FOR UPDATE OF r",
    )
    .bind(review_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(DbError::NotFound)
}

/// Shared write path. The caller owns the transaction and commits.
async fn transition(
    conn: &mut PgConnection,
    review: &LockedReview,
    change: NewSentimentChange,
) -> Result<SentimentCorrection, DbError> {
    let current = review
        .sentiment
        .as_deref()
        .map(str::parse::<Sentiment>)
        .transpose()?;

    if current == Some(change.new_sentiment) {
        return Ok(SentimentCorrection::Unchanged);
    }

    let review_id = change.review_id;
    let new_sentiment = change.new_sentiment;
    append_change(
        &mut *conn,
        NewSentimentChange {
            old_sentiment: current,
            ..change
        },
    )
    .await?;

    sqlx::query("UPDATE reviews SET sentiment = $2, updated_at = NOW() WHERE id = $1")
        .bind(review_id)
        .bind(new_sentiment.as_str())
        .execute(&mut *conn)
        .await?;

    Ok(SentimentCorrection::Updated { previous: current })
}

/// A person sets a review's sentiment.
///
/// Appends a `user_correction` history row naming `actor` and a
/// `sentiment_corrected` ledger entry, unless the review already has
/// `new_sentiment`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the review is missing or hidden,
/// [`DbError::AccessDenied`] if it belongs to another brand,
/// [`DbError::Conflict`] on lock contention, or [`DbError::Sqlx`]. On any
/// error nothing is written.
pub async fn correct_sentiment(
    pool: &PgPool,
    brand_id: i64,
    actor: Uuid,
    review_id: i64,
    new_sentiment: Sentiment,
    now: DateTime<Utc>,
) -> Result<SentimentCorrection, DbError> {
    let mut tx = pool.begin().await?;
    let review = lock_review(&mut *tx, review_id).await?;
    if review.brand_id != brand_id {
        return Err(DbError::AccessDenied);
    }

    let outcome = transition(
        &mut *tx,
        &review,
        NewSentimentChange {
            review_id,
            old_sentiment: None,
            new_sentiment,
            reason: ChangeReason::UserCorrection,
            changed_by_user_id: Some(actor),
            changed_at: now,
        },
    )
    .await?;

    let SentimentCorrection::Updated { previous } = outcome else {
        tracing::debug!(review_id, sentiment = %new_sentiment, "sentiment unchanged");
        return Ok(outcome);
    };

    insert_entry(
        &mut *tx,
        &NewActivityEntry::new(actor, ActivityType::SentimentCorrected, now)
            .with_brand(brand_id)
            .with_metadata(json!({
                "review_id": review_id,
                "old_sentiment": previous,
                "new_sentiment": new_sentiment,
            })),
    )
    .await?;

    tx.commit().await?;
    tracing::info!(
        review_id,
        brand_id,
        from = ?previous,
        to = %new_sentiment,
        "sentiment corrected"
    );
    Ok(outcome)
}

/// The classifier sets a review's sentiment, with no human actor.
///
/// # Errors
///
/// Returns [`DbError::Validation`] if `reason` is `user_correction`,
/// [`DbError::NotFound`] if the review is missing or hidden,
/// [`DbError::Conflict`] on lock contention, or [`DbError::Sqlx`].
pub async fn apply_ai_sentiment(
    pool: &PgPool,
    review_id: i64,
    sentiment: Sentiment,
    reason: ChangeReason,
    now: DateTime<Utc>,
) -> Result<SentimentCorrection, DbError> {
    if !reason.is_machine() {
        return Err(DbError::Validation(format!(
            "{reason} requires a human actor; use correct_sentiment"
        )));
    }

    let mut tx = pool.begin().await?;
    let review = lock_review(&mut *tx, review_id).await?;

    let outcome = transition(
        &mut *tx,
        &review,
        NewSentimentChange {
            review_id,
            old_sentiment: None,
            new_sentiment: sentiment,
            reason,
            changed_by_user_id: None,
            changed_at: now,
        },
    )
    .await?;

    tx.commit().await?;
    if let SentimentCorrection::Updated { previous } = outcome {
        tracing::debug!(review_id, from = ?previous, to = %sentiment, reason = %reason, "machine sentiment applied");
    }
    Ok(outcome)
}

/// Full history of a brand's review, newest first.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] / [`DbError::AccessDenied`] as for
/// [`get_review_for_brand`], or [`DbError::Sqlx`].
pub async fn sentiment_history(
    pool: &PgPool,
    brand_id: i64,
    review_id: i64,
) -> Result<Vec<SentimentChangeRow>, DbError> {
    get_review_for_brand(pool, brand_id, review_id).await?;

    let rows = sqlx::query_as::<_, SentimentChangeRow>(
        "SELECT id, review_id, old_sentiment, new_sentiment, reason, changed_by_user_id, changed_at \
         FROM sentiment_changes \
         WHERE review_id = $1 \
         ORDER BY changed_at DESC, id DESC",
    )
    .bind(review_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Counts machine-labelled and human-corrected reviews among the brand's
/// visible reviews.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn sentiment_accuracy(pool: &PgPool, brand_id: i64) -> Result<SentimentAccuracy, DbError> {
    let row = sqlx::query_as::<_, SentimentAccuracy>(
        "SELECT \
           COUNT(DISTINCT c.review_id) FILTER (WHERE c.reason = 'ai_initial') AS ai_assigned, \
           COUNT(DISTINCT c.review_id) FILTER (WHERE c.reason = 'user_correction') AS human_corrected \
         FROM sentiment_changes c \
         JOIN active_reviews r ON r.id = c.review_id \
         WHERE r.brand_id = $1",
    )
    .bind(brand_id)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_is_none_without_machine_labels() {
        let acc = SentimentAccuracy {
            ai_assigned: 0,
            human_corrected: 0,
        };
        assert_eq!(acc.accuracy(), None);
    }

    #[test]
    fn accuracy_reflects_corrected_share() {
        let acc = SentimentAccuracy {
            ai_assigned: 8,
            human_corrected: 2,
        };
        assert_eq!(acc.accuracy(), Some(0.75));
    }

    #[test]
    fn accuracy_never_goes_negative() {
        // Corrections on reviews that were never machine-labelled.
        let acc = SentimentAccuracy {
            ai_assigned: 1,
            human_corrected: 3,
        };
        assert_eq!(acc.accuracy(), Some(0.0));
    }
}
