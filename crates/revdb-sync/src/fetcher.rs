//! The seam between the sync pipeline and external review platforms.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use revdb_core::Sentiment;
use revdb_db::{NewReview, ReviewSourceRow};

use crate::error::FetchError;

/// One review as returned by a platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedReview {
    pub external_review_id: Option<String>,
    pub author_name: Option<String>,
    pub rating: Option<i16>,
    pub content: String,
    pub published_at: Option<DateTime<Utc>>,
    /// Machine-assigned label, when the platform or classifier provides one.
    pub sentiment: Option<Sentiment>,
}

impl FetchedReview {
    #[must_use]
    pub fn as_new_review(&self) -> NewReview<'_> {
        NewReview {
            external_review_id: self.external_review_id.as_deref(),
            author_name: self.author_name.as_deref(),
            rating: self.rating,
            content: &self.content,
            published_at: self.published_at,
        }
    }
}

/// Retrieves the current reviews of one source.
#[async_trait]
pub trait ReviewFetcher: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    async fn fetch(&self, source: &ReviewSourceRow) -> Result<Vec<FetchedReview>, FetchError>;
}

/// Fetcher that never returns reviews. Sources still cycle through their
/// schedule and record successful syncs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFetcher;

#[async_trait]
impl ReviewFetcher for NoopFetcher {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn fetch(&self, source: &ReviewSourceRow) -> Result<Vec<FetchedReview>, FetchError> {
        tracing::debug!(source_id = source.id, "noop fetcher: nothing to fetch");
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> ReviewSourceRow {
        let now = Utc::now();
        ReviewSourceRow {
            id: 11,
            brand_id: 2,
            platform_type: "google".to_string(),
            external_profile_id: "place".to_string(),
            profile_url: "https://maps.example.com/place".to_string(),
            auth_method: "api".to_string(),
            is_active: true,
            last_sync_at: None,
            last_sync_status: None,
            last_sync_error: None,
            next_scheduled_sync_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn noop_fetcher_returns_nothing() {
        let reviews = NoopFetcher.fetch(&source()).await.expect("noop never fails");
        assert!(reviews.is_empty());
    }

    #[test]
    fn fetched_review_borrows_into_insert_shape() {
        let fetched = FetchedReview {
            external_review_id: Some("r-1".to_string()),
            author_name: None,
            rating: Some(2),
            content: "Cold food".to_string(),
            published_at: None,
            sentiment: Some(Sentiment::Negative),
        };
        let new = fetched.as_new_review();
        assert_eq!(new.external_review_id, Some("r-1"));
        assert_eq!(new.rating, Some(2));
        assert_eq!(new.content, "Cold food");
    }
}
