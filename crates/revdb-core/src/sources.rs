//! Review-source vocabulary: platforms, auth methods, plans and sync outcomes.

text_enum! {
    /// External platform a review source is pulled from.
    pub enum PlatformType as "platform type" {
        Google => "google",
        Facebook => "facebook",
        Trustpilot => "trustpilot",
    }
}

text_enum! {
    /// How reviews are retrieved for a source.
    pub enum AuthMethod as "auth method" {
        Api => "api",
        Scraping => "scraping",
    }
}

text_enum! {
    /// Result of the most recent sync attempt, as stored on the source row.
    pub enum SyncStatus as "sync status" {
        Success => "success",
        Failed => "failed",
    }
}

text_enum! {
    /// Subscription tier of a brand owner.
    pub enum PlanType as "plan type" {
        Free => "free",
        Starter => "starter",
        Professional => "professional",
    }
}

impl PlanType {
    /// Number of active review sources a fresh account on this plan may hold.
    ///
    /// The per-user `max_sources_allowed` column starts from this value and
    /// can be raised individually; quota checks always read the column.
    #[must_use]
    pub const fn default_max_sources(self) -> i64 {
        match self {
            PlanType::Free => 1,
            PlanType::Starter => 3,
            PlanType::Professional => 10,
        }
    }
}

/// Outcome reported by the sync pipeline for one source.
///
/// An error message only exists on failure, so a successful outcome can never
/// carry (or leave behind) a stale error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Success,
    Failed { error: String },
}

impl SyncOutcome {
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        SyncOutcome::Failed {
            error: error.into(),
        }
    }

    #[must_use]
    pub fn status(&self) -> SyncStatus {
        match self {
            SyncOutcome::Success => SyncStatus::Success,
            SyncOutcome::Failed { .. } => SyncStatus::Failed,
        }
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            SyncOutcome::Success => None,
            SyncOutcome::Failed { error } => Some(error.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_type_round_trips_through_text() {
        for platform in PlatformType::ALL {
            assert_eq!(platform.as_str().parse::<PlatformType>(), Ok(*platform));
        }
    }

    #[test]
    fn unknown_platform_is_rejected() {
        let err = "yelp".parse::<PlatformType>().unwrap_err();
        assert_eq!(
            err,
            crate::CoreError::UnknownVariant {
                kind: "platform type",
                value: "yelp".to_string(),
            }
        );
    }

    #[test]
    fn platform_serializes_as_lowercase() {
        let json = serde_json::to_string(&PlatformType::Trustpilot).expect("serialize");
        assert_eq!(json, "\"trustpilot\"");
    }

    #[test]
    fn plan_defaults_increase_with_tier() {
        assert_eq!(PlanType::Free.default_max_sources(), 1);
        assert!(PlanType::Starter.default_max_sources() > PlanType::Free.default_max_sources());
        assert!(
            PlanType::Professional.default_max_sources()
                > PlanType::Starter.default_max_sources()
        );
    }

    #[test]
    fn success_outcome_has_no_error() {
        let outcome = SyncOutcome::Success;
        assert_eq!(outcome.status(), SyncStatus::Success);
        assert!(outcome.error_message().is_none());
    }

    #[test]
    fn failed_outcome_exposes_error() {
        let outcome = SyncOutcome::failed("HTTP 503 from platform");
        assert_eq!(outcome.status(), SyncStatus::Failed);
        assert_eq!(outcome.error_message(), Some("HTTP 503 from platform"));
    }
}
