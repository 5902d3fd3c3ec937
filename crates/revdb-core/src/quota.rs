//! Admission rules for new review sources: plan quota first, then duplicates.

use serde::Serialize;

use crate::sources::{PlanType, PlatformType};

/// Compound identity of a review source within a brand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourceKey {
    pub brand_id: i64,
    pub platform_type: PlatformType,
    pub external_profile_id: String,
}

impl SourceKey {
    /// Builds a key, trimming the external id so that stray whitespace in
    /// client input does not defeat duplicate detection.
    #[must_use]
    pub fn new(brand_id: i64, platform_type: PlatformType, external_profile_id: &str) -> Self {
        Self {
            brand_id,
            platform_type,
            external_profile_id: external_profile_id.trim().to_string(),
        }
    }
}

impl std::fmt::Display for SourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "brand {} / {} / {}",
            self.brand_id, self.platform_type, self.external_profile_id
        )
    }
}

/// The source limit that applies to a brand, taken from its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimit {
    pub plan_type: PlanType,
    pub max_sources_allowed: i64,
}

/// Details returned to the client when the plan has no free slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaExceeded {
    pub current_count: i64,
    pub max_allowed: i64,
    pub plan_type: PlanType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateRejection {
    QuotaExceeded(QuotaExceeded),
    Duplicate(SourceKey),
}

/// Accepted candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// The brand had no active source before this one.
    pub is_first_source: bool,
}

/// Decide whether `candidate` may be added next to the brand's `existing`
/// active sources.
///
/// The quota is checked before duplicates: a brand at its limit gets
/// `QuotaExceeded` even for a key it already has.
///
/// # Errors
///
/// Returns [`CreateRejection::QuotaExceeded`] when `existing.len()` has reached
/// the limit, or [`CreateRejection::Duplicate`] when the candidate's key is
/// already present.
pub fn admit_source(
    limit: PlanLimit,
    existing: &[SourceKey],
    candidate: &SourceKey,
) -> Result<Admission, CreateRejection> {
    let current_count = i64::try_from(existing.len()).unwrap_or(i64::MAX);

    if current_count >= limit.max_sources_allowed {
        return Err(CreateRejection::QuotaExceeded(QuotaExceeded {
            current_count,
            max_allowed: limit.max_sources_allowed,
            plan_type: limit.plan_type,
        }));
    }

    if existing.contains(candidate) {
        return Err(CreateRejection::Duplicate(candidate.clone()));
    }

    Ok(Admission {
        is_first_source: existing.is_empty(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(max: i64) -> PlanLimit {
        PlanLimit {
            plan_type: PlanType::Free,
            max_sources_allowed: max,
        }
    }

    fn key(ext: &str) -> SourceKey {
        SourceKey::new(7, PlatformType::Google, ext)
    }

    #[test]
    fn first_source_is_admitted_and_flagged() {
        let admission = admit_source(limit(1), &[], &key("place-1")).unwrap();
        assert!(admission.is_first_source);
    }

    #[test]
    fn second_source_is_not_first() {
        let admission = admit_source(limit(3), &[key("a")], &key("b")).unwrap();
        assert!(!admission.is_first_source);
    }

    #[test]
    fn full_plan_reports_counts_and_plan() {
        let err = admit_source(limit(1), &[key("a")], &key("b")).unwrap_err();
        assert_eq!(
            err,
            CreateRejection::QuotaExceeded(QuotaExceeded {
                current_count: 1,
                max_allowed: 1,
                plan_type: PlanType::Free,
            })
        );
    }

    #[test]
    fn quota_is_checked_before_duplicates() {
        let err = admit_source(limit(1), &[key("a")], &key("a")).unwrap_err();
        assert!(matches!(err, CreateRejection::QuotaExceeded(_)));
    }

    #[test]
    fn duplicate_key_is_rejected_when_slots_remain() {
        let err = admit_source(limit(5), &[key("a")], &key(" a ")).unwrap_err();
        assert_eq!(err, CreateRejection::Duplicate(key("a")));
    }

    #[test]
    fn same_external_id_on_another_platform_is_not_a_duplicate() {
        let other = SourceKey::new(7, PlatformType::Facebook, "a");
        assert!(admit_source(limit(5), &[key("a")], &other).is_ok());
    }

    #[test]
    fn zero_limit_rejects_everything() {
        let err = admit_source(limit(0), &[], &key("a")).unwrap_err();
        assert!(matches!(
            err,
            CreateRejection::QuotaExceeded(QuotaExceeded {
                current_count: 0,
                max_allowed: 0,
                ..
            })
        ));
    }

    #[test]
    fn source_key_display_is_readable() {
        assert_eq!(key("abc").to_string(), "brand 7 / google / abc");
    }
}
