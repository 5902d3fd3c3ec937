//! Success metrics derived from a user's activity ledger.
//!
//! All functions are read-only aggregations over immutable entries, so they
//! can be recomputed at any time with the same result.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::activity::ActivityType;

pub const DEFAULT_ACTIVATION_WINDOW_DAYS: u32 = 7;
pub const DEFAULT_RETENTION_WINDOW_DAYS: u32 = 28;
pub const DEFAULT_RETENTION_MIN_LOGINS: u32 = 3;

/// Thresholds for activation and retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsPolicy {
    pub activation_window: TimeDelta,
    pub retention_window: TimeDelta,
    pub retention_min_logins: usize,
}

impl Default for MetricsPolicy {
    fn default() -> Self {
        Self::from_days(
            DEFAULT_ACTIVATION_WINDOW_DAYS,
            DEFAULT_RETENTION_WINDOW_DAYS,
            DEFAULT_RETENTION_MIN_LOGINS,
        )
    }
}

impl MetricsPolicy {
    #[must_use]
    pub fn from_days(activation_days: u32, retention_days: u32, min_logins: u32) -> Self {
        Self {
            activation_window: TimeDelta::days(i64::from(activation_days)),
            retention_window: TimeDelta::days(i64::from(retention_days)),
            retention_min_logins: usize::try_from(min_logins).unwrap_or(usize::MAX),
        }
    }
}

/// One ledger entry, reduced to what the metrics need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEvent {
    pub activity_type: ActivityType,
    pub occurred_at: DateTime<Utc>,
}

/// A user's ledger entries in no particular order.
#[derive(Debug, Clone, Default)]
pub struct UserTimeline {
    events: Vec<LedgerEvent>,
}

impl FromIterator<LedgerEvent> for UserTimeline {
    fn from_iter<I: IntoIterator<Item = LedgerEvent>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

impl UserTimeline {
    #[must_use]
    pub fn new(events: Vec<LedgerEvent>) -> Self {
        Self { events }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Earliest occurrence of `activity_type`, if any.
    #[must_use]
    pub fn first(&self, activity_type: ActivityType) -> Option<DateTime<Utc>> {
        self.events
            .iter()
            .filter(|e| e.activity_type == activity_type)
            .map(|e| e.occurred_at)
            .min()
    }

    #[must_use]
    pub fn registered_at(&self) -> Option<DateTime<Utc>> {
        self.first(ActivityType::Registration)
    }

    #[must_use]
    pub fn first_source_configured_at(&self) -> Option<DateTime<Utc>> {
        self.first(ActivityType::FirstSourceConfiguredSuccessfully)
    }

    /// Time from the first registration to the first successful source
    /// configuration. Absent until both events exist; later repeats of either
    /// type never change the result.
    #[must_use]
    pub fn time_to_value(&self) -> Option<TimeDelta> {
        Some(self.first_source_configured_at()? - self.registered_at()?)
    }

    #[must_use]
    pub fn has_achieved_activation(&self, policy: &MetricsPolicy) -> bool {
        self.time_to_value()
            .is_some_and(|ttv| ttv >= TimeDelta::zero() && ttv <= policy.activation_window)
    }

    /// Logins in `[registration, registration + retention_window]`.
    #[must_use]
    pub fn logins_in_retention_window(&self, policy: &MetricsPolicy) -> usize {
        let Some(registered_at) = self.registered_at() else {
            return 0;
        };
        let window_end = registered_at + policy.retention_window;

        self.events
            .iter()
            .filter(|e| e.activity_type == ActivityType::Login)
            .filter(|e| e.occurred_at >= registered_at && e.occurred_at <= window_end)
            .count()
    }

    #[must_use]
    pub fn has_achieved_retention(&self, policy: &MetricsPolicy) -> bool {
        self.registered_at().is_some()
            && self.logins_in_retention_window(policy) >= policy.retention_min_logins
    }

    #[must_use]
    pub fn summarize(&self, policy: &MetricsPolicy) -> SuccessMetrics {
        SuccessMetrics {
            registered_at: self.registered_at(),
            first_source_configured_at: self.first_source_configured_at(),
            time_to_value_seconds: self.time_to_value().map(|d| d.num_seconds()),
            activated: self.has_achieved_activation(policy),
            logins_in_retention_window: self.logins_in_retention_window(policy),
            retained: self.has_achieved_retention(policy),
        }
    }
}

/// Funnel snapshot for one user, as served to the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuccessMetrics {
    pub registered_at: Option<DateTime<Utc>>,
    pub first_source_configured_at: Option<DateTime<Utc>>,
    pub time_to_value_seconds: Option<i64>,
    pub activated: bool,
    pub logins_in_retention_window: usize,
    pub retained: bool,
}

#[cfg(test)]
#[path = "metrics_test.rs"]
mod tests;
