//! Time arithmetic for source syncing.
//!
//! Everything here is a pure function of an injected instant. Nothing reads
//! the system clock except [`SystemClock`], which callers hand in explicitly.

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use crate::CoreError;

pub const DEFAULT_SYNC_HOUR: u32 = 3;
pub const DEFAULT_MANUAL_REFRESH_COOLDOWN_HOURS: u32 = 24;

/// Upper bound when walking forward out of a DST gap, in minutes.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// Source of "now" for operations that stamp timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant. Used by tests and by the CLI's `--at` flag.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Scheduled sync window
// ---------------------------------------------------------------------------

/// Daily wall-clock hour, in a named timezone, at which sources are synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    timezone: Tz,
    hour: u32,
}

impl Default for SyncWindow {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            hour: DEFAULT_SYNC_HOUR,
        }
    }
}

impl SyncWindow {
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidSyncHour`] if `hour` is not a valid
    /// wall-clock hour.
    pub fn new(timezone: Tz, hour: u32) -> Result<Self, CoreError> {
        if hour > 23 {
            return Err(CoreError::InvalidSyncHour(hour));
        }
        Ok(Self { timezone, hour })
    }

    #[must_use]
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    #[must_use]
    pub fn hour(&self) -> u32 {
        self.hour
    }

    /// Next occurrence of the window strictly after `now`.
    ///
    /// If `now` is at or past today's occurrence (in the window's timezone),
    /// tomorrow's occurrence is returned.
    #[must_use]
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local_today = now.with_timezone(&self.timezone).date_naive();
        let today = self.occurrence_on(local_today);
        if today > now {
            return today;
        }
        // NaiveDate::MAX has no successor; unreachable for real clocks.
        local_today
            .succ_opt()
            .map_or(today, |tomorrow| self.occurrence_on(tomorrow))
    }

    /// The window's instant on a given local date.
    ///
    /// An ambiguous local time (clocks going back) resolves to the earlier
    /// instant. A non-existent one (clocks going forward) resolves to the
    /// first valid local minute after the gap.
    fn occurrence_on(&self, date: NaiveDate) -> DateTime<Utc> {
        let naive = date
            .and_hms_opt(self.hour, 0, 0)
            .unwrap_or_else(|| date.and_time(chrono::NaiveTime::MIN));

        match self.timezone.from_local_datetime(&naive) {
            LocalResult::Single(t) | LocalResult::Ambiguous(t, _) => t.with_timezone(&Utc),
            LocalResult::None => self.first_after_gap(naive),
        }
    }

    fn first_after_gap(&self, naive: NaiveDateTime) -> DateTime<Utc> {
        (1..=MAX_GAP_MINUTES)
            .find_map(|m| {
                self.timezone
                    .from_local_datetime(&(naive + TimeDelta::minutes(m)))
                    .earliest()
            })
            .map_or_else(|| naive.and_utc(), |t| t.with_timezone(&Utc))
    }
}

/// Next scheduled sync instant for `now`, using `hour` in `timezone`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidSyncHour`] if `hour > 23`.
pub fn next_scheduled_sync(
    now: DateTime<Utc>,
    timezone: Tz,
    hour: u32,
) -> Result<DateTime<Utc>, CoreError> {
    Ok(SyncWindow::new(timezone, hour)?.next_after(now))
}

// ---------------------------------------------------------------------------
// Manual refresh cooldown
// ---------------------------------------------------------------------------

/// Minimum spacing between two manual refreshes of one brand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshCooldown {
    window: TimeDelta,
}

impl Default for RefreshCooldown {
    fn default() -> Self {
        Self::from_hours(DEFAULT_MANUAL_REFRESH_COOLDOWN_HOURS)
    }
}

impl RefreshCooldown {
    /// Negative windows are treated as zero.
    #[must_use]
    pub fn new(window: TimeDelta) -> Self {
        Self {
            window: window.max(TimeDelta::zero()),
        }
    }

    #[must_use]
    pub fn from_hours(hours: u32) -> Self {
        Self::new(TimeDelta::hours(i64::from(hours)))
    }

    #[must_use]
    pub fn window(&self) -> TimeDelta {
        self.window
    }

    /// True when no refresh has happened yet or the full window has elapsed.
    #[must_use]
    pub fn can_refresh(&self, last_refresh_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        self.time_until_next_refresh(last_refresh_at, now).is_zero()
    }

    /// Remaining wait before the next refresh; never negative, and zero
    /// exactly when [`Self::can_refresh`] is true.
    #[must_use]
    pub fn time_until_next_refresh(
        &self,
        last_refresh_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> TimeDelta {
        let Some(last) = last_refresh_at else {
            return TimeDelta::zero();
        };
        let remaining = self.window - (now - last);
        remaining.max(TimeDelta::zero())
    }

    #[must_use]
    pub fn next_allowed_at(&self, last_refresh_at: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        last_refresh_at.map(|last| last + self.window)
    }
}

/// Whole seconds for a client-facing wait, rounded up so a sub-second
/// remainder never reads as zero.
#[must_use]
pub fn whole_seconds_ceil(delta: TimeDelta) -> i64 {
    if delta <= TimeDelta::zero() {
        return 0;
    }
    let secs = delta.num_seconds();
    if delta > TimeDelta::seconds(secs) {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
#[path = "schedule_test.rs"]
mod tests;
