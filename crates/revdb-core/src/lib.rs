#[macro_use]
mod text_enum;

pub mod activity;
pub mod app_config;
pub mod config;
pub mod hashing;
pub mod metrics;
pub mod quota;
pub mod schedule;
pub mod sentiment;
pub mod sources;

use thiserror::Error;

pub use activity::ActivityType;
pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use hashing::{content_hash, normalize_content, review_dedup_key};
pub use metrics::{LedgerEvent, MetricsPolicy, SuccessMetrics, UserTimeline};
pub use quota::{admit_source, Admission, CreateRejection, PlanLimit, QuotaExceeded, SourceKey};
pub use schedule::{
    whole_seconds_ceil, Clock, FixedClock, RefreshCooldown, SyncWindow, SystemClock,
};
pub use sentiment::{ChangeReason, Sentiment};
pub use sources::{AuthMethod, PlanType, PlatformType, SyncOutcome, SyncStatus};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown {kind} value: '{value}'")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("sync hour must be within 0..=23, got {0}")]
    InvalidSyncHour(u32),
}
