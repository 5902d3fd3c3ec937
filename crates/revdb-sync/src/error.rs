use revdb_core::PlatformType;
use thiserror::Error;

/// Why a fetcher could not deliver reviews for a source.
///
/// These never abort a sweep; they are recorded on the source as a failed
/// sync and retried at its next slot.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("credentials rejected by {0}")]
    Unauthorized(PlatformType),

    #[error("rate limited by {platform}")]
    RateLimited { platform: PlatformType },

    #[error("no fetcher configured for {0}")]
    Unsupported(PlatformType),
}
