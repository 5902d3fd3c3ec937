//! Review sync pipeline for revdb.
//!
//! Pulls reviews for due sources through a [`ReviewFetcher`], stores the new
//! ones (deduplicated by content hash), applies any machine sentiment the
//! fetcher supplied, and writes the outcome back so the source moves to its
//! next daily slot.

pub mod error;
pub mod fetcher;
pub mod pipeline;

pub use error::FetchError;
pub use fetcher::{FetchedReview, NoopFetcher, ReviewFetcher};
pub use pipeline::{run_sync_sweep, sync_batch, sync_source, SourceSyncReport, SweepReport};
