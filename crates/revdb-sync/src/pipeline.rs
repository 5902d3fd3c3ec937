//! Sync orchestration: one source, a batch, or a full sweep of due sources.

use futures::stream::{self, StreamExt};
use revdb_core::{ChangeReason, Clock, SyncOutcome, SyncWindow};
use revdb_db::{DbError, ReviewSourceRow};
use sqlx::PgPool;

use crate::fetcher::ReviewFetcher;

/// What happened to one source during a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSyncReport {
    pub source_id: i64,
    pub fetched: usize,
    pub inserted: usize,
    pub labelled: usize,
    pub outcome: SyncOutcome,
}

/// Totals for a batch of sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub sources: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Sources whose outcome could not be written back (deleted mid-sync, db error).
    pub errored: usize,
    pub reviews_inserted: usize,
}

#[derive(Default)]
struct Ingested {
    fetched: usize,
    inserted: usize,
    labelled: usize,
}

/// Sync a single source and record the outcome on it.
///
/// Fetch failures and storage errors while ingesting reviews become a
/// [`SyncOutcome::Failed`] on the source; reviews stored before the failure
/// stay stored and are skipped as duplicates next time.
///
/// # Errors
///
/// Returns [`DbError`] only if the outcome itself cannot be recorded, e.g.
/// [`DbError::NotFound`] when the source was deleted while syncing.
pub async fn sync_source(
    pool: &PgPool,
    fetcher: &dyn ReviewFetcher,
    source: &ReviewSourceRow,
    window: &SyncWindow,
    clock: &dyn Clock,
) -> Result<SourceSyncReport, DbError> {
    let mut ingested = Ingested::default();
    let outcome = match ingest(pool, fetcher, source, clock, &mut ingested).await {
        Ok(()) => SyncOutcome::Success,
        Err(message) => SyncOutcome::failed(message),
    };

    revdb_db::record_sync_outcome(pool, source.id, &outcome, window, clock.now()).await?;

    Ok(SourceSyncReport {
        source_id: source.id,
        fetched: ingested.fetched,
        inserted: ingested.inserted,
        labelled: ingested.labelled,
        outcome,
    })
}

async fn ingest(
    pool: &PgPool,
    fetcher: &dyn ReviewFetcher,
    source: &ReviewSourceRow,
    clock: &dyn Clock,
    ingested: &mut Ingested,
) -> Result<(), String> {
    let reviews = fetcher.fetch(source).await.map_err(|e| {
        tracing::warn!(
            source_id = source.id,
            fetcher = fetcher.name(),
            error = %e,
            "fetch failed"
        );
        e.to_string()
    })?;
    ingested.fetched = reviews.len();

    for review in &reviews {
        let new_review = review.as_new_review();
        let review_id = match revdb_db::insert_review_if_new(pool, source.id, &new_review).await {
            Ok(Some(id)) => {
                ingested.inserted += 1;
                id
            }
            Ok(None) if review.sentiment.is_some() => {
                // Duplicate: only revisit it if an earlier labelling never landed.
                match revdb_db::find_unlabelled_duplicate(pool, source.id, &new_review).await {
                    Ok(Some(id)) => id,
                    Ok(None) => continue,
                    Err(e) => return Err(format!("storing reviews failed: {e}")),
                }
            }
            Ok(None) => continue,
            Err(DbError::Validation(reason)) => {
                tracing::warn!(source_id = source.id, %reason, "skipping malformed review");
                continue;
            }
            Err(e) => return Err(format!("storing reviews failed: {e}")),
        };

        if let Some(sentiment) = review.sentiment {
            revdb_db::apply_ai_sentiment(
                pool,
                review_id,
                sentiment,
                ChangeReason::AiInitial,
                clock.now(),
            )
            .await
            .map_err(|e| format!("labelling review {review_id} failed: {e}"))?;
            ingested.labelled += 1;
        }
    }

    Ok(())
}

/// Sync the given sources with at most `concurrency` in flight.
///
/// Never fails as a whole; per-source problems are logged and counted.
pub async fn sync_batch(
    pool: &PgPool,
    fetcher: &dyn ReviewFetcher,
    sources: &[ReviewSourceRow],
    window: &SyncWindow,
    clock: &dyn Clock,
    concurrency: usize,
) -> SweepReport {
    let results: Vec<(i64, Result<SourceSyncReport, DbError>)> = stream::iter(sources)
        .map(|source| async move {
            (
                source.id,
                sync_source(pool, fetcher, source, window, clock).await,
            )
        })
        .boxed()
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut report = SweepReport {
        sources: sources.len(),
        ..SweepReport::default()
    };
    for (source_id, result) in results {
        match result {
            Ok(source_report) => {
                report.reviews_inserted += source_report.inserted;
                match source_report.outcome {
                    SyncOutcome::Success => report.succeeded += 1,
                    SyncOutcome::Failed { .. } => report.failed += 1,
                }
            }
            Err(e) => {
                tracing::error!(source_id, error = %e, "could not record sync outcome");
                report.errored += 1;
            }
        }
    }

    if report.failed > 0 || report.errored > 0 {
        tracing::warn!(
            failed = report.failed,
            errored = report.errored,
            total = report.sources,
            "some sources did not sync"
        );
    }
    report
}

/// Find every source whose slot has arrived and sync it.
///
/// # Errors
///
/// Returns [`DbError`] if the due sources cannot be listed.
pub async fn run_sync_sweep(
    pool: &PgPool,
    fetcher: &dyn ReviewFetcher,
    window: &SyncWindow,
    clock: &dyn Clock,
    concurrency: usize,
) -> Result<SweepReport, DbError> {
    let now = clock.now();
    let due = revdb_db::find_sources_ready_for_sync(pool, now).await?;
    if due.is_empty() {
        tracing::debug!(now = %now, "sync sweep: nothing due");
        return Ok(SweepReport::default());
    }

    tracing::info!(due = due.len(), fetcher = fetcher.name(), "sync sweep started");
    let report = sync_batch(pool, fetcher, &due, window, clock, concurrency).await;
    tracing::info!(
        succeeded = report.succeeded,
        failed = report.failed,
        errored = report.errored,
        reviews_inserted = report.reviews_inserted,
        "sync sweep finished"
    );
    Ok(report)
}
