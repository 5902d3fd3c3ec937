//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring review-sync sweep.

use std::sync::Arc;

use revdb_core::{AppConfig, Clock};
use revdb_sync::ReviewFetcher;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the sweep cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<AppConfig>,
    clock: Arc<dyn Clock>,
    fetcher: Arc<dyn ReviewFetcher>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_sync_sweep_job(&scheduler, pool, config, clock, fetcher).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the sync sweep on `config.sync_sweep_cron`.
///
/// Each tick syncs every active source whose `next_scheduled_sync_at` has
/// passed. Sources are only due once a day, at the configured local hour,
/// so the cron cadence bounds how late a sync may start, not how often a
/// source is synced.
async fn register_sync_sweep_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: Arc<AppConfig>,
    clock: Arc<dyn Clock>,
    fetcher: Arc<dyn ReviewFetcher>,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);
    let cron = config.sync_sweep_cron.clone();

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);
        let clock = Arc::clone(&clock);
        let fetcher = Arc::clone(&fetcher);

        Box::pin(async move {
            match revdb_sync::run_sync_sweep(
                &pool,
                fetcher.as_ref(),
                &config.sync_window,
                clock.as_ref(),
                config.sync_concurrency,
            )
            .await
            {
                Ok(report) if report.sources > 0 => {
                    tracing::info!(
                        sources = report.sources,
                        succeeded = report.succeeded,
                        failed = report.failed,
                        "scheduler: sync sweep complete"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "scheduler: failed to load sources due for sync");
                }
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: sync sweep registered");
    Ok(())
}
