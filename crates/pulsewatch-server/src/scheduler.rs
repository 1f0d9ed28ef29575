//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring sync job on the cron expression from `PULSE_SYNC_CRON`.

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::runner;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process. Dropping it shuts down all scheduled jobs.
///
/// The shared `run_lock` prevents overlapping runs: if a tick fires while a
/// previous run (scheduled or startup) is still in flight, the tick is
/// skipped with a warning rather than queued.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, the
/// cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<pulsewatch_core::AppConfig>,
    run_lock: Arc<Mutex<()>>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let cron = config.sync_cron.clone();
    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let pool = pool.clone();
        let config = Arc::clone(&config);
        let run_lock = Arc::clone(&run_lock);

        Box::pin(async move {
            let Ok(_guard) = run_lock.try_lock() else {
                tracing::warn!("previous sync run still in flight; skipping this tick");
                return;
            };

            tracing::info!("scheduler: starting sync run");
            match runner::run_once(&pool, &config, "cron").await {
                Ok(summary) => tracing::info!(
                    processed = summary.processed,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    "scheduler: sync run complete"
                ),
                Err(e) => tracing::error!(error = %e, "scheduler: sync run failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;
    Ok(scheduler)
}
