//! The incremental sync loop: one run covers every enabled client.
//!
//! A run is bracketed by a `sync_runs` row (create → start → complete/fail).
//! Clients are processed through a bounded `buffer_unordered` pool; each
//! client's pipeline is watermark read → delta fetch → analysis fan-out →
//! validation → atomic commit. A client failing at any stage never aborts
//! the run — the failure is tallied and the loop moves on.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use sqlx::PgPool;

use pulsewatch_analysis::{registered_units, run_units, validate, AnalysisClient, UnitRetry};
use pulsewatch_core::retry::{retry, Backoff};
use pulsewatch_core::types::{ConsolidatedInsight, RawDeltaBatch, RunContext};
use pulsewatch_core::{load_enabled_clients, AppConfig, ClientConfig};
use pulsewatch_source::SheetClient;

/// Final tallies for one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: i32,
    pub skipped: i32,
    pub failed: i32,
}

impl RunSummary {
    fn record(&mut self, outcome: &ClientOutcome) {
        match outcome {
            ClientOutcome::Committed { .. } => self.processed += 1,
            ClientOutcome::NoNewData => self.skipped += 1,
            ClientOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// The pipeline stage at which a client's sync gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Fetch,
    Validate,
    Commit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => write!(f, "fetch"),
            Self::Validate => write!(f, "validate"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// Outcome of processing a single client within a run.
#[derive(Debug)]
enum ClientOutcome {
    Committed { records: usize },
    NoNewData,
    Failed { stage: Stage, message: String },
}

impl ClientOutcome {
    fn status(&self) -> &'static str {
        match self {
            Self::Committed { .. } => "processed",
            Self::NoNewData => "skipped",
            Self::Failed { .. } => "failed",
        }
    }

    fn records(&self) -> i32 {
        match self {
            Self::Committed { records } => i32::try_from(*records).unwrap_or(i32::MAX),
            Self::NoNewData | Self::Failed { .. } => 0,
        }
    }

    fn error_message(&self) -> Option<String> {
        match self {
            Self::Failed { stage, message } => Some(format!("{stage}: {message}")),
            Self::Committed { .. } | Self::NoNewData => None,
        }
    }
}

/// Executes one full sync run over every enabled client in the registry.
///
/// The registry is re-read on every run, so edits to the clients file take
/// effect on the next run without a restart. Returns the final tallies.
///
/// # Errors
///
/// Returns an error if the registry cannot be loaded, the run rows cannot be
/// written, or every client in a non-empty registry failed. Per-client
/// failures alone do not fail the run.
pub async fn run_once(
    pool: &PgPool,
    config: &AppConfig,
    trigger_source: &str,
) -> anyhow::Result<RunSummary> {
    let source = SheetClient::new(&config.source_base_url, config.source_request_timeout_secs)?;
    let analysis = Arc::new(AnalysisClient::new(
        &config.analysis_base_url,
        &config.analysis_api_key,
        config.analysis_request_timeout_secs,
    )?);

    let run = pulsewatch_db::create_sync_run(pool, trigger_source).await?;
    if let Err(e) = pulsewatch_db::start_sync_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, format!("{e:#}")).await;
        return Err(e.into());
    }

    let clients = match load_enabled_clients(&config.clients_path) {
        Ok(clients) => clients,
        Err(e) => {
            fail_run_best_effort(pool, run.id, format!("client registry unreadable: {e}")).await;
            return Err(e.into());
        }
    };

    tracing::info!(
        run_id = run.id,
        trigger = trigger_source,
        clients = clients.len(),
        "starting sync run"
    );

    let run_time = Utc::now();
    let max_concurrent = config.max_concurrent_clients.max(1);

    let client_futures: Vec<_> = clients
        .iter()
        .map(|client| {
            let analysis = Arc::clone(&analysis);
            let source = &source;
            async move {
                let outcome =
                    process_client(pool, source, &analysis, config, client, run_time).await;
                (client, outcome)
            }
        })
        .collect();
    let outcomes: Vec<(&ClientConfig, ClientOutcome)> = stream::iter(client_futures)
        .buffer_unordered(max_concurrent)
        .collect()
        .await;

    let mut summary = RunSummary::default();
    for (client, outcome) in &outcomes {
        summary.record(outcome);
        match outcome {
            ClientOutcome::Committed { records } => {
                tracing::info!(client = %client.client_id, records, "client sync committed");
            }
            ClientOutcome::NoNewData => {
                tracing::info!(client = %client.client_id, "no new activity; skipping");
            }
            ClientOutcome::Failed { stage, message } => {
                tracing::error!(
                    client = %client.client_id,
                    stage = %stage,
                    error = %message,
                    "client sync failed"
                );
            }
        }

        if let Err(e) = pulsewatch_db::upsert_sync_run_client(
            pool,
            run.id,
            &client.client_id,
            outcome.status(),
            outcome.records(),
            outcome.error_message().as_deref(),
        )
        .await
        {
            tracing::error!(
                client = %client.client_id,
                error = %e,
                "failed to record per-client outcome"
            );
        }
    }

    if !clients.is_empty() && summary.failed == i32::try_from(clients.len()).unwrap_or(i32::MAX) {
        let message = format!("all {} clients failed", clients.len());
        fail_run_best_effort(pool, run.id, message.clone()).await;
        anyhow::bail!("{message}");
    }

    pulsewatch_db::complete_sync_run(
        pool,
        run.id,
        summary.processed,
        summary.skipped,
        summary.failed,
    )
    .await?;

    tracing::info!(
        run_id = run.id,
        processed = summary.processed,
        skipped = summary.skipped,
        failed = summary.failed,
        "sync run complete"
    );
    Ok(summary)
}

/// Runs the full per-client pipeline. Every error path maps to a
/// [`ClientOutcome::Failed`] so the caller can keep the run going.
async fn process_client(
    pool: &PgPool,
    source: &SheetClient,
    analysis: &Arc<AnalysisClient>,
    config: &AppConfig,
    client: &ClientConfig,
    run_time: chrono::DateTime<chrono::Utc>,
) -> ClientOutcome {
    let Ok(token) = std::env::var(&client.credentials_ref) else {
        return ClientOutcome::Failed {
            stage: Stage::Fetch,
            message: format!(
                "credentials variable '{}' is not set",
                client.credentials_ref
            ),
        };
    };

    let since = match pulsewatch_db::get_watermark(pool, &client.client_id).await {
        Ok(since) => since,
        Err(e) => {
            return ClientOutcome::Failed {
                stage: Stage::Fetch,
                message: format!("watermark read failed: {e}"),
            };
        }
    };

    let ctx = RunContext {
        client: client.clone(),
        run_time,
        since,
    };

    let backoff = Backoff::Exponential {
        base: Duration::from_millis(config.retry_backoff_base_ms),
    };

    let batch = match retry(config.retry_max_attempts, backoff, || {
        source.fetch_delta(&ctx.client.source_ref, &token, ctx.since)
    })
    .await
    {
        Ok(batch) => batch,
        Err(e) => {
            return ClientOutcome::Failed {
                stage: Stage::Fetch,
                message: e.to_string(),
            };
        }
    };

    let Some((records, watermark)) = batch_to_analyze(&batch) else {
        return ClientOutcome::NoNewData;
    };

    let unit_retry = UnitRetry {
        max_attempts: config.retry_max_attempts,
        backoff,
    };
    let results = run_units(analysis, registered_units(), &ctx.client, &batch, unit_retry).await;

    let insight = ConsolidatedInsight {
        client_id: ctx.client.client_id.clone(),
        run_time: ctx.run_time,
        results,
    };

    if let Err(e) = validate(&insight) {
        return ClientOutcome::Failed {
            stage: Stage::Validate,
            message: e.to_string(),
        };
    }

    match pulsewatch_db::commit_insight(pool, &insight, watermark).await {
        Ok(_) => ClientOutcome::Committed { records },
        Err(e) => ClientOutcome::Failed {
            stage: Stage::Commit,
            message: e.to_string(),
        },
    }
}

/// Decides whether a fetched delta warrants analysis. `None` means no new
/// activity since the watermark: no unit calls are made and nothing is
/// committed for this client. Otherwise returns the record count and the
/// batch's newest `created_at`, which becomes the committed watermark.
fn batch_to_analyze(batch: &RawDeltaBatch) -> Option<(usize, chrono::DateTime<chrono::Utc>)> {
    if batch.is_empty() {
        return None;
    }
    Some((batch.record_count(), batch.max_created_at()?))
}

/// Marks the run failed, logging rather than propagating any error so the
/// original failure stays the one reported.
async fn fail_run_best_effort(pool: &PgPool, run_id: i64, message: String) {
    if let Err(e) = pulsewatch_db::fail_sync_run(pool, run_id, &message).await {
        tracing::error!(run_id, error = %e, "failed to mark sync run as failed");
    }
}
