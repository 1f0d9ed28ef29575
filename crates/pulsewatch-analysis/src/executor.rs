//! Fan-out executor: runs every registered unit concurrently for one client.
//!
//! Each unit call is spawned as its own task and wrapped in its own retry
//! budget. A unit that exhausts its retries, returns unparsable output, or
//! panics becomes a `failed` entry in the result map — it never cancels,
//! delays, or corrupts its siblings. The executor returns only once every
//! unit has terminated.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;

use pulsewatch_core::retry::{retry, Backoff};
use pulsewatch_core::types::{AnalysisUnitResult, RawDeltaBatch};
use pulsewatch_core::ClientConfig;

use crate::client::AnalysisClient;
use crate::units::UnitSpec;

/// Retry settings applied independently to each unit call.
#[derive(Debug, Clone, Copy)]
pub struct UnitRetry {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

/// Runs all `units` concurrently against the same batch and collects one
/// result per unit id. Never returns partially.
pub async fn run_units(
    service: &Arc<AnalysisClient>,
    units: &'static [UnitSpec],
    client: &ClientConfig,
    batch: &RawDeltaBatch,
    unit_retry: UnitRetry,
) -> BTreeMap<String, AnalysisUnitResult> {
    let client_id = client.client_id.clone();

    let handles: Vec<_> = units
        .iter()
        .map(|unit| {
            // Render before spawning so tasks own plain strings.
            let input = (unit.render_input)(client, batch);
            let service = Arc::clone(service);
            let client_id = client_id.clone();
            tokio::spawn(async move {
                run_one_unit(&service, unit, &client_id, &input, unit_retry).await
            })
        })
        .collect();

    let mut results = BTreeMap::new();
    for (unit, handle) in units.iter().zip(join_all(handles).await) {
        let result = match handle {
            Ok(result) => result,
            Err(join_error) => {
                tracing::error!(
                    client = %client_id,
                    unit = unit.id,
                    error = %join_error,
                    "analysis unit task aborted"
                );
                AnalysisUnitResult::Failed {
                    error: format!("analysis task aborted: {join_error}"),
                }
            }
        };
        results.insert(unit.id.to_string(), result);
    }
    results
}

async fn run_one_unit(
    service: &AnalysisClient,
    unit: &UnitSpec,
    client_id: &str,
    input: &str,
    unit_retry: UnitRetry,
) -> AnalysisUnitResult {
    let outcome = retry(unit_retry.max_attempts, unit_retry.backoff, || {
        service.analyze(unit.id, unit.instructions, input)
    })
    .await;

    match outcome {
        Ok(payload) => {
            tracing::debug!(client = %client_id, unit = unit.id, "analysis unit succeeded");
            AnalysisUnitResult::Ok { payload }
        }
        Err(e) => {
            tracing::warn!(
                client = %client_id,
                unit = unit.id,
                error = %e,
                "analysis unit failed; recording failure and continuing"
            );
            AnalysisUnitResult::Failed {
                error: e.to_string(),
            }
        }
    }
}
