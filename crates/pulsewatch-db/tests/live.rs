//! Live integration tests for pulsewatch-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/pulsewatch-db/`), so `"../../migrations"` resolves to the
//! workspace migration directory.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use pulsewatch_core::types::{AnalysisUnitResult, ConsolidatedInsight};
use pulsewatch_db::{
    commit_insight, complete_sync_run, create_sync_run, fail_sync_run, get_latest_insight,
    get_sync_run, get_watermark, list_sync_run_clients, start_sync_run, upsert_sync_run_client,
    DbError,
};

fn insight(client_id: &str, run_time: DateTime<Utc>) -> ConsolidatedInsight {
    let mut results = BTreeMap::new();
    results.insert(
        "sentiment".to_string(),
        AnalysisUnitResult::Ok {
            payload: serde_json::json!({"score": 0.4, "label": "positive", "summary": "ok"}),
        },
    );
    results.insert(
        "risks".to_string(),
        AnalysisUnitResult::Failed {
            error: "service timed out".to_string(),
        },
    );
    ConsolidatedInsight {
        client_id: client_id.to_string(),
        run_time,
        results,
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn commit_stores_record_and_advances_watermark(pool: sqlx::PgPool) {
    let run_time = Utc.with_ymd_and_hms(2026, 3, 3, 6, 0, 0).unwrap();
    let newest_record = Utc.with_ymd_and_hms(2026, 3, 2, 18, 30, 0).unwrap();

    assert_eq!(get_watermark(&pool, "acme").await.unwrap(), None);

    let row = commit_insight(&pool, &insight("acme", run_time), newest_record)
        .await
        .expect("commit should succeed");

    assert_eq!(row.client_id, "acme");
    assert_eq!(row.run_time, run_time);
    assert_eq!(row.body["results"]["sentiment"]["status"], "ok");
    assert_eq!(
        get_watermark(&pool, "acme").await.unwrap(),
        Some(newest_record),
        "watermark becomes the newest committed record"
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn recommitting_the_same_run_is_idempotent(pool: sqlx::PgPool) {
    let run_time = Utc.with_ymd_and_hms(2026, 3, 3, 6, 0, 0).unwrap();
    let watermark = Utc.with_ymd_and_hms(2026, 3, 2, 18, 30, 0).unwrap();
    let payload = insight("acme", run_time);

    let first = commit_insight(&pool, &payload, watermark).await.unwrap();
    let second = commit_insight(&pool, &payload, watermark).await.unwrap();

    assert_eq!(first.id, second.id, "re-delivery keeps the original record");
    assert_eq!(first.public_id, second.public_id);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM insight_records")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1, "append-only table must not grow on re-delivery");
    assert_eq!(get_watermark(&pool, "acme").await.unwrap(), Some(watermark));
}

#[sqlx::test(migrations = "../../migrations")]
async fn watermark_never_moves_backwards(pool: sqlx::PgPool) {
    let newer = Utc.with_ymd_and_hms(2026, 3, 5, 12, 0, 0).unwrap();
    let older = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

    let run_a = Utc.with_ymd_and_hms(2026, 3, 5, 13, 0, 0).unwrap();
    let run_b = Utc.with_ymd_and_hms(2026, 3, 6, 13, 0, 0).unwrap();

    commit_insight(&pool, &insight("acme", run_a), newer)
        .await
        .unwrap();
    commit_insight(&pool, &insight("acme", run_b), older)
        .await
        .unwrap();

    assert_eq!(
        get_watermark(&pool, "acme").await.unwrap(),
        Some(newer),
        "GREATEST keeps the watermark monotone"
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn latest_insight_returns_newest_run(pool: sqlx::PgPool) {
    let run_a = Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap();
    let run_b = Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap();
    let wm = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

    commit_insight(&pool, &insight("acme", run_a), wm).await.unwrap();
    commit_insight(&pool, &insight("acme", run_b), wm).await.unwrap();

    let latest = get_latest_insight(&pool, "acme")
        .await
        .unwrap()
        .expect("should exist");
    assert_eq!(latest.run_time, run_b);

    assert!(get_latest_insight(&pool, "nobody").await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn watermarks_are_isolated_per_client(pool: sqlx::PgPool) {
    let run_time = Utc.with_ymd_and_hms(2026, 3, 3, 6, 0, 0).unwrap();
    let wm = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();

    commit_insight(&pool, &insight("acme", run_time), wm)
        .await
        .unwrap();

    assert_eq!(get_watermark(&pool, "acme").await.unwrap(), Some(wm));
    assert_eq!(get_watermark(&pool, "zeta").await.unwrap(), None);
}

#[sqlx::test(migrations = "../../migrations")]
async fn sync_run_lifecycle_transitions(pool: sqlx::PgPool) {
    let run = create_sync_run(&pool, "startup").await.unwrap();
    assert_eq!(run.status, "queued");

    start_sync_run(&pool, run.id).await.unwrap();
    complete_sync_run(&pool, run.id, 2, 1, 1).await.unwrap();

    let fetched = get_sync_run(&pool, run.id).await.unwrap();
    assert_eq!(fetched.status, "succeeded");
    assert_eq!(fetched.clients_processed, 2);
    assert_eq!(fetched.clients_skipped, 1);
    assert_eq!(fetched.clients_failed, 1);
    assert!(fetched.completed_at.is_some());

    // Completing twice is an invalid transition.
    let err = complete_sync_run(&pool, run.id, 2, 1, 1).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidRunTransition { .. }));
}

#[sqlx::test(migrations = "../../migrations")]
async fn failed_run_records_error_message(pool: sqlx::PgPool) {
    let run = create_sync_run(&pool, "cron").await.unwrap();
    start_sync_run(&pool, run.id).await.unwrap();
    fail_sync_run(&pool, run.id, "registry unreadable").await.unwrap();

    let fetched = get_sync_run(&pool, run.id).await.unwrap();
    assert_eq!(fetched.status, "failed");
    assert_eq!(fetched.error_message.as_deref(), Some("registry unreadable"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn per_client_outcomes_upsert_in_place(pool: sqlx::PgPool) {
    let run = create_sync_run(&pool, "cron").await.unwrap();
    start_sync_run(&pool, run.id).await.unwrap();

    upsert_sync_run_client(&pool, run.id, "acme", "processed", 5, None)
        .await
        .unwrap();
    upsert_sync_run_client(&pool, run.id, "zeta", "failed", 0, Some("fetch failed"))
        .await
        .unwrap();
    // Second upsert for the same client replaces the row's fields.
    upsert_sync_run_client(&pool, run.id, "acme", "processed", 7, None)
        .await
        .unwrap();

    let rows = list_sync_run_clients(&pool, run.id).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].client_id, "acme");
    assert_eq!(rows[0].records, 7);
    assert_eq!(rows[1].status, "failed");
    assert_eq!(rows[1].error_message.as_deref(), Some("fetch failed"));
}
