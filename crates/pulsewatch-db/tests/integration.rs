//! Offline unit tests for pulsewatch-db pool configuration and row types.
//! These tests do not require a live database connection.

use chrono::Utc;
use pulsewatch_core::{AppConfig, Environment};
use pulsewatch_db::{InsightRecordRow, PoolConfig, SyncRunRow};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use uuid::Uuid;

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        clients_path: PathBuf::from("./config/clients.yaml"),
        source_base_url: "https://gateway.example.com".to_string(),
        analysis_base_url: "https://analysis.example.com".to_string(),
        analysis_api_key: "key".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        source_request_timeout_secs: 30,
        analysis_request_timeout_secs: 60,
        max_concurrent_clients: 2,
        retry_max_attempts: 3,
        retry_backoff_base_ms: 1000,
        sync_cron: "0 0 6 * * *".to_string(),
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

/// Compile-time smoke test: confirm that [`SyncRunRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn sync_run_row_has_expected_fields() {
    let row = SyncRunRow {
        id: 1_i64,
        public_id: Uuid::new_v4(),
        trigger_source: "startup".to_string(),
        status: "queued".to_string(),
        started_at: None,
        completed_at: None,
        clients_processed: 0_i32,
        clients_skipped: 0_i32,
        clients_failed: 0_i32,
        error_message: None,
        created_at: Utc::now(),
    };

    assert_eq!(row.id, 1);
    assert_eq!(row.trigger_source, "startup");
    assert_eq!(row.status, "queued");
    assert!(row.started_at.is_none());
}

#[test]
fn insight_record_row_has_expected_fields() {
    let row = InsightRecordRow {
        id: 1_i64,
        public_id: Uuid::new_v4(),
        client_id: "acme".to_string(),
        run_time: Utc::now(),
        body: serde_json::json!({"client_id": "acme"}),
        created_at: Utc::now(),
    };

    assert_eq!(row.client_id, "acme");
    assert_eq!(row.body["client_id"], "acme");
}
