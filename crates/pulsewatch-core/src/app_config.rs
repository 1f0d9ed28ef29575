use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub clients_path: PathBuf,
    pub source_base_url: String,
    pub analysis_base_url: String,
    pub analysis_api_key: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub source_request_timeout_secs: u64,
    pub analysis_request_timeout_secs: u64,
    pub max_concurrent_clients: usize,
    pub retry_max_attempts: u32,
    pub retry_backoff_base_ms: u64,
    pub sync_cron: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("clients_path", &self.clients_path)
            .field("database_url", &"[redacted]")
            .field("source_base_url", &self.source_base_url)
            .field("analysis_base_url", &self.analysis_base_url)
            .field("analysis_api_key", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "source_request_timeout_secs",
                &self.source_request_timeout_secs,
            )
            .field(
                "analysis_request_timeout_secs",
                &self.analysis_request_timeout_secs,
            )
            .field("max_concurrent_clients", &self.max_concurrent_clients)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("sync_cron", &self.sync_cron)
            .finish()
    }
}
