pub mod app_config;
pub mod clients;
mod config;
pub mod retry;
pub mod types;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use clients::{load_enabled_clients, ClientConfig};
pub use config::{load_app_config, load_app_config_from_env};
pub use types::{
    AnalysisUnitResult, ConsolidatedInsight, RawComment, RawDeltaBatch, RawPost, RunContext,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
    #[error("failed to read client registry at {path}: {source}")]
    RegistryIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse client registry: {0}")]
    RegistryParse(#[from] serde_yaml::Error),
}
