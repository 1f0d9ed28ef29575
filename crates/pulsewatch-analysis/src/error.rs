use pulsewatch_core::retry::Transient;
use thiserror::Error;

/// Errors returned by the analysis service client.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Network, TLS, timeout, or HTTP-status failure from the service.
    #[error("analysis service error: {0}")]
    Service(#[from] reqwest::Error),

    /// The service accepted the request but reported an application-level
    /// error (malformed request, unknown unit). Retrying won't fix it.
    #[error("analysis service rejected request: {0}")]
    Api(String),

    /// The service returned something the unit cannot interpret. Recorded as
    /// a unit-level failure, never a run-level abort.
    #[error("analysis output unparsable for {context}: {reason}")]
    Unparsable { context: String, reason: String },
}

impl Transient for AnalysisError {
    fn is_transient(&self) -> bool {
        match self {
            // Timeouts, connection failures, 5xx, and rate limiting are worth
            // another attempt; other HTTP statuses are not.
            AnalysisError::Service(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status()
                        .is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            AnalysisError::Api(_) | AnalysisError::Unparsable { .. } => false,
        }
    }
}

/// A consolidated insight failed schema validation and must not be stored.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("unit '{unit}' is not registered; refusing to store its payload")]
    UnknownUnit { unit: String },

    #[error("unit '{unit}': required field '{field}' is missing")]
    MissingField { unit: String, field: String },

    #[error("unit '{unit}': field '{field}' has wrong type (expected {expected})")]
    WrongType {
        unit: String,
        field: String,
        expected: &'static str,
    },

    #[error("unit '{unit}': field '{field}' out of range: {reason}")]
    OutOfRange {
        unit: String,
        field: String,
        reason: String,
    },
}
