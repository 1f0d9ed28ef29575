use pulsewatch_core::retry::Transient;
use thiserror::Error;

/// Errors returned by the sheet gateway client.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network, TLS, timeout, or HTTP-status failure from the gateway.
    #[error("source unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),

    /// The remote tab is missing required columns or the response body does
    /// not have the expected tabular shape. Retrying won't fix it.
    #[error("source schema error in tab '{tab}': {reason}")]
    Schema { tab: String, reason: String },
}

impl Transient for SourceError {
    fn is_transient(&self) -> bool {
        match self {
            // Timeouts, connection failures, 5xx, and rate limiting are worth
            // another attempt; a 404 for a bad sheet ref or a 401/403 for a
            // bad token won't get better on retry.
            SourceError::Unavailable(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status()
                        .is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            SourceError::Schema { .. } => false,
        }
    }
}
