//! HTTP client for the remote analysis service.
//!
//! The service takes a batch of text plus instructions and returns a
//! structured JSON object per call (strict structured-output mode). The
//! client never interprets unit payloads — that is the validator's job.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::Value;

use crate::error::AnalysisError;

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    unit: &'a str,
    instructions: &'a str,
    input: &'a str,
    response_format: &'a str,
}

/// Client for the analysis service REST API.
#[derive(Debug)]
pub struct AnalysisClient {
    client: Client,
    api_key: String,
    base_url: Url,
}

impl AnalysisClient {
    /// Creates a client pointed at `base_url` with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Service`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`AnalysisError::Api`] if `base_url` is not
    /// a valid URL.
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("pulsewatch/0.1 (client-insight-sync)")
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| AnalysisError::Api(format!("invalid base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
        })
    }

    /// Runs one analysis call and returns the structured result object.
    ///
    /// # Errors
    ///
    /// - [`AnalysisError::Service`] on network failure or non-2xx status
    ///   (transient variants are retryable).
    /// - [`AnalysisError::Api`] if the service reports an application error.
    /// - [`AnalysisError::Unparsable`] if the body is not JSON or the result
    ///   is missing or not an object.
    pub async fn analyze(
        &self,
        unit: &str,
        instructions: &str,
        input: &str,
    ) -> Result<Value, AnalysisError> {
        let url = self.analyze_url();
        let request = AnalyzeRequest {
            unit,
            instructions,
            input,
            response_format: "json_object",
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;

        let envelope: Value =
            serde_json::from_str(&body).map_err(|e| AnalysisError::Unparsable {
                context: format!("analyze(unit={unit})"),
                reason: format!("body is not JSON: {e}"),
            })?;

        if envelope.get("status").and_then(Value::as_str) == Some("error") {
            let msg = envelope
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(AnalysisError::Api(msg));
        }

        match envelope.get("result") {
            Some(result @ Value::Object(_)) => Ok(result.clone()),
            Some(_) => Err(AnalysisError::Unparsable {
                context: format!("analyze(unit={unit})"),
                reason: "result is not a JSON object".to_string(),
            }),
            None => Err(AnalysisError::Unparsable {
                context: format!("analyze(unit={unit})"),
                reason: "response has no result field".to_string(),
            }),
        }
    }

    fn analyze_url(&self) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["v1", "analyze"]);
        }
        url
    }
}
