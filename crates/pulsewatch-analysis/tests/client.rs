//! Integration tests for `AnalysisClient` using wiremock HTTP mocks.

use pulsewatch_analysis::{AnalysisClient, AnalysisError};
use pulsewatch_core::retry::Transient;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> AnalysisClient {
    AnalysisClient::new(base_url, "test-key", 30).expect("client construction should not fail")
}

#[tokio::test]
async fn analyze_returns_result_object() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "status": "ok",
        "result": {"score": 0.7, "label": "positive", "summary": "Upbeat audience."}
    });
    Mock::given(method("POST"))
        .and(path("/v1/analyze"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "unit": "sentiment",
            "response_format": "json_object"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let result = client
        .analyze("sentiment", "score the sentiment", "POST hello")
        .await
        .expect("should parse result");

    assert_eq!(result["score"], 0.7);
    assert_eq!(result["label"], "positive");
}

#[tokio::test]
async fn service_error_status_is_an_api_error() {
    let server = MockServer::start().await;

    let body = serde_json::json!({"status": "error", "message": "unknown unit"});
    Mock::given(method("POST"))
        .and(path("/v1/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.analyze("bogus", "x", "y").await.unwrap_err();

    assert!(matches!(err, AnalysisError::Api(_)));
    assert!(!err.is_transient(), "API errors must not consume retries");
}

#[tokio::test]
async fn free_text_result_is_unparsable() {
    let server = MockServer::start().await;

    let body = serde_json::json!({"status": "ok", "result": "it went great"});
    Mock::given(method("POST"))
        .and(path("/v1/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.analyze("sentiment", "x", "y").await.unwrap_err();

    assert!(matches!(err, AnalysisError::Unparsable { .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn rate_limit_is_transient() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/analyze"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.analyze("sentiment", "x", "y").await.unwrap_err();

    assert!(matches!(err, AnalysisError::Service(_)));
    assert!(err.is_transient(), "429 should be retried");
}

#[tokio::test]
async fn server_error_is_transient() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/analyze"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.analyze("sentiment", "x", "y").await.unwrap_err();

    assert!(err.is_transient());
}
