//! HTTP completion service against a mock OpenAI-compatible server.

mod common;

use common::MockServerFixture;
use smartstudy::cache::ResponseCache;
use smartstudy::pipeline::PipelineOrchestrator;
use smartstudy::provider::{CompletionRequest, CompletionService, FailureClass};
use smartstudy::resilience::InvocationRequest;
use smartstudy::structured::RecordSpec;
use smartstudy::transport::HttpCompletionService;
use smartstudy::types::ChatMessage;
use smartstudy::{InvocationErrorKind, RetryPolicy, RetryingInvoker};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn request() -> CompletionRequest {
    CompletionRequest::new("llama-3.3-70b-versatile", vec![ChatMessage::user("hi")])
}

fn service(fixture: &MockServerFixture) -> HttpCompletionService {
    HttpCompletionService::new(&fixture.provider_config(), Some("test-key".to_string())).unwrap()
}

#[tokio::test]
async fn returns_trimmed_message_content() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .with_status(200)
        .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"  Question: x  \n"}}]}"#)
        .create_async()
        .await;

    let text = assert_ok!(service(&fixture).complete(&request()).await);
    assert_eq!(text, "Question: x");
    mock.assert_async().await;
}

#[tokio::test]
async fn classifies_error_responses() {
    let mut fixture = MockServerFixture::new().await;
    fixture
        .mock_error(
            401,
            r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error","code":"invalid_api_key"}}"#,
            1,
        )
        .await;

    let failure = assert_err!(service(&fixture).complete(&request()).await);
    assert_eq!(failure.class, FailureClass::Authentication);
    assert_eq!(failure.status, Some(401));
    assert_eq!(failure.message, "Invalid API Key");
}

#[tokio::test]
async fn empty_content_is_a_retryable_failure() {
    let mut fixture = MockServerFixture::new().await;
    fixture.mock_completion("   ").await;

    let failure = service(&fixture).complete(&request()).await.unwrap_err();
    assert_eq!(failure.class, FailureClass::EmptyResponse);
    assert!(failure.retryable());
}

#[tokio::test]
async fn missing_key_fails_without_a_request() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", "/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let service = HttpCompletionService::new(&fixture.provider_config(), None).unwrap();
    let failure = service.complete(&request()).await.unwrap_err();
    assert_eq!(failure.class, FailureClass::Authentication);
    mock.assert_async().await;
}

#[tokio::test]
async fn rate_limit_then_success_through_the_invoker() {
    let mut fixture = MockServerFixture::new().await;
    let limited = fixture
        .mock_error(429, r#"{"error":{"message":"Rate limit reached","code":"rate_limit_exceeded"}}"#, 1)
        .await;
    fixture.mock_completion("Statement: Water boils at 100C.\nAnswer: True").await;

    let invoker = RetryingInvoker::new(Arc::new(service(&fixture)), RetryPolicy::no_delay());
    let (result, state) = invoker
        .invoke_with_state(&InvocationRequest::new("q", "llama-3.3-70b-versatile"))
        .await;

    assert!(result.unwrap().starts_with("Statement:"));
    assert_eq!(state.attempt, 2);
    assert_eq!(state.last_error.unwrap().class, FailureClass::RateLimited);
    limited.assert_async().await;
}

#[tokio::test]
async fn rejected_key_reaches_the_caller_as_configuration_error() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_error(401, r#"{"error":{"message":"Invalid API Key"}}"#, 1)
        .await;

    let invoker = RetryingInvoker::new(Arc::new(service(&fixture)), RetryPolicy::no_delay());
    let pipeline = PipelineOrchestrator::new(Arc::new(ResponseCache::disabled()), invoker);
    let outcome = pipeline
        .run("q", "llama-3.3-70b-versatile", &RecordSpec::TrueFalse, 3, true)
        .await;

    assert!(outcome.is_fallback());
    assert_eq!(outcome.error.unwrap().kind, InvocationErrorKind::Configuration);
    mock.assert_async().await;
}
