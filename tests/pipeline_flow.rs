//! Cache → invoke → parse behavior against an on-disk cache.

mod common;

use common::{disk_pipeline, ScriptedService};
use smartstudy::cache::KeyDeriver;
use smartstudy::pipeline::{PipelineRequest, Prompt};
use smartstudy::provider::{FailureClass, ProviderFailure};
use smartstudy::structured::{parse, RecordSpec};
use smartstudy::InvocationErrorKind;

const MODEL: &str = "llama-3.3-70b-versatile";
const PROMPT: &str = "Generate a multiple choice question about arithmetic.";
const REPLY: &str = "Question: What is 2+2?\nA: 3\nB: 4\nC: 5\nD: 6\nCorrect Answer: B";

#[tokio::test]
async fn prepopulated_entry_is_served_without_invoking() {
    let tmp = tempfile::tempdir().unwrap();
    let service = ScriptedService::new(vec![]);
    let pipeline = disk_pipeline(service.clone(), tmp.path());

    let key = KeyDeriver::new().derive(&Prompt::from(PROMPT).cache_text(None), MODEL);
    std::fs::write(tmp.path().join(format!("{}.txt", key)), REPLY).unwrap();

    let spec = RecordSpec::multiple_choice();
    let outcome = pipeline.run(PROMPT, MODEL, &spec, 3, true).await;

    assert!(outcome.from_cache);
    assert!(outcome.error.is_none());
    assert_eq!(outcome.record, parse(REPLY, &spec));
    assert_eq!(service.calls(), 0);
}

#[tokio::test]
async fn cache_survives_a_new_orchestrator() {
    let tmp = tempfile::tempdir().unwrap();
    let spec = RecordSpec::multiple_choice();

    let first = ScriptedService::new(vec![Ok(REPLY.to_string())]);
    let outcome = disk_pipeline(first.clone(), tmp.path())
        .run(PROMPT, MODEL, &spec, 3, true)
        .await;
    assert!(!outcome.from_cache);
    assert_eq!(first.calls(), 1);

    let second = ScriptedService::new(vec![]);
    let outcome = disk_pipeline(second.clone(), tmp.path())
        .run(PROMPT, MODEL, &spec, 3, true)
        .await;
    assert!(outcome.from_cache);
    assert_eq!(outcome.record.record.as_multiple_choice().unwrap().correct_label, "B");
    assert_eq!(second.calls(), 0);
}

#[tokio::test]
async fn different_model_is_a_miss() {
    let tmp = tempfile::tempdir().unwrap();
    let service = ScriptedService::new(vec![Ok(REPLY.to_string()), Ok(REPLY.to_string())]);
    let pipeline = disk_pipeline(service.clone(), tmp.path());
    let spec = RecordSpec::multiple_choice();

    pipeline.run(PROMPT, MODEL, &spec, 1, true).await;
    let outcome = pipeline.run(PROMPT, "llama-3.1-8b-instant", &spec, 1, true).await;
    assert!(!outcome.from_cache);
    assert_eq!(service.calls(), 2);
}

#[tokio::test]
async fn exhausted_run_returns_fallback_and_caches_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let service = ScriptedService::new(vec![
        Err(ProviderFailure::network("reset")),
        Err(ProviderFailure::new(FailureClass::ServerError, "502").with_status(502)),
    ]);
    let pipeline = disk_pipeline(service.clone(), tmp.path());

    let outcome = pipeline
        .run(PROMPT, MODEL, &RecordSpec::multiple_choice(), 2, true)
        .await;

    assert!(outcome.is_fallback());
    let err = outcome.error.as_ref().unwrap();
    assert_eq!(err.kind, InvocationErrorKind::Exhausted);
    assert_eq!(err.attempts, 2);
    assert!(outcome.warning().is_some());
    assert_eq!(outcome.record.record.as_multiple_choice().unwrap().correct_label, "A");
    assert_eq!(pipeline.cache().len().await, 0);
}

#[tokio::test]
async fn unusable_cache_directory_does_not_break_generation() {
    let tmp = tempfile::tempdir().unwrap();
    let blocker = tmp.path().join("cache");
    std::fs::write(&blocker, "not a directory").unwrap();

    let service = ScriptedService::new(vec![Ok(REPLY.to_string())]);
    let outcome = disk_pipeline(service, &blocker)
        .run(PROMPT, MODEL, &RecordSpec::multiple_choice(), 1, true)
        .await;

    assert!(!outcome.from_cache);
    assert!(outcome.error.is_none());
    assert!(!outcome.is_fallback());
}

#[tokio::test]
async fn system_prompt_is_part_of_the_key() {
    let tmp = tempfile::tempdir().unwrap();
    let service = ScriptedService::new(vec![Ok("one".into()), Ok("two".into())]);
    let pipeline = disk_pipeline(service.clone(), tmp.path());

    let plain = PipelineRequest::new(PROMPT, MODEL);
    let tutored = PipelineRequest::new(PROMPT, MODEL).with_system("You are a tutor.");
    assert_eq!(pipeline.run_text_request(&plain).await.text.as_deref(), Some("one"));
    assert_eq!(pipeline.run_text_request(&tutored).await.text.as_deref(), Some("two"));
    assert!(pipeline.run_text_request(&plain).await.from_cache);
    assert_eq!(service.calls(), 2);

    assert_eq!(pipeline.clear_cache().await.unwrap(), 2);
}
