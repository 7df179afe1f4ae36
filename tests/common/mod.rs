//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use mockito::{Mock, Server, ServerGuard};
use smartstudy::cache::{CacheConfig, DiskCache, ResponseCache};
use smartstudy::config::ProviderConfig;
use smartstudy::provider::{CompletionRequest, CompletionService, ProviderFailure};
use smartstudy::{PipelineOrchestrator, RetryPolicy, RetryingInvoker};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub type Reply = Result<String, ProviderFailure>;

/// Completion service that plays back a fixed script and records every request.
pub struct ScriptedService {
    replies: Mutex<Vec<Reply>>,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedService {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderFailure> {
        self.seen.lock().unwrap().push(request.clone());
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            Err(ProviderFailure::network("script exhausted"))
        } else {
            replies.remove(0)
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Orchestrator over `service` with a disk cache in `dir` and no retry delay.
pub fn disk_pipeline(service: Arc<ScriptedService>, dir: &Path) -> PipelineOrchestrator {
    let cache = Arc::new(ResponseCache::new(
        CacheConfig::default(),
        Box::new(DiskCache::new(dir)),
    ));
    PipelineOrchestrator::new(cache, RetryingInvoker::new(service, RetryPolicy::no_delay()))
}

/// Mock OpenAI-compatible endpoint.
pub struct MockServerFixture {
    pub server: ServerGuard,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self { server, base_url }
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            base_url: self.base_url.clone(),
            ..ProviderConfig::default()
        }
    }

    /// Successful completion whose message content is `content`.
    pub async fn mock_completion(&mut self, content: &str) -> Mock {
        let body = serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        });
        self.server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await
    }

    pub async fn mock_error(&mut self, status: usize, body: &str, hits: usize) -> Mock {
        self.server
            .mock("POST", "/chat/completions")
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_header("retry-after", "0")
            .with_body(body)
            .expect(hits)
            .create_async()
            .await
    }
}
