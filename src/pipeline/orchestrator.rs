use super::request::{PipelineOutcome, PipelineRequest, Prompt, TextOutcome};
use crate::cache::{CacheKey, KeyDeriver, ResponseCache};
use crate::config::StudyConfig;
use crate::provider::CompletionService;
use crate::resilience::{InvocationRequest, RetryingInvoker};
use crate::structured::{RecordSpec, StructuredTextParser};
use crate::transport::HttpCompletionService;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Values used when a request leaves them unset.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationDefaults {
    pub timeout: Duration,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for InvocationDefaults {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Cache lookup, retried invocation, parsing and cache population for one
/// request. Never fails: invocation errors travel in the outcome.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    cache: Arc<ResponseCache>,
    invoker: RetryingInvoker,
    deriver: KeyDeriver,
    parser: StructuredTextParser,
    defaults: InvocationDefaults,
}

impl PipelineOrchestrator {
    pub fn new(cache: Arc<ResponseCache>, invoker: RetryingInvoker) -> Self {
        Self {
            cache,
            invoker,
            deriver: KeyDeriver::new(),
            parser: StructuredTextParser::new(),
            defaults: InvocationDefaults::default(),
        }
    }

    /// HTTP service, disk cache and retry policy from `config`.
    ///
    /// Fails immediately when no API key can be found.
    pub fn from_config(config: &StudyConfig) -> Result<Self> {
        let service: Arc<dyn CompletionService> =
            Arc::new(HttpCompletionService::from_config(&config.provider)?);
        Ok(Self::with_service(config, service))
    }

    /// Same wiring as [`from_config`](Self::from_config) around a given service.
    pub fn with_service(config: &StudyConfig, service: Arc<dyn CompletionService>) -> Self {
        let invoker = RetryingInvoker::new(service, config.retry.policy());
        let cache = Arc::new(ResponseCache::from_settings(&config.cache));
        Self::new(cache, invoker).with_defaults(InvocationDefaults {
            timeout: config.provider.timeout(),
            temperature: Some(config.provider.temperature),
            max_tokens: Some(config.provider.max_tokens),
        })
    }

    pub fn with_deriver(mut self, deriver: KeyDeriver) -> Self {
        self.deriver = deriver;
        self
    }

    pub fn with_defaults(mut self, defaults: InvocationDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn deriver(&self) -> &KeyDeriver {
        &self.deriver
    }

    pub async fn run(
        &self,
        prompt: impl Into<Prompt>,
        model_id: &str,
        spec: &RecordSpec,
        max_attempts: u32,
        use_cache: bool,
    ) -> PipelineOutcome {
        let request = PipelineRequest::new(prompt, model_id)
            .with_max_attempts(max_attempts)
            .with_cache(use_cache);
        self.run_request(&request, spec).await
    }

    pub async fn run_request(&self, request: &PipelineRequest, spec: &RecordSpec) -> PipelineOutcome {
        let text = self.run_text_request(request).await;
        // Cached raw text is re-parsed every time so parser fixes apply to old entries.
        let record = match text.text {
            Some(ref raw) => self.parser.parse(raw, spec),
            None => self.parser.fallback(spec),
        };
        if record.is_fallback && text.error.is_none() {
            debug!(
                spec = spec.name(),
                missing = ?record.missing,
                "reply parsed with defaults"
            );
        }
        PipelineOutcome {
            record,
            from_cache: text.from_cache,
            error: text.error,
        }
    }

    pub async fn run_text(
        &self,
        prompt: impl Into<Prompt>,
        model_id: &str,
        max_attempts: u32,
        use_cache: bool,
    ) -> TextOutcome {
        let request = PipelineRequest::new(prompt, model_id)
            .with_max_attempts(max_attempts)
            .with_cache(use_cache);
        self.run_text_request(&request).await
    }

    pub async fn run_text_request(&self, request: &PipelineRequest) -> TextOutcome {
        let system = request.system.as_deref();
        let key = request.use_cache.then(|| self.cache_key(request));

        if let Some(ref key) = key {
            if let Some(text) = self.cache.get(key).await {
                debug!(key = key.as_str(), "serving cached response");
                return TextOutcome {
                    text: Some(text),
                    from_cache: true,
                    error: None,
                };
            }
        }

        let mut invocation =
            InvocationRequest::from_messages(request.prompt.messages(system), request.model_id.as_str())
                .with_max_attempts(request.max_attempts)
                .with_timeout(request.timeout.unwrap_or(self.defaults.timeout));
        if let Some(t) = request.temperature.or(self.defaults.temperature) {
            invocation = invocation.with_temperature(t);
        }
        if let Some(n) = request.max_tokens.or(self.defaults.max_tokens) {
            invocation = invocation.with_max_tokens(n);
        }

        match self.invoker.invoke(&invocation).await {
            Ok(text) => {
                if let Some(ref key) = key {
                    self.cache.set(key, &text).await;
                }
                info!(
                    model = request.model_id.as_str(),
                    bytes = text.len(),
                    cached = key.is_some(),
                    "generated response"
                );
                TextOutcome {
                    text: Some(text),
                    from_cache: false,
                    error: None,
                }
            }
            Err(e) => {
                warn!(model = request.model_id.as_str(), error = %e, "generation failed");
                TextOutcome {
                    text: None,
                    from_cache: false,
                    error: Some(e),
                }
            }
        }
    }

    /// Key under which the raw reply to `request` is cached.
    pub fn cache_key(&self, request: &PipelineRequest) -> CacheKey {
        let system = request.system.as_deref();
        self.deriver
            .derive(&request.prompt.cache_text(system), &request.model_id)
    }

    /// Drop the cached reply for `request`, e.g. after the caller found it unusable.
    pub async fn forget(&self, request: &PipelineRequest) -> bool {
        let key = self.cache_key(request);
        let removed = self.cache.delete(&key).await;
        if removed {
            debug!(key = key.as_str(), "discarded cached response");
        }
        removed
    }

    pub async fn clear_cache(&self) -> Result<usize> {
        self.cache.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, MemoryCache};
    use crate::provider::{CompletionRequest, FailureClass, ProviderFailure};
    use crate::resilience::RetryPolicy;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays canned results and records every request.
    struct Scripted {
        replies: Mutex<Vec<std::result::Result<String, ProviderFailure>>>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl Scripted {
        fn new(replies: Vec<std::result::Result<String, ProviderFailure>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionService for Scripted {
        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> std::result::Result<String, ProviderFailure> {
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

    fn orchestrator(service: Arc<Scripted>) -> PipelineOrchestrator {
        let cache = Arc::new(ResponseCache::new(
            CacheConfig::default(),
            Box::new(MemoryCache::new(64)),
        ));
        PipelineOrchestrator::new(cache, RetryingInvoker::new(service, RetryPolicy::no_delay()))
    }

    const MCQ: &str = "Question: What is 2+2?\nA: 3\nB: 4\nC: 5\nD: 6\nCorrect Answer: B";

    #[tokio::test]
    async fn miss_then_hit() {
        let svc = Scripted::new(vec![Ok(MCQ.to_string())]);
        let p = orchestrator(svc.clone());
        let spec = RecordSpec::multiple_choice();

        let first = p.run("q", "m", &spec, 3, true).await;
        assert!(!first.from_cache);
        assert!(first.error.is_none());
        let second = p.run("q", "m", &spec, 3, true).await;
        assert!(second.from_cache);
        assert_eq!(first.record, second.record);
        assert_eq!(svc.calls(), 1);
    }

    #[tokio::test]
    async fn use_cache_false_skips_lookup_and_store() {
        let svc = Scripted::new(vec![Ok(MCQ.to_string()), Ok(MCQ.to_string())]);
        let p = orchestrator(svc.clone());
        let spec = RecordSpec::multiple_choice();

        p.run("q", "m", &spec, 1, false).await;
        p.run("q", "m", &spec, 1, false).await;
        assert_eq!(svc.calls(), 2);
        assert_eq!(p.cache().len().await, 0);
    }

    #[tokio::test]
    async fn failures_yield_fallback_and_are_not_cached() {
        let svc = Scripted::new(vec![
            Err(ProviderFailure::new(FailureClass::RateLimited, "slow down")),
            Err(ProviderFailure::new(FailureClass::RateLimited, "slow down")),
        ]);
        let p = orchestrator(svc.clone());
        let out = p.run("q", "m", &RecordSpec::multiple_choice(), 2, true).await;

        assert!(out.is_fallback());
        assert!(out.error.as_ref().unwrap().is_exhausted());
        assert_eq!(out.record.record.as_multiple_choice().unwrap().correct_label, "A");
        assert!(out.warning().is_some());
        assert_eq!(p.cache().len().await, 0);
    }

    #[tokio::test]
    async fn system_prompt_and_defaults_reach_the_service() {
        let svc = Scripted::new(vec![Ok("hi".to_string())]);
        let p = orchestrator(svc.clone()).with_defaults(InvocationDefaults {
            timeout: Duration::from_secs(5),
            temperature: Some(0.2),
            max_tokens: Some(64),
        });
        let req = PipelineRequest::new("hello", "m").with_system("be brief");
        let out = p.run_text_request(&req).await;
        assert_eq!(out.text.as_deref(), Some("hi"));

        let seen = svc.seen.lock().unwrap();
        assert_eq!(seen[0].messages.len(), 2);
        assert_eq!(seen[0].messages[0].content, "be brief");
        assert_eq!(seen[0].temperature, Some(0.2));
        assert_eq!(seen[0].max_tokens, Some(64));
    }

    #[tokio::test]
    async fn forget_drops_only_that_request() {
        let svc = Scripted::new(vec![Ok("one".into()), Ok("two".into()), Ok("three".into())]);
        let p = orchestrator(svc.clone());
        let a = PipelineRequest::new("a", "m");
        let b = PipelineRequest::new("b", "m");
        p.run_text_request(&a).await;
        p.run_text_request(&b).await;

        assert!(p.forget(&a).await);
        assert!(!p.forget(&a).await);
        assert_eq!(p.run_text_request(&a).await.text.as_deref(), Some("three"));
        assert!(p.run_text_request(&b).await.from_cache);
        assert_eq!(svc.calls(), 3);
    }

    #[test]
    fn system_prompt_changes_cache_text() {
        let prompt = Prompt::from("hello");
        assert_eq!(prompt.cache_text(None), "hello");
        assert_ne!(prompt.cache_text(Some("sys")), "hello");
    }
}
