//! 补全服务模块：定义外部大模型补全服务的抽象接口。
//!
//! # Completion Service Module
//!
//! The crate treats the large-language-model API as an opaque request/response
//! service. [`CompletionService`] is the seam: the HTTP implementation lives in
//! [`crate::transport`], tests plug in stubs.
//!
//! A service performs exactly one attempt per call and reports failures as a
//! classified [`ProviderFailure`]; retries, timeouts and backoff belong to
//! [`crate::resilience::RetryingInvoker`].

mod failure;

pub use failure::{FailureClass, ProviderFailure};

use crate::types::ChatMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Provider-level request for a single chat completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A text-completion backend. One call = one attempt.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Returns the generated text, or a classified failure.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderFailure>;

    fn name(&self) -> &'static str;
}
