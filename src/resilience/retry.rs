use crate::error::{InvocationError, InvocationErrorKind};
use crate::provider::{CompletionRequest, CompletionService, ProviderFailure};
use crate::types::ChatMessage;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff schedule between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(1),
            Duration::from_secs(30),
            Duration::from_secs(1),
        )
    }
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_jitter: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            max_jitter,
        }
    }

    /// Retries immediately. Useful in tests and batch tools.
    pub fn no_delay() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, Duration::ZERO)
    }

    /// Delay without jitter after the failed attempt with 0-based index `attempt`.
    pub fn base_backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exponential = if self.base_delay.is_zero() {
            Duration::ZERO
        } else {
            // base * 2^attempt
            let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
            self.base_delay.saturating_mul(factor)
        };
        retry_after.unwrap_or(exponential).min(self.max_delay)
    }

    pub fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        self.base_backoff(attempt, retry_after) + self.jitter()
    }

    fn jitter(&self) -> Duration {
        let max = self.max_jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max))
    }
}

/// One logical generation request, attempted up to `max_attempts` times.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    pub messages: Vec<ChatMessage>,
    pub model_id: String,
    pub max_attempts: u32,
    /// Bound on each individual attempt.
    pub timeout: Duration,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl InvocationRequest {
    pub fn new(prompt: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self::from_messages(vec![ChatMessage::user(prompt)], model_id)
    }

    pub fn from_messages(messages: Vec<ChatMessage>, model_id: impl Into<String>) -> Self {
        Self {
            messages,
            model_id: model_id.into(),
            max_attempts: 3,
            timeout: Duration::from_secs(30),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Values below 1 are raised to 1.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn to_completion_request(&self) -> CompletionRequest {
        CompletionRequest {
            model: self.model_id.clone(),
            messages: self.messages.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// What happened during one [`RetryingInvoker::invoke_with_state`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryState {
    /// Calls made to the completion service.
    pub attempt: u32,
    pub last_error: Option<ProviderFailure>,
    /// Total time spent sleeping between attempts.
    pub total_delay: Duration,
}

#[derive(Clone)]
pub struct RetryingInvoker {
    service: Arc<dyn CompletionService>,
    policy: RetryPolicy,
}

impl RetryingInvoker {
    pub fn new(service: Arc<dyn CompletionService>, policy: RetryPolicy) -> Self {
        Self { service, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn service_name(&self) -> &'static str {
        self.service.name()
    }

    pub async fn invoke(&self, request: &InvocationRequest) -> Result<String, InvocationError> {
        self.invoke_with_state(request).await.0
    }

    pub async fn invoke_with_state(
        &self,
        request: &InvocationRequest,
    ) -> (Result<String, InvocationError>, RetryState) {
        let max_attempts = request.max_attempts.max(1);
        let completion = request.to_completion_request();
        let mut state = RetryState::default();

        loop {
            state.attempt += 1;
            let outcome =
                match tokio::time::timeout(request.timeout, self.service.complete(&completion))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ProviderFailure::timeout(request.timeout)),
                };

            let failure = match outcome {
                Ok(text) => {
                    debug!(
                        service = self.service.name(),
                        model = request.model_id.as_str(),
                        attempt = state.attempt,
                        bytes = text.len(),
                        "completion succeeded"
                    );
                    return (Ok(text), state);
                }
                Err(failure) => failure,
            };

            if !failure.retryable() {
                let kind = if failure.class.is_credential() {
                    InvocationErrorKind::Configuration
                } else {
                    InvocationErrorKind::Rejected
                };
                warn!(
                    service = self.service.name(),
                    attempt = state.attempt,
                    class = failure.class.name(),
                    error = %failure,
                    "non-retryable completion failure"
                );
                let err = InvocationError::new(kind, state.attempt, Some(failure.clone()));
                state.last_error = Some(failure);
                return (Err(err), state);
            }

            if state.attempt >= max_attempts {
                warn!(
                    service = self.service.name(),
                    attempts = state.attempt,
                    error = %failure,
                    "completion attempts exhausted"
                );
                let err = InvocationError::new(
                    InvocationErrorKind::Exhausted,
                    state.attempt,
                    Some(failure.clone()),
                );
                state.last_error = Some(failure);
                return (Err(err), state);
            }

            let delay = self.policy.backoff(state.attempt - 1, failure.retry_after);
            warn!(
                service = self.service.name(),
                attempt = state.attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                class = failure.class.name(),
                error = %failure,
                "transient completion failure, retrying"
            );
            state.last_error = Some(failure);
            state.total_delay += delay;
            tokio::time::sleep(delay).await;
        }
    }
}
