use crate::config::ProviderConfig;
use crate::provider::{CompletionRequest, CompletionService, FailureClass, ProviderFailure};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Proxy;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Longest error body excerpt kept in a failure message.
const MAX_ERROR_EXCERPT: usize = 300;

pub struct HttpCompletionService {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpCompletionService {
    /// Build a client for `config`. Without an API key the service still
    /// builds, but every call fails with a non-retryable authentication failure.
    pub fn new(config: &ProviderConfig, api_key: Option<String>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout())
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Some(ref proxy_url) = config.proxy_url {
            let proxy = Proxy::all(proxy_url).map_err(|e| {
                Error::configuration_with_context(
                    format!("invalid proxy url: {}", e),
                    ErrorContext::new()
                        .with_field_path("provider.proxy_url")
                        .with_details(proxy_url.clone()),
                )
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|e| {
            Error::configuration_with_context(
                format!("failed to build HTTP client: {}", e),
                ErrorContext::new().with_source("http_transport"),
            )
        })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Resolve credentials first; a missing key is reported here, before any call.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let key = config.resolve_api_key()?;
        Self::new(config, Some(key))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_failure(e: reqwest::Error) -> ProviderFailure {
        if e.is_timeout() {
            ProviderFailure::new(FailureClass::Timeout, e.to_string())
        } else {
            ProviderFailure::network(e.to_string())
        }
    }
}

#[async_trait]
impl CompletionService for HttpCompletionService {
    async fn complete(&self, request: &CompletionRequest) -> std::result::Result<String, ProviderFailure> {
        let Some(ref key) = self.api_key else {
            return Err(ProviderFailure::authentication("no API key configured"));
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(key)
            .json(request)
            .send()
            .await
            .map_err(Self::request_failure)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.text().await.map_err(Self::request_failure)?;

        if !(200..300).contains(&status) {
            let mut failure = classify_error(status, &body);
            if let Some(after) = retry_after {
                failure = failure.with_retry_after(after);
            }
            debug!(status, class = failure.class.name(), "completion request failed");
            return Err(failure);
        }

        extract_content(&body)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// `retry-after` in (possibly fractional) seconds. HTTP-date forms, negative
/// and out-of-range values are ignored.
fn parse_retry_after(raw: &str) -> Option<Duration> {
    let secs: f64 = raw.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

fn classify_error(status: u16, body: &str) -> ProviderFailure {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));

    let code_class = error.and_then(|e| {
        ["code", "type"]
            .iter()
            .filter_map(|f| e.get(*f).and_then(Value::as_str))
            .find_map(FailureClass::from_provider_code)
    });
    let class = code_class.unwrap_or_else(|| FailureClass::from_http_status(status));

    let message = error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.chars().take(MAX_ERROR_EXCERPT).collect());

    ProviderFailure::new(class, message).with_status(status)
}

fn extract_content(body: &str) -> std::result::Result<String, ProviderFailure> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        ProviderFailure::new(
            FailureClass::MalformedResponse,
            format!("response is not JSON: {}", e),
        )
    })?;
    let content = value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ProviderFailure::new(
                FailureClass::MalformedResponse,
                "response has no choices[0].message.content",
            )
        })?;
    let content = content.trim();
    if content.is_empty() {
        return Err(ProviderFailure::new(
            FailureClass::EmptyResponse,
            "model returned empty content",
        ));
    }
    Ok(content.to_string())
}
