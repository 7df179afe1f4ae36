//! Classification of single-attempt failures reported by a completion service.
//!
//! Every failed call is reduced to a [`FailureClass`], which decides whether the
//! retrying invoker may try again.
//!
//! | Class | Retryable | Typical cause |
//! |-------|-----------|---------------|
//! | `Network` | yes | connection refused, DNS, reset |
//! | `Timeout` | yes | attempt exceeded its deadline, HTTP 408/504 |
//! | `RateLimited` | yes | HTTP 429 |
//! | `ServerError` | yes | HTTP 500 and other 5xx |
//! | `Overloaded` | yes | HTTP 503/529 |
//! | `MalformedResponse` | yes | body is not the expected JSON shape |
//! | `EmptyResponse` | yes | completion text is empty |
//! | `Authentication` | no | missing/invalid API key, HTTP 401 |
//! | `PermissionDenied` | no | HTTP 403 |
//! | `InvalidRequest` | no | HTTP 400 |
//! | `NotFound` | no | unknown model or endpoint, HTTP 404 |
//! | `RequestTooLarge` | no | prompt exceeds context window, HTTP 413 |
//! | `Unknown` | no | anything else |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Network,
    Timeout,
    RateLimited,
    ServerError,
    Overloaded,
    MalformedResponse,
    EmptyResponse,
    Authentication,
    PermissionDenied,
    InvalidRequest,
    NotFound,
    RequestTooLarge,
    Unknown,
}

impl FailureClass {
    /// Returns the standard name (e.g., `"rate_limited"`).
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::Overloaded => "overloaded",
            Self::MalformedResponse => "malformed_response",
            Self::EmptyResponse => "empty_response",
            Self::Authentication => "authentication",
            Self::PermissionDenied => "permission_denied",
            Self::InvalidRequest => "invalid_request",
            Self::NotFound => "not_found",
            Self::RequestTooLarge => "request_too_large",
            Self::Unknown => "unknown",
        }
    }

    /// Returns whether another attempt can reasonably succeed.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::Network
                | Self::Timeout
                | Self::RateLimited
                | Self::ServerError
                | Self::Overloaded
                | Self::MalformedResponse
                | Self::EmptyResponse
        )
    }

    /// Credential problems: surfaced as configuration errors, never retried.
    #[inline]
    pub fn is_credential(&self) -> bool {
        matches!(self, Self::Authentication | Self::PermissionDenied)
    }

    /// Maps an HTTP status code to the most likely class.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::InvalidRequest,
            401 => Self::Authentication,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            408 | 504 => Self::Timeout,
            413 => Self::RequestTooLarge,
            429 => Self::RateLimited,
            503 | 529 => Self::Overloaded,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Maps a provider error code/type string (OpenAI/Groq `error.code` or `error.type`).
    pub fn from_provider_code(code: &str) -> Option<Self> {
        let class = match code {
            "invalid_api_key" | "authentication_error" | "invalid_authentication" => {
                Self::Authentication
            }
            "permission_error" | "permission_denied" => Self::PermissionDenied,
            "invalid_request_error" | "invalid_request" => Self::InvalidRequest,
            "model_not_found" | "model_decommissioned" | "not_found" => Self::NotFound,
            "context_length_exceeded" | "request_too_large" => Self::RequestTooLarge,
            "rate_limit_exceeded" | "rate_limited" | "tokens" | "requests" => Self::RateLimited,
            "server_error" | "internal_error" => Self::ServerError,
            "overloaded" | "overloaded_error" | "service_unavailable" => Self::Overloaded,
            _ => return None,
        };
        Some(class)
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One failed attempt against the completion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub class: FailureClass,
    pub message: String,
    /// HTTP status, when the failure came from a response.
    pub status: Option<u16>,
    /// Server-provided retry hint (`retry-after`).
    pub retry_after: Option<Duration>,
}

impl ProviderFailure {
    pub fn new(class: FailureClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
            status: None,
            retry_after: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureClass::Network, message)
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            FailureClass::Timeout,
            format!("attempt timed out after {} ms", after.as_millis()),
        )
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(FailureClass::Authentication, message)
    }

    pub fn retryable(&self) -> bool {
        self.class.retryable()
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {}): {}", self.class, status, self.message),
            None => write!(f, "{}: {}", self.class, self.message),
        }
    }
}

impl std::error::Error for ProviderFailure {}
