use crate::provider::ProviderFailure;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "provider.base_url", "plan.kinds")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_loader", "quiz_plan")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// How an invocation ultimately failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvocationErrorKind {
    /// Missing or rejected credentials. Never retried.
    Configuration,
    /// The upstream refused the request itself (bad parameters, unknown model, oversized input).
    /// Never retried: the same request fails the same way.
    Rejected,
    /// Every allowed attempt failed with a transient error.
    Exhausted,
}

impl InvocationErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Rejected => "rejected",
            Self::Exhausted => "exhausted",
        }
    }
}

impl std::fmt::Display for InvocationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a [`RetryingInvoker`](crate::resilience::RetryingInvoker) call.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invocation {kind} after {attempts} attempt(s){}", format_cause(.last_cause))]
pub struct InvocationError {
    pub kind: InvocationErrorKind,
    /// Number of calls actually made to the completion service.
    pub attempts: u32,
    /// Most recent underlying failure, kept for diagnostics.
    pub last_cause: Option<ProviderFailure>,
}

impl InvocationError {
    pub fn new(kind: InvocationErrorKind, attempts: u32, last_cause: Option<ProviderFailure>) -> Self {
        Self {
            kind,
            attempts,
            last_cause,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.kind == InvocationErrorKind::Exhausted
    }

    pub fn is_configuration(&self) -> bool {
        self.kind == InvocationErrorKind::Configuration
    }

    /// Short message suitable for showing next to a fallback record.
    pub fn user_message(&self) -> String {
        match self.kind {
            InvocationErrorKind::Configuration => {
                "The AI service is not configured correctly (check the API key).".to_string()
            }
            InvocationErrorKind::Rejected => {
                "The AI service rejected this request. Adjust the input and try again.".to_string()
            }
            InvocationErrorKind::Exhausted => {
                "The AI service is temporarily unavailable. Please try again.".to_string()
            }
        }
    }
}

fn format_cause(cause: &Option<ProviderFailure>) -> String {
    match cause {
        Some(c) => format!(": {}", c),
        None => String::new(),
    }
}

/// Unified error type for the crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Invocation error: {0}")]
    Invocation(#[from] InvocationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } | Error::Validation { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }

    /// Whether the calling layer should show this as a configuration problem.
    pub fn is_configuration(&self) -> bool {
        match self {
            Error::Configuration { .. } => true,
            Error::Invocation(e) => e.is_configuration(),
            _ => false,
        }
    }
}
