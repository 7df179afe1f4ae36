use crate::error::InvocationError;
use crate::structured::ParsedRecord;
use crate::types::ChatMessage;
use std::time::Duration;

/// What is sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    Text(String),
    Messages(Vec<ChatMessage>),
}

impl Prompt {
    /// Messages for invocation, with `system` prepended when given.
    pub fn messages(&self, system: Option<&str>) -> Vec<ChatMessage> {
        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(ChatMessage::system(system));
        }
        match self {
            Self::Text(text) => messages.push(ChatMessage::user(text.clone())),
            Self::Messages(list) => messages.extend(list.iter().cloned()),
        }
        messages
    }

    /// Text the cache key is derived from. A bare text prompt is used as-is;
    /// anything with structure is keyed by its JSON message list.
    pub fn cache_text(&self, system: Option<&str>) -> String {
        match (self, system) {
            (Self::Text(text), None) => text.clone(),
            _ => serde_json::to_string(&self.messages(system))
                .unwrap_or_else(|_| format!("{:?}", self.messages(system))),
        }
    }
}

impl From<&str> for Prompt {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Prompt {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<ChatMessage>> for Prompt {
    fn from(messages: Vec<ChatMessage>) -> Self {
        Self::Messages(messages)
    }
}

/// Full-control pipeline input. Unset knobs use the orchestrator defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRequest {
    pub prompt: Prompt,
    pub system: Option<String>,
    pub model_id: String,
    pub max_attempts: u32,
    pub use_cache: bool,
    pub timeout: Option<Duration>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl PipelineRequest {
    pub fn new(prompt: impl Into<Prompt>, model_id: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            model_id: model_id.into(),
            max_attempts: 3,
            use_cache: true,
            timeout: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
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
}

/// Result of a parsed run. `record` is always usable.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub record: ParsedRecord,
    pub from_cache: bool,
    /// Set when every attempt failed; `record` is then the fallback record.
    pub error: Option<InvocationError>,
}

impl PipelineOutcome {
    pub fn is_fallback(&self) -> bool {
        self.record.is_fallback
    }

    /// Message to show next to the record, if any.
    pub fn warning(&self) -> Option<String> {
        if let Some(ref e) = self.error {
            return Some(e.user_message());
        }
        self.record
            .is_fallback
            .then(|| "The response was incomplete; some fields were filled with defaults.".to_string())
    }
}

/// Result of an unparsed run.
#[derive(Debug, Clone, PartialEq)]
pub struct TextOutcome {
    pub text: Option<String>,
    pub from_cache: bool,
    pub error: Option<InvocationError>,
}

impl TextOutcome {
    /// The reply, or a retry-prompting message.
    pub fn text_or_message(&self) -> String {
        match (&self.text, &self.error) {
            (Some(text), _) => text.clone(),
            (None, Some(e)) => e.user_message(),
            (None, None) => "No response was produced. Please try again.".to_string(),
        }
    }
}
