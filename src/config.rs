//! Runtime configuration.
//!
//! Configuration is loaded from an optional YAML file and then overridden by
//! environment variables. Every section is defaulted so an empty file (or no
//! file at all) yields a working setup, as long as an API key is available.
//!
//! ```yaml
//! provider:
//!   base_url: https://api.groq.com/openai/v1
//!   model: llama-3.3-70b-versatile
//!   api_key_env: GROQ_API_KEY
//!   timeout_secs: 30
//! retry:
//!   max_attempts: 3
//!   base_delay_ms: 1000
//! cache:
//!   dir: ./response_cache
//! ```
//!
//! Environment overrides: `SMARTSTUDY_BASE_URL`, `SMARTSTUDY_MODEL`,
//! `SMARTSTUDY_TIMEOUT_SECS`, `SMARTSTUDY_MAX_ATTEMPTS`, `SMARTSTUDY_CACHE_DIR`,
//! `SMARTSTUDY_CACHE_ENABLED`, `SMARTSTUDY_PROXY_URL`.

use crate::resilience::RetryPolicy;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Fallback env var consulted after the provider-specific one.
pub const GENERIC_API_KEY_ENV: &str = "SMARTSTUDY_API_KEY";

const KEYRING_SERVICE: &str = "smartstudy";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    pub provider: ProviderConfig,
    pub retry: RetrySettings,
    pub cache: CacheSettings,
    pub quiz: QuizSettings,
}

/// Where the API key is looked up after the environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    #[default]
    Env,
    Keyring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Identifier used for keyring lookups and logging.
    pub id: String,
    /// OpenAI-compatible API root; `/chat/completions` is appended.
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub credential_source: CredentialSource,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
    pub proxy_url: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            id: "groq".to_string(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            credential_source: CredentialSource::Env,
            timeout_secs: 30,
            temperature: 0.7,
            max_tokens: 500,
            proxy_url: None,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Resolve the API key from the process environment (and keyring, if configured).
    ///
    /// A missing key is a configuration error and is reported immediately.
    pub fn resolve_api_key(&self) -> Result<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    /// Same as [`resolve_api_key`](Self::resolve_api_key) with an injectable env lookup.
    pub fn resolve_api_key_with<F>(&self, lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_env = [self.api_key_env.as_str(), GENERIC_API_KEY_ENV]
            .into_iter()
            .filter(|name| !name.is_empty())
            .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()));
        if let Some(key) = from_env {
            return Ok(key.trim().to_string());
        }

        if self.credential_source == CredentialSource::Keyring {
            if let Some(key) = self.keyring_key() {
                return Ok(key);
            }
        }

        Err(Error::configuration_with_context(
            format!(
                "no API key found for provider '{}' (set {} or {})",
                self.id, self.api_key_env, GENERIC_API_KEY_ENV
            ),
            ErrorContext::new()
                .with_field_path("provider.api_key_env")
                .with_source("credentials"),
        ))
    }

    fn keyring_key(&self) -> Option<String> {
        let entry = keyring::Entry::new(KEYRING_SERVICE, &self.id).ok()?;
        match entry.get_password() {
            Ok(key) if !key.trim().is_empty() => Some(key.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                debug!(provider = self.id.as_str(), error = %e, "keyring lookup failed");
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_jitter_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_jitter_ms: 1_000,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            Duration::from_millis(self.max_jitter_ms),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub dir: PathBuf,
    pub max_entry_bytes: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("./response_cache"),
            max_entry_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizSettings {
    /// Attempts to obtain a question not already in the quiz.
    pub unique_attempts: u32,
    /// Time limit for taking a quiz; 0 means untimed.
    pub default_minutes: u64,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            unique_attempts: 5,
            default_minutes: 15,
        }
    }
}

impl QuizSettings {
    pub fn time_limit(&self) -> Option<Duration> {
        (self.default_minutes > 0).then(|| Duration::from_secs(self.default_minutes * 60))
    }
}

impl StudyConfig {
    /// Load from a YAML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read config file: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("config_loader"),
            )
        })?;
        let mut config = Self::from_yaml_str(&raw)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an injectable lookup. Unparseable values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SMARTSTUDY_BASE_URL") {
            self.provider.base_url = v;
        }
        if let Some(v) = lookup("SMARTSTUDY_MODEL") {
            self.provider.model = v;
        }
        if let Some(v) = lookup("SMARTSTUDY_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.provider.timeout_secs = v;
        }
        if let Some(v) = lookup("SMARTSTUDY_PROXY_URL") {
            self.provider.proxy_url = Some(v);
        }
        if let Some(v) = lookup("SMARTSTUDY_MAX_ATTEMPTS").and_then(|s| s.parse().ok()) {
            self.retry.max_attempts = v;
        }
        if let Some(v) = lookup("SMARTSTUDY_CACHE_DIR") {
            self.cache.dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SMARTSTUDY_CACHE_ENABLED").and_then(|s| parse_bool(&s)) {
            self.cache.enabled = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.provider.base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base URL: {}", e),
                ErrorContext::new()
                    .with_field_path("provider.base_url")
                    .with_details(self.provider.base_url.clone())
                    .with_source("config_loader"),
            )
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::configuration_with_context(
                "base URL must use http or https",
                ErrorContext::new()
                    .with_field_path("provider.base_url")
                    .with_source("config_loader"),
            ));
        }
        if self.provider.model.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "model must not be empty",
                ErrorContext::new()
                    .with_field_path("provider.model")
                    .with_source("config_loader"),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::configuration_with_context(
                "max_attempts must be at least 1",
                ErrorContext::new()
                    .with_field_path("retry.max_attempts")
                    .with_source("config_loader"),
            ));
        }
        Ok(())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
