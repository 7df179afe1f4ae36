//! # smartstudy
//!
//! SmartStudy 学习工具的核心库：提示词响应缓存、带重试的模型调用与结构化文本解析。
//!
//! Prompt-response cache and retry pipeline behind the SmartStudy study tools
//! (quiz generator, chat assistant, mind mapper).
//!
//! ## Overview
//!
//! Every feature turns a prompt into a model reply and usually parses that
//! reply into a typed record. This crate owns that path:
//!
//! - **Caching**: replies are persisted under a key derived from the prompt
//!   and the model id, so repeated prompts are served without a network call.
//! - **Retrying**: transient failures (timeouts, rate limits, 5xx) are retried
//!   with exponential backoff; credential problems fail fast.
//! - **Tolerant parsing**: free-form "Field: value" replies become typed records;
//!   missing fields get defaults and the record is flagged as a fallback.
//!
//! Nothing on this path returns an error to the UI for a model failure: the
//! caller always gets a record (possibly the fallback) plus a warning.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smartstudy::pipeline::PipelineOrchestrator;
//! use smartstudy::structured::RecordSpec;
//! use smartstudy::StudyConfig;
//!
//! #[tokio::main]
//! async fn main() -> smartstudy::Result<()> {
//!     let config = StudyConfig::from_env()?;
//!     let pipeline = PipelineOrchestrator::from_config(&config)?;
//!
//!     let outcome = pipeline
//!         .run(
//!             "Generate a multiple choice question about binary search.",
//!             &config.provider.model,
//!             &RecordSpec::multiple_choice(),
//!             3,
//!             true,
//!         )
//!         .await;
//!     if let Some(warning) = outcome.warning() {
//!         eprintln!("{warning}");
//!     }
//!     println!("{:?}", outcome.record.record);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Key derivation and the best-effort response cache |
//! | [`resilience`] | Retry policy and the retrying invoker |
//! | [`structured`] | Tolerant "Field: value" and JSON reply parsing |
//! | [`pipeline`] | Cache → invoke → parse orchestration |
//! | [`provider`] | Completion service seam and failure classification |
//! | [`transport`] | OpenAI-compatible HTTP completion service |
//! | [`quiz`] | Quiz planning, generation, timing and scoring |
//! | [`session`] | Study sessions, chat history and the chat assistant |
//! | [`mindmap`] | Mind map parsing and graph flattening |
//! | [`document`] | Chunk ranking and question answering over documents |
//! | [`config`] | YAML + environment configuration |

pub mod cache;
pub mod config;
pub mod document;
pub mod mindmap;
pub mod pipeline;
pub mod provider;
pub mod quiz;
pub mod resilience;
pub mod session;
pub mod structured;
pub mod transport;
pub mod types;

/// Error type for the library
pub mod error;

pub use cache::{CacheKey, KeyDeriver, ResponseCache};
pub use config::StudyConfig;
pub use error::{Error, ErrorContext, InvocationError, InvocationErrorKind};
pub use pipeline::{PipelineOrchestrator, PipelineOutcome, PipelineRequest, TextOutcome};
pub use resilience::{RetryPolicy, RetryingInvoker};
pub use structured::{ParsedRecord, Record, RecordSpec, StructuredTextParser};
pub use types::{ChatMessage, MessageRole};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
