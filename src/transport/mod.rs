//! 传输层模块：OpenAI 兼容的聊天补全 HTTP 客户端。
//!
//! # Transport Module
//!
//! [`HttpCompletionService`] posts `{model, messages, temperature, max_tokens}`
//! to `<base_url>/chat/completions` and reads `choices[0].message.content`
//! from the reply. Any OpenAI-compatible endpoint works (Groq by default).
//!
//! Each call is a single attempt. HTTP status codes and provider error codes
//! are mapped onto [`FailureClass`](crate::provider::FailureClass) so the
//! retry layer can decide what to do next.

mod http;

pub use http::HttpCompletionService;
