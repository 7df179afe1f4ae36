//! 类型模块：定义对话消息等基础数据类型。
//!
//! # Types Module
//!
//! Core value types shared by the completion service, the pipeline and chat sessions.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ChatMessage`] | Chat message with role and text content |
//! | [`MessageRole`] | Message role (system, user, assistant) |

pub mod message;

pub use message::{ChatMessage, MessageRole};
