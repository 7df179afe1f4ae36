//! 会话模块：显式的学习会话对象，承载聊天记录与测验进度。
//!
//! # Session Module
//!
//! A [`StudySession`] is owned by the caller (one per user session) and
//! passed by `&mut` into each handler. It holds typed state only: the chat
//! history, the current chat selection and an optional quiz in progress.

mod assistant;
mod chat;

pub use assistant::{ChatAssistant, DEFAULT_SYSTEM_PROMPT};
pub use chat::{chat_title, Chat, ChatHistory, MAX_CONTEXT_MESSAGES};

use crate::quiz::QuizSession;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StudySession {
    pub id: String,
    pub model: String,
    pub use_cache: bool,
    /// Messages of history sent with each chat turn.
    pub context_window: usize,
    pub chats: ChatHistory,
    pub current_chat: Option<String>,
    pub quiz: Option<QuizSession>,
}

impl StudySession {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            model: model.into(),
            use_cache: true,
            context_window: MAX_CONTEXT_MESSAGES,
            chats: ChatHistory::new(),
            current_chat: None,
            quiz: None,
        }
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Create a chat and make it current.
    pub fn new_chat(&mut self) -> String {
        let id = self.chats.create_chat();
        self.current_chat = Some(id.clone());
        id
    }

    /// The current chat id, creating a chat when there is none.
    pub fn ensure_chat(&mut self) -> String {
        if let Some(id) = self.current_chat.clone() {
            if self.chats.get(&id).is_some() {
                return id;
            }
        }
        self.new_chat()
    }

    pub fn select_chat(&mut self, id: &str) -> bool {
        if self.chats.get(id).is_some() {
            self.current_chat = Some(id.to_string());
            true
        } else {
            false
        }
    }

    /// Delete a chat; clears the selection when it was current.
    pub fn delete_chat(&mut self, id: &str) -> bool {
        if self.current_chat.as_deref() == Some(id) {
            self.current_chat = None;
        }
        self.chats.delete_chat(id)
    }

    pub fn current(&self) -> Option<&Chat> {
        self.current_chat.as_deref().and_then(|id| self.chats.get(id))
    }
}
