use crate::types::ChatMessage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Messages kept in the context window by default.
pub const MAX_CONTEXT_MESSAGES: usize = 10;
const TITLE_CHARS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub title: String,
    pub messages: Vec<ChatMessage>,
}

/// Chats keyed by generated id, in creation order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatHistory {
    chats: HashMap<String, Chat>,
    order: Vec<String>,
    created: usize,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// New empty chat titled `New Chat <n>`; returns its id.
    pub fn create_chat(&mut self) -> String {
        self.created += 1;
        let id = Uuid::new_v4().to_string();
        self.chats.insert(
            id.clone(),
            Chat {
                id: id.clone(),
                title: format!("New Chat {}", self.created),
                messages: Vec::new(),
            },
        );
        self.order.push(id.clone());
        id
    }

    pub fn delete_chat(&mut self, id: &str) -> bool {
        self.order.retain(|c| c != id);
        self.chats.remove(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&Chat> {
        self.chats.get(id)
    }

    /// Chats in creation order.
    pub fn chats(&self) -> impl Iterator<Item = &Chat> {
        self.order.iter().filter_map(|id| self.chats.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Append to a chat. The first user message becomes the title.
    /// Returns `false` for an unknown chat.
    pub fn push(&mut self, id: &str, message: ChatMessage) -> bool {
        let Some(chat) = self.chats.get_mut(id) else {
            return false;
        };
        if message.is_user() && !chat.messages.iter().any(ChatMessage::is_user) {
            chat.title = chat_title(&message.content);
        }
        chat.messages.push(message);
        true
    }

    /// The last `window` messages of a chat, oldest first.
    pub fn context(&self, id: &str, window: usize) -> Vec<ChatMessage> {
        self.chats
            .get(id)
            .map(|chat| {
                let skip = chat.messages.len().saturating_sub(window);
                chat.messages[skip..].to_vec()
            })
            .unwrap_or_default()
    }

    /// Messages that fall outside the last `window`, oldest first.
    pub fn earlier(&self, id: &str, window: usize) -> Vec<ChatMessage> {
        self.chats
            .get(id)
            .map(|chat| {
                let cut = chat.messages.len().saturating_sub(window);
                chat.messages[..cut].to_vec()
            })
            .unwrap_or_default()
    }
}

/// First 30 characters, with `...` when truncated.
pub fn chat_title(first_message: &str) -> String {
    let text = first_message.trim();
    if text.chars().count() > TITLE_CHARS {
        let head: String = text.chars().take(TITLE_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earlier_and_context_split_the_chat() {
        let mut h = ChatHistory::new();
        let id = h.create_chat();
        for i in 0..5 {
            h.push(&id, ChatMessage::user(format!("q{i}")));
        }
        let earlier: Vec<String> = h.earlier(&id, 3).into_iter().map(|m| m.content).collect();
        let recent: Vec<String> = h.context(&id, 3).into_iter().map(|m| m.content).collect();
        assert_eq!(earlier, ["q0", "q1"]);
        assert_eq!(recent, ["q2", "q3", "q4"]);
        assert!(h.earlier(&id, 10).is_empty());
        assert!(h.earlier("missing", 1).is_empty());
    }

    #[test]
    fn titles_and_order() {
        let mut h = ChatHistory::new();
        let a = h.create_chat();
        let b = h.create_chat();
        assert_eq!(h.get(&a).unwrap().title, "New Chat 1");
        assert_eq!(h.get(&b).unwrap().title, "New Chat 2");

        h.push(&a, ChatMessage::user("What is the difference between a process and a thread?"));
        h.push(&a, ChatMessage::user("second question"));
        assert_eq!(h.get(&a).unwrap().title, "What is the difference between...");

        let ids: Vec<&str> = h.chats().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![a.as_str(), b.as_str()]);
    }

    #[test]
    fn delete_and_unknown_ids() {
        let mut h = ChatHistory::new();
        let a = h.create_chat();
        assert!(h.delete_chat(&a));
        assert!(!h.delete_chat(&a));
        assert!(!h.push(&a, ChatMessage::user("hi")));
        assert!(h.context(&a, 10).is_empty());
        // Numbering keeps counting after deletes.
        let b = h.create_chat();
        assert_eq!(h.get(&b).unwrap().title, "New Chat 2");
    }

    #[test]
    fn context_window_keeps_latest() {
        let mut h = ChatHistory::new();
        let a = h.create_chat();
        for i in 0..15 {
            h.push(&a, ChatMessage::user(format!("m{}", i)));
        }
        let ctx = h.context(&a, MAX_CONTEXT_MESSAGES);
        assert_eq!(ctx.len(), 10);
        assert_eq!(ctx[0].content, "m5");
        assert_eq!(ctx[9].content, "m14");
    }

    #[test]
    fn short_titles_are_kept() {
        assert_eq!(chat_title("  Binary trees "), "Binary trees");
        assert_eq!(chat_title(&"é".repeat(31)), format!("{}...", "é".repeat(30)));
    }
}
