use super::StudySession;
use crate::pipeline::{PipelineOrchestrator, PipelineRequest, Prompt, TextOutcome};
use crate::structured::parse_follow_ups;
use crate::types::ChatMessage;
use tracing::debug;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful study assistant. \
Explain concepts clearly, structure answers with headings where useful, \
and keep a balanced perspective on contested topics.";

const FOLLOW_UP_PROMPT: &str = "Given the original query and the AI's response, generate 3 natural \
follow-up questions that the user might want to ask next. Make them specific, diverse and naturally \
flowing from the conversation. Return only the questions as a JSON array of strings with no additional text.";

const SUMMARY_PROMPT: &str = "Summarize the following conversation in a concise way that preserves \
the key technical details, questions asked, and knowledge shared. Here's the conversation:\n\n";

/// Characters of the reply included when asking for follow-ups.
const FOLLOW_UP_EXCERPT: usize = 1000;

/// Chat replies over a [`StudySession`]'s current chat.
pub struct ChatAssistant {
    pipeline: PipelineOrchestrator,
    system_prompt: String,
    max_attempts: u32,
}

impl ChatAssistant {
    pub fn new(pipeline: PipelineOrchestrator) -> Self {
        Self {
            pipeline,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_attempts: 3,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Append `text` to the current chat (creating one if needed), ask the
    /// model with the session's context window and append its reply. On
    /// failure a retry-prompting message is appended instead.
    pub async fn reply(&self, session: &mut StudySession, text: &str) -> TextOutcome {
        let chat_id = session.ensure_chat();
        session.chats.push(&chat_id, ChatMessage::user(text));
        let context = self.optimized_context(session, &chat_id).await;

        let request = PipelineRequest::new(Prompt::Messages(context), session.model.as_str())
            .with_system(self.system_prompt.as_str())
            .with_max_attempts(self.max_attempts)
            .with_cache(session.use_cache);
        let outcome = self.pipeline.run_text_request(&request).await;

        session
            .chats
            .push(&chat_id, ChatMessage::assistant(outcome.text_or_message()));
        outcome
    }

    /// The chat's context window. When older messages fall outside it, a
    /// summary of them is prepended as a system message. The summary goes
    /// through the pipeline, so an unchanged prefix is served from the cache.
    /// A failed summary is skipped.
    pub async fn optimized_context(&self, session: &StudySession, chat_id: &str) -> Vec<ChatMessage> {
        let recent = session.chats.context(chat_id, session.context_window);
        let earlier = session.chats.earlier(chat_id, session.context_window);
        if earlier.is_empty() {
            return recent;
        }

        let summary = self.summarize(session, &earlier).await;
        let Some(summary) = summary.filter(|s| !s.trim().is_empty()) else {
            debug!(chat_id, older = earlier.len(), "no summary, sending recent messages only");
            return recent;
        };
        let mut messages = Vec::with_capacity(recent.len() + 1);
        messages.push(ChatMessage::system(format!(
            "Here's a summary of the earlier conversation: {}\n\nNow continue helping with the latest messages.",
            summary.trim()
        )));
        messages.extend(recent);
        messages
    }

    async fn summarize(&self, session: &StudySession, messages: &[ChatMessage]) -> Option<String> {
        let mut prompt = String::from(SUMMARY_PROMPT);
        for message in messages {
            prompt.push_str(&format!(
                "{}: {}\n\n",
                message.role.as_str().to_uppercase(),
                message.content
            ));
        }
        let request = PipelineRequest::new(prompt, session.model.as_str())
            .with_max_attempts(self.max_attempts)
            .with_temperature(0.3)
            .with_max_tokens(500)
            .with_cache(session.use_cache);
        self.pipeline.run_text_request(&request).await.text
    }

    /// Three suggested follow-up questions; defaults when the model fails.
    pub async fn follow_ups(&self, session: &StudySession, query: &str, reply: &str) -> Vec<String> {
        let excerpt: String = reply.chars().take(FOLLOW_UP_EXCERPT).collect();
        let prompt = format!("Original query: {}\n\nAI response: {}...", query, excerpt);
        let request = PipelineRequest::new(prompt, session.model.as_str())
            .with_system(FOLLOW_UP_PROMPT)
            .with_max_attempts(self.max_attempts)
            .with_max_tokens(150)
            .with_cache(session.use_cache);
        let outcome = self.pipeline.run_text_request(&request).await;
        parse_follow_ups(outcome.text.as_deref().unwrap_or_default())
    }
}
