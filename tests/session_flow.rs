//! Chat summarization and document answers through a cached pipeline.

mod common;

use common::{disk_pipeline, ScriptedService};
use smartstudy::document::{Document, DocumentQa};
use smartstudy::session::{ChatAssistant, StudySession, MAX_CONTEXT_MESSAGES};
use smartstudy::{ChatMessage, MessageRole};

const MODEL: &str = "llama-3.3-70b-versatile";

fn session_with_turns(turns: usize) -> StudySession {
    let mut session = StudySession::new(MODEL);
    let id = session.new_chat();
    for i in 0..turns {
        session.chats.push(&id, ChatMessage::user(format!("question {i}")));
        session.chats.push(&id, ChatMessage::assistant(format!("answer {i}")));
    }
    session
}

#[tokio::test]
async fn short_chat_is_sent_as_is() {
    let tmp = tempfile::tempdir().unwrap();
    let service = ScriptedService::new(vec![Ok("Sure.".into())]);
    let assistant = ChatAssistant::new(disk_pipeline(service.clone(), tmp.path()));
    let mut session = session_with_turns(2);

    let outcome = assistant.reply(&mut session, "one more").await;
    assert_eq!(outcome.text.as_deref(), Some("Sure."));
    assert_eq!(service.calls(), 1);

    let sent = &service.requests()[0].messages;
    // system prompt + 4 earlier messages + the new question
    assert_eq!(sent.len(), 6);
    assert!(!sent[0].content.contains("summary of the earlier conversation"));
}

#[tokio::test]
async fn older_messages_are_summarized_into_a_system_message() {
    let tmp = tempfile::tempdir().unwrap();
    let service = ScriptedService::new(vec![
        Ok("We covered stacks and queues.".into()),
        Ok("Heaps are trees.".into()),
    ]);
    let assistant = ChatAssistant::new(disk_pipeline(service.clone(), tmp.path()));
    let mut session = session_with_turns(6);

    let outcome = assistant.reply(&mut session, "what is a heap?").await;
    assert_eq!(outcome.text.as_deref(), Some("Heaps are trees."));
    assert_eq!(service.calls(), 2);

    let requests = service.requests();
    let summary_prompt = &requests[0].messages.last().unwrap().content;
    assert!(summary_prompt.starts_with("Summarize the following conversation"));
    assert!(summary_prompt.contains("USER: question 0"));
    assert!(summary_prompt.contains("ASSISTANT: answer 0"));
    assert!(!summary_prompt.contains("what is a heap?"));

    let chat = &requests[1].messages;
    let summary = chat
        .iter()
        .find(|m| m.role == MessageRole::System && m.content.contains("We covered stacks and queues."))
        .expect("summary message");
    assert!(summary.content.starts_with("Here's a summary of the earlier conversation"));
    let recent = chat.iter().filter(|m| m.role != MessageRole::System).count();
    assert_eq!(recent, MAX_CONTEXT_MESSAGES);
    assert_eq!(chat.last().unwrap().content, "what is a heap?");
}

#[tokio::test]
async fn repeated_summary_is_served_from_cache() {
    let tmp = tempfile::tempdir().unwrap();
    let service = ScriptedService::new(vec![Ok("Earlier: sorting.".into())]);
    let assistant = ChatAssistant::new(disk_pipeline(service.clone(), tmp.path()));
    let session = session_with_turns(6);
    let id = session.current_chat.clone().unwrap();

    let first = assistant.optimized_context(&session, &id).await;
    let second = assistant.optimized_context(&session, &id).await;
    assert_eq!(first, second);
    assert_eq!(first.len(), MAX_CONTEXT_MESSAGES + 1);
    assert_eq!(service.calls(), 1);
}

#[tokio::test]
async fn failed_summary_falls_back_to_recent_messages() {
    let tmp = tempfile::tempdir().unwrap();
    let service = ScriptedService::new(vec![]);
    let assistant = ChatAssistant::new(disk_pipeline(service.clone(), tmp.path())).with_max_attempts(1);
    let session = session_with_turns(6);
    let id = session.current_chat.clone().unwrap();

    let context = assistant.optimized_context(&session, &id).await;
    assert_eq!(context.len(), MAX_CONTEXT_MESSAGES);
    assert!(context.iter().all(|m| m.role != MessageRole::System));
}

#[tokio::test]
async fn document_answer_uses_the_relevant_chunk() {
    let tmp = tempfile::tempdir().unwrap();
    let service = ScriptedService::new(vec![Ok("It halves the range each step.".into())]);
    let qa = DocumentQa::new(disk_pipeline(service.clone(), tmp.path()), MODEL);

    let filler = "Photosynthesis converts light into chemical energy. ".repeat(400);
    let docs = [
        Document::new("biology.txt", filler),
        Document::new("algorithms.txt", "Binary search halves the sorted range at every step."),
    ];
    let outcome = qa.answer(&docs, "How does binary search work?").await.unwrap();
    assert_eq!(outcome.text.as_deref(), Some("It halves the range each step."));

    let requests = service.requests();
    let prompt = &requests[0].messages.last().unwrap().content;
    assert!(prompt.starts_with("Based on the following documents: biology.txt, algorithms.txt"));
    assert!(prompt.contains("Binary search halves the sorted range"));
    assert!(prompt.contains("Question: How does binary search work?"));

    let again = qa.answer(&docs, "How does binary search work?").await.unwrap();
    assert!(again.from_cache);
    assert_eq!(service.calls(), 1);
}

#[tokio::test]
async fn document_question_must_not_be_blank() {
    let tmp = tempfile::tempdir().unwrap();
    let service = ScriptedService::new(vec![]);
    let qa = DocumentQa::new(disk_pipeline(service.clone(), tmp.path()), MODEL);

    assert!(qa.answer(&[Document::new("a.txt", "text")], "  ").await.is_err());
    assert!(qa.answer(&[], "why?").await.is_err());
    assert_eq!(service.calls(), 0);
}
