//! 文档问答模块：按相关度挑选文档片段并回答问题。
//!
//! # Document Q&A
//!
//! Loaded documents are joined, cut into fixed-size chunks and ranked
//! against the question by TF-IDF cosine similarity. The best chunks, capped
//! by word count, become the context of a single answer prompt sent through
//! the cached pipeline.
//!
//! | Step | Function |
//! |------|----------|
//! | Chunking | [`chunk_text`] |
//! | Ranking | [`relevant_chunks`] |
//! | Truncation | [`truncate_words`] |
//! | Answering | [`DocumentQa::answer`] |

use crate::pipeline::{PipelineOrchestrator, PipelineRequest, TextOutcome};
use crate::{Error, ErrorContext, Result};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Characters per chunk.
pub const CHUNK_CHARS: usize = 10_000;
/// Chunks kept as context.
pub const TOP_CHUNKS: usize = 2;
/// Word cap on the context sent to the model.
pub const MAX_CONTEXT_WORDS: usize = 6000;

const DOCUMENT_SYSTEM_PROMPT: &str = "You are a helpful document analysis assistant. \
Provide accurate answers based on the given context.";

/// A loaded document's name and extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub content: String,
}

impl Document {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Consecutive slices of at most `size` characters.
pub fn chunk_text(text: &str, size: usize) -> Vec<&str> {
    let size = size.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (i, _) in text.char_indices() {
        if count == size {
            chunks.push(&text[start..i]);
            start = i;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

/// Lowercased words of two or more alphanumeric characters.
fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| w.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}

/// The `top_n` chunks most similar to `question`, best first.
///
/// Weights are smoothed TF-IDF fitted on the chunks; vectors are L2
/// normalised. Returns nothing when no chunk shares a term with the question.
pub fn relevant_chunks<'a>(chunks: &[&'a str], question: &str, top_n: usize) -> Vec<&'a str> {
    if chunks.is_empty() {
        return Vec::new();
    }
    let chunk_terms: Vec<Vec<String>> = chunks.iter().map(|c| terms(c)).collect();

    let mut df: HashMap<&str, usize> = HashMap::new();
    for words in &chunk_terms {
        let unique: HashSet<&str> = words.iter().map(String::as_str).collect();
        for w in unique {
            *df.entry(w).or_default() += 1;
        }
    }
    let n = chunks.len() as f64;
    let idf = |w: &str| df.get(w).map(|&d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0);

    let vector = |words: &[String]| -> HashMap<String, f64> {
        let mut v: HashMap<String, f64> = HashMap::new();
        for w in words {
            if let Some(weight) = idf(w) {
                *v.entry(w.clone()).or_default() += weight;
            }
        }
        let norm = v.values().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            v.values_mut().for_each(|x| *x /= norm);
        }
        v
    };

    let query = vector(&terms(question));
    let mut scored: Vec<(usize, f64)> = chunk_terms
        .iter()
        .enumerate()
        .map(|(i, words)| {
            let doc = vector(words);
            let score = query.iter().map(|(w, q)| q * doc.get(w).unwrap_or(&0.0)).sum::<f64>();
            (i, score)
        })
        .collect();
    if scored.iter().all(|&(_, s)| s <= 0.0) {
        return Vec::new();
    }
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.into_iter().take(top_n).map(|(i, _)| chunks[i]).collect()
}

/// The first `max_words` whitespace-separated words; untouched when shorter.
pub fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() > max_words {
        words[..max_words].join(" ")
    } else {
        text.to_string()
    }
}

/// The answer prompt for `question` over `context` drawn from `names`.
pub fn answer_prompt(names: &[&str], context: &str, question: &str) -> String {
    format!(
        "Based on the following documents: {}\n\n\
         Context: {}\n\n\
         Question: {}\n\n\
         Please provide a clear and concise answer based on the context provided.\n\
         If the answer cannot be found in the context, please say so.",
        names.join(", "),
        truncate_words(context, MAX_CONTEXT_WORDS),
        question
    )
}

/// Answers questions about loaded documents.
pub struct DocumentQa {
    pipeline: PipelineOrchestrator,
    model_id: String,
    max_attempts: u32,
    use_cache: bool,
}

impl DocumentQa {
    pub fn new(pipeline: PipelineOrchestrator, model_id: impl Into<String>) -> Self {
        Self {
            pipeline,
            model_id: model_id.into(),
            max_attempts: 3,
            use_cache: true,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// The request that [`answer`](Self::answer) sends.
    pub fn request(&self, documents: &[Document], question: &str) -> Result<PipelineRequest> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::validation_with_context(
                "question must not be empty",
                ErrorContext::new()
                    .with_field_path("question")
                    .with_source("document_qa"),
            ));
        }
        if documents.is_empty() {
            return Err(Error::validation_with_context(
                "load at least one document",
                ErrorContext::new()
                    .with_field_path("documents")
                    .with_source("document_qa"),
            ));
        }

        let all_text = documents
            .iter()
            .map(|d| d.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text(&all_text, CHUNK_CHARS);
        let selected = relevant_chunks(&chunks, question, TOP_CHUNKS);
        debug!(
            chunks = chunks.len(),
            selected = selected.len(),
            "selected document context"
        );

        let names: Vec<&str> = documents.iter().map(|d| d.name.as_str()).collect();
        let prompt = answer_prompt(&names, &selected.join("\n"), question);
        Ok(PipelineRequest::new(prompt, self.model_id.as_str())
            .with_system(DOCUMENT_SYSTEM_PROMPT)
            .with_max_attempts(self.max_attempts)
            .with_temperature(0.7)
            .with_max_tokens(1024)
            .with_cache(self.use_cache))
    }

    /// Answer `question` from the most relevant parts of `documents`.
    /// Model failures come back in the outcome; only bad input is an error.
    pub async fn answer(&self, documents: &[Document], question: &str) -> Result<TextOutcome> {
        let request = self.request(documents, question)?;
        Ok(self.pipeline.run_text_request(&request).await)
    }
}
