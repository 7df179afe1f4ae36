use super::plan::{QuestionKind, QuizPlan};
use crate::error::InvocationError;
use crate::pipeline::{PipelineOrchestrator, PipelineRequest};
use crate::structured::ParsedRecord;
use crate::Result;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

const QUIZ_SYSTEM_PROMPT: &str = "You are an expert educational quiz generator.";

/// One generated question with its mark value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizQuestion {
    pub kind: QuestionKind,
    pub marks: u32,
    pub record: ParsedRecord,
}

impl QuizQuestion {
    pub fn text(&self) -> &str {
        self.record.question_text().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct GeneratedQuiz {
    /// Grouped by kind, in plan order.
    pub questions: Vec<QuizQuestion>,
    pub warnings: Vec<String>,
    pub failures: Vec<InvocationError>,
}

impl GeneratedQuiz {
    pub fn total_marks(&self) -> u32 {
        self.questions.iter().map(|q| q.marks).sum()
    }

    /// One user-facing line per failed batch, duplicates collapsed.
    pub fn failure_messages(&self) -> Vec<String> {
        let mut messages: Vec<String> = Vec::new();
        for failure in &self.failures {
            let message = failure.user_message();
            if !messages.contains(&message) {
                messages.push(message);
            }
        }
        messages
    }

    /// A bad credential or endpoint fails every batch the same way; retrying won't help.
    pub fn has_configuration_failure(&self) -> bool {
        self.failures.iter().any(InvocationError::is_configuration)
    }
}

#[derive(Default)]
struct KindBatch {
    questions: Vec<QuizQuestion>,
    warnings: Vec<String>,
    failures: Vec<InvocationError>,
}

/// Generates quizzes through the pipeline.
pub struct QuizGenerator {
    pipeline: PipelineOrchestrator,
    model_id: String,
    max_attempts: u32,
    unique_attempts: u32,
    use_cache: bool,
}

impl QuizGenerator {
    pub fn new(pipeline: PipelineOrchestrator, model_id: impl Into<String>) -> Self {
        Self {
            pipeline,
            model_id: model_id.into(),
            max_attempts: 3,
            unique_attempts: 5,
            use_cache: true,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Requests allowed per slot to obtain a question not already in the quiz.
    pub fn with_unique_attempts(mut self, unique_attempts: u32) -> Self {
        self.unique_attempts = unique_attempts.max(1);
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Kinds are generated concurrently; questions within a kind one at a
    /// time so each prompt can list the questions already produced.
    pub async fn generate(&self, plan: &QuizPlan) -> Result<GeneratedQuiz> {
        let distribution = plan.distribution()?;
        info!(
            subject = plan.subject.as_str(),
            topic = plan.topic.as_str(),
            count = plan.count,
            "generating quiz"
        );

        let batches = join_all(
            distribution
                .into_iter()
                .filter(|(_, n)| *n > 0)
                .map(|(kind, n)| self.generate_kind(plan, kind, n)),
        )
        .await;

        let mut quiz = GeneratedQuiz::default();
        for batch in batches {
            quiz.questions.extend(batch.questions);
            quiz.warnings.extend(batch.warnings);
            quiz.failures.extend(batch.failures);
        }
        Ok(quiz)
    }

    async fn generate_kind(&self, plan: &QuizPlan, kind: QuestionKind, count: u32) -> KindBatch {
        let spec = kind.spec();
        let marks = plan.marks_for(kind);
        let mut batch = KindBatch::default();
        let mut seen: Vec<String> = Vec::new();

        for slot in 0..count {
            let mut accepted = false;
            for attempt in 0..self.unique_attempts {
                let request = PipelineRequest::new(plan.prompt_for(kind, &seen), self.model_id.as_str())
                    .with_system(QUIZ_SYSTEM_PROMPT)
                    .with_max_attempts(self.max_attempts)
                    // A cached reply would repeat the duplicate.
                    .with_cache(self.use_cache && attempt == 0);
                let outcome = self.pipeline.run_request(&request, &spec).await;

                if let Some(error) = outcome.error {
                    warn!(kind = kind.as_str(), slot, error = %error, "question generation failed");
                    batch.failures.push(error);
                    batch.questions.push(QuizQuestion {
                        kind,
                        marks,
                        record: outcome.record,
                    });
                    accepted = true;
                    break;
                }

                let text = outcome.record.question_text().unwrap_or_default().to_string();
                if is_duplicate(&seen, &text) {
                    debug!(kind = kind.as_str(), slot, attempt, "duplicate question, retrying");
                    continue;
                }
                seen.push(text);
                batch.questions.push(QuizQuestion {
                    kind,
                    marks,
                    record: outcome.record,
                });
                accepted = true;
                break;
            }
            if !accepted {
                batch.warnings.push(format!(
                    "could not generate a unique {} after {} attempts",
                    kind.describe(),
                    self.unique_attempts
                ));
            }
        }
        batch
    }
}

fn is_duplicate(seen: &[String], text: &str) -> bool {
    let text = text.trim().to_lowercase();
    seen.iter().any(|s| s.trim().to_lowercase() == text)
}
