use crate::pipeline::{PipelineOrchestrator, PipelineRequest};
use crate::structured::{GradeReport, RecordSpec, SubjectiveQuestion};
use crate::{Error, ErrorContext, Result};
use tracing::warn;

const GRADER_SYSTEM_PROMPT: &str = "You are an expert educational grader. Be fair but thorough.";

/// Model-assisted grading of subjective answers. Never cached: the same
/// answer may deserve a fresh look after the rubric changes.
pub struct SubjectiveGrader {
    pipeline: PipelineOrchestrator,
    model_id: String,
    max_attempts: u32,
}

impl SubjectiveGrader {
    pub fn new(pipeline: PipelineOrchestrator, model_id: impl Into<String>) -> Self {
        Self {
            pipeline,
            model_id: model_id.into(),
            max_attempts: 3,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Grade `answer` out of `max_marks`.
    ///
    /// Fails when the model cannot be reached or its reply carries no score;
    /// callers then keep the key-point coverage score.
    pub async fn grade(
        &self,
        question: &SubjectiveQuestion,
        answer: &str,
        max_marks: u32,
    ) -> Result<GradeReport> {
        let request = PipelineRequest::new(grading_prompt(question, answer, max_marks), self.model_id.as_str())
            .with_system(GRADER_SYSTEM_PROMPT)
            .with_max_attempts(self.max_attempts)
            .with_temperature(0.3)
            .with_cache(false);
        let outcome = self
            .pipeline
            .run_request(&request, &RecordSpec::grade(max_marks))
            .await;

        if let Some(error) = outcome.error {
            return Err(error.into());
        }
        if outcome.record.missing.contains(&"score") {
            warn!(question = question.text.as_str(), "grading reply had no usable score");
            return Err(Error::validation_with_context(
                "grading reply had no usable score",
                ErrorContext::new().with_source("subjective_grader"),
            ));
        }
        match outcome.record.record.as_grade() {
            Some(report) => Ok(report.clone()),
            None => Err(Error::validation_with_context(
                "grading reply did not parse as a grade",
                ErrorContext::new().with_source("subjective_grader"),
            )),
        }
    }
}

fn grading_prompt(question: &SubjectiveQuestion, answer: &str, max_marks: u32) -> String {
    let answer = if answer.trim().is_empty() {
        "(No answer provided)"
    } else {
        answer
    };
    format!(
        "Grade this subjective answer for a quiz question worth {marks} marks.\n\n\
         Question: {question}\n\
         Student's Answer: {answer}\n\n\
         For reference, an ideal answer would include:\n{ideal}\n\n\
         The key points that should be covered are:\n{points}\n\n\
         Analyze how well the student's answer addresses the key points and respond exactly as follows:\n{format}",
        marks = max_marks,
        question = question.text,
        answer = answer,
        ideal = question.ideal_answer,
        points = question.key_points.join(", "),
        format = RecordSpec::grade(max_marks).format_hint(),
    )
}
