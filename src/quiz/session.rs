use super::generator::{GeneratedQuiz, QuizQuestion};
use super::plan::QuestionKind;
use super::scoring::{score_answer, Answer};
use super::timer::QuizTimer;
use crate::structured::GradeReport;
use crate::{Error, ErrorContext, Result};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuizStatus {
    InProgress,
    /// `auto` is set when the timer ran out.
    Submitted { auto: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionResult {
    pub index: usize,
    pub kind: QuestionKind,
    pub marks: u32,
    pub awarded: f32,
    /// `None` for subjective questions.
    pub correct: Option<bool>,
    pub answered: bool,
    pub graded_by_model: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizReport {
    pub results: Vec<QuestionResult>,
    pub total_awarded: f32,
    pub total_marks: u32,
}

impl QuizReport {
    pub fn percentage(&self) -> f32 {
        if self.total_marks == 0 {
            0.0
        } else {
            self.total_awarded * 100.0 / self.total_marks as f32
        }
    }
}

/// A quiz being taken: answers, optional countdown and submission state.
#[derive(Debug, Clone)]
pub struct QuizSession {
    questions: Vec<QuizQuestion>,
    answers: Vec<Option<Answer>>,
    grades: Vec<Option<GradeReport>>,
    timer: Option<QuizTimer>,
    status: QuizStatus,
}

impl QuizSession {
    pub fn new(questions: Vec<QuizQuestion>, timer: Option<QuizTimer>) -> Self {
        let n = questions.len();
        Self {
            questions,
            answers: vec![None; n],
            grades: vec![None; n],
            timer,
            status: QuizStatus::InProgress,
        }
    }

    /// Starts the countdown now when `duration` is given.
    pub fn from_generated(quiz: GeneratedQuiz, duration: Option<Duration>) -> Self {
        Self::new(quiz.questions, duration.map(QuizTimer::start))
    }

    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    pub fn answer_for(&self, index: usize) -> Option<&Answer> {
        self.answers.get(index).and_then(Option::as_ref)
    }

    pub fn status(&self) -> QuizStatus {
        self.status
    }

    pub fn timer(&self) -> Option<&QuizTimer> {
        self.timer.as_ref()
    }

    pub fn remaining_time(&self) -> Option<Duration> {
        self.timer.map(|t| t.remaining_time())
    }

    pub fn answer(&mut self, index: usize, answer: Answer) -> Result<()> {
        self.answer_at(index, answer, Instant::now())
    }

    /// Record an answer. Fails after submission (including auto-submission
    /// detected at `now`) or when `index` is out of range.
    pub fn answer_at(&mut self, index: usize, answer: Answer, now: Instant) -> Result<()> {
        if self.poll_at(now) != QuizStatus::InProgress {
            return Err(Error::validation_with_context(
                "quiz already submitted",
                ErrorContext::new().with_source("quiz_session"),
            ));
        }
        let slot = self.answers.get_mut(index).ok_or_else(|| {
            Error::validation_with_context(
                format!("no question at index {}", index),
                ErrorContext::new()
                    .with_field_path("answer.index")
                    .with_source("quiz_session"),
            )
        })?;
        *slot = Some(answer);
        Ok(())
    }

    pub fn poll(&mut self) -> QuizStatus {
        self.poll_at(Instant::now())
    }

    /// Auto-submits when the timer has run out at `now`.
    pub fn poll_at(&mut self, now: Instant) -> QuizStatus {
        if self.status == QuizStatus::InProgress
            && self.timer.map_or(false, |t| t.is_expired_at(now))
        {
            info!(questions = self.questions.len(), "quiz time expired, auto-submitting");
            self.status = QuizStatus::Submitted { auto: true };
        }
        self.status
    }

    /// Submit and score. Submitting twice keeps the first status.
    pub fn submit(&mut self) -> QuizReport {
        if self.status == QuizStatus::InProgress {
            self.status = QuizStatus::Submitted { auto: false };
        }
        self.report()
    }

    /// Replace the deterministic score of a subjective question with a model grade.
    pub fn apply_grade(&mut self, index: usize, grade: GradeReport) -> Result<()> {
        match self.questions.get(index) {
            Some(q) if q.kind == QuestionKind::Subjective => {
                self.grades[index] = Some(grade);
                Ok(())
            }
            Some(_) => Err(Error::validation_with_context(
                format!("question {} is not subjective", index),
                ErrorContext::new().with_source("quiz_session"),
            )),
            None => Err(Error::validation_with_context(
                format!("no question at index {}", index),
                ErrorContext::new().with_source("quiz_session"),
            )),
        }
    }

    pub fn report(&self) -> QuizReport {
        let results: Vec<QuestionResult> = self
            .questions
            .iter()
            .enumerate()
            .map(|(index, q)| {
                let answer = self.answers[index].as_ref();
                let (awarded, correct, graded_by_model) = match &self.grades[index] {
                    Some(grade) => {
                        // Rescale when the grade was given out of a different maximum.
                        let scale = if grade.max_marks == 0 {
                            0.0
                        } else {
                            q.marks as f32 / grade.max_marks as f32
                        };
                        ((grade.score * scale).clamp(0.0, q.marks as f32), None, true)
                    }
                    None => {
                        let (awarded, correct) = score_answer(&q.record.record, q.marks, answer);
                        (awarded, correct, false)
                    }
                };
                QuestionResult {
                    index,
                    kind: q.kind,
                    marks: q.marks,
                    awarded,
                    correct,
                    answered: answer.is_some(),
                    graded_by_model,
                }
            })
            .collect();
        QuizReport {
            total_awarded: results.iter().map(|r| r.awarded).sum(),
            total_marks: results.iter().map(|r| r.marks).sum(),
            results,
        }
    }
}
