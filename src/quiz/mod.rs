//! 测验模块：测验规划、生成、计时、作答与评分。
//!
//! # Quiz Module
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`QuizPlan`] | Subject, topic, difficulty, count and question kinds |
//! | [`QuizGenerator`] | Generates questions through the pipeline, avoiding duplicates |
//! | [`QuizSession`] | Answers, countdown and submission of one quiz attempt |
//! | [`QuizTimer`] | Polled countdown, no background thread |
//! | [`SubjectiveGrader`] | Model-assisted grading of open-ended answers |
//!
//! Objective questions are worth one mark; subjective questions carry the
//! plan's `subjective_marks`. Scores are deterministic unless a model grade is
//! applied with [`QuizSession::apply_grade`].

mod generator;
mod grader;
mod plan;
mod scoring;
mod session;
mod timer;

pub use generator::{GeneratedQuiz, QuizGenerator, QuizQuestion};
pub use grader::SubjectiveGrader;
pub use plan::{Difficulty, QuestionKind, QuizPlan, MAX_QUESTIONS, SUBJECTIVE_MARKS};
pub use scoring::{key_point_coverage, score_answer, subjective_score, Answer};
pub use session::{QuestionResult, QuizReport, QuizSession, QuizStatus};
pub use timer::QuizTimer;
