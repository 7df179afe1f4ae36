use super::plan::QuestionKind;
use crate::structured::{Record, SubjectiveQuestion};
use serde::{Deserialize, Serialize};

/// A learner's answer to one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Answer {
    /// Option label for multiple choice.
    Choice(String),
    TrueFalse(bool),
    /// Fill-in-the-blank or subjective text.
    Text(String),
}

impl Answer {
    /// Typed answer from what a learner entered for a question of `kind`.
    /// Blank input is no answer; an unreadable true/false entry is too.
    pub fn from_input(kind: QuestionKind, input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        match kind {
            QuestionKind::MultipleChoice => Some(Answer::Choice(input.to_uppercase())),
            QuestionKind::TrueFalse => match input.to_lowercase().as_str() {
                "true" | "t" | "yes" | "y" => Some(Answer::TrueFalse(true)),
                "false" | "f" | "no" | "n" => Some(Answer::TrueFalse(false)),
                _ => None,
            },
            QuestionKind::FillBlank | QuestionKind::Subjective => Some(Answer::Text(input.to_string())),
        }
    }
}

/// Deterministic score for `answer` against `record`.
///
/// Returns the awarded marks and, for objective kinds, whether it was correct.
/// An answer of the wrong shape scores zero.
pub fn score_answer(record: &Record, marks: u32, answer: Option<&Answer>) -> (f32, Option<bool>) {
    let full = marks as f32;
    let verdict = |ok: bool| (if ok { full } else { 0.0 }, Some(ok));
    match (record, answer) {
        (Record::MultipleChoice(q), Some(Answer::Choice(label))) => {
            verdict(q.correct_label.eq_ignore_ascii_case(label.trim()))
        }
        (Record::TrueFalse(q), Some(Answer::TrueFalse(b))) => verdict(q.correct == *b),
        (Record::FillBlank(q), Some(Answer::Text(text))) => {
            verdict(normalize(&q.correct_text) == normalize(text))
        }
        (Record::Subjective(q), Some(Answer::Text(text))) => (subjective_score(q, marks, text), None),
        (Record::Subjective(_), _) | (Record::Grade(_), _) => (0.0, None),
        _ => (0.0, Some(false)),
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// `marks * covered / total` over the question's key points.
pub fn subjective_score(question: &SubjectiveQuestion, marks: u32, answer: &str) -> f32 {
    let (covered, total) = key_point_coverage(&question.key_points, answer);
    if total == 0 {
        return 0.0;
    }
    marks as f32 * covered as f32 / total as f32
}

/// How many key points the answer covers, out of how many.
///
/// A key point is covered when each of its significant words (longer than
/// three characters) appears in the answer. Points with no significant word
/// must appear verbatim.
pub fn key_point_coverage(key_points: &[String], answer: &str) -> (usize, usize) {
    let answer = answer.to_lowercase();
    let covered = key_points
        .iter()
        .filter(|point| {
            let point = point.to_lowercase();
            let words = significant_words(&point);
            if words.is_empty() {
                !point.trim().is_empty() && answer.contains(point.trim())
            } else {
                words.iter().all(|w| answer.contains(w))
            }
        })
        .count();
    (covered, key_points.len())
}

fn significant_words(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 3)
        .collect()
}
