use serde::{Deserialize, Serialize};

pub const PLACEHOLDER_QUESTION: &str =
    "Question generation was incomplete. Please regenerate this question.";
pub const PLACEHOLDER_ANSWER: &str = "Answer unavailable.";
pub const NO_EXPLANATION: &str = "No explanation provided.";
pub const NO_FEEDBACK: &str = "No feedback provided.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipleChoiceQuestion {
    pub text: String,
    /// `(label, text)` in label order.
    pub options: Vec<(String, String)>,
    pub correct_label: String,
    pub explanation: Option<String>,
}

impl MultipleChoiceQuestion {
    pub fn option_text(&self, label: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(l, _)| l.eq_ignore_ascii_case(label))
            .map(|(_, t)| t.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrueFalseQuestion {
    pub text: String,
    pub correct: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillBlankQuestion {
    pub text: String,
    pub correct_text: String,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectiveQuestion {
    pub text: String,
    pub ideal_answer: String,
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeReport {
    /// Always within `[0, max_marks]`.
    pub score: f32,
    pub max_marks: u32,
    pub feedback: String,
    pub key_points_addressed: Vec<String>,
    pub key_points_missed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    MultipleChoice(MultipleChoiceQuestion),
    TrueFalse(TrueFalseQuestion),
    FillBlank(FillBlankQuestion),
    Subjective(SubjectiveQuestion),
    Grade(GradeReport),
}

impl Record {
    /// Question text; `None` for grading reports.
    pub fn question_text(&self) -> Option<&str> {
        match self {
            Self::MultipleChoice(q) => Some(&q.text),
            Self::TrueFalse(q) => Some(&q.text),
            Self::FillBlank(q) => Some(&q.text),
            Self::Subjective(q) => Some(&q.text),
            Self::Grade(_) => None,
        }
    }

    pub fn as_multiple_choice(&self) -> Option<&MultipleChoiceQuestion> {
        match self {
            Self::MultipleChoice(q) => Some(q),
            _ => None,
        }
    }

    pub fn as_true_false(&self) -> Option<&TrueFalseQuestion> {
        match self {
            Self::TrueFalse(q) => Some(q),
            _ => None,
        }
    }

    pub fn as_fill_blank(&self) -> Option<&FillBlankQuestion> {
        match self {
            Self::FillBlank(q) => Some(q),
            _ => None,
        }
    }

    pub fn as_subjective(&self) -> Option<&SubjectiveQuestion> {
        match self {
            Self::Subjective(q) => Some(q),
            _ => None,
        }
    }

    pub fn as_grade(&self) -> Option<&GradeReport> {
        match self {
            Self::Grade(g) => Some(g),
            _ => None,
        }
    }
}

/// Parser output: always structurally complete.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedRecord {
    pub record: Record,
    /// Set when a required field had to be defaulted.
    pub is_fallback: bool,
    /// Fields that were defaulted, required or not.
    pub missing: Vec<&'static str>,
}

impl ParsedRecord {
    pub fn question_text(&self) -> Option<&str> {
        self.record.question_text()
    }
}
