use crate::structured::RecordSpec;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MAX_QUESTIONS: u32 = 20;
pub const SUBJECTIVE_MARKS: [u32; 4] = [5, 10, 15, 20];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    TrueFalse,
    FillBlank,
    Subjective,
}

impl QuestionKind {
    pub const ALL: [QuestionKind; 4] = [
        Self::MultipleChoice,
        Self::TrueFalse,
        Self::FillBlank,
        Self::Subjective,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "mcq",
            Self::TrueFalse => "tf",
            Self::FillBlank => "fill",
            Self::Subjective => "subjective",
        }
    }

    /// Human-readable description used in prompts.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple-choice quiz question",
            Self::TrueFalse => "true/false question",
            Self::FillBlank => "fill-in-the-blank question",
            Self::Subjective => "subjective (open-ended) quiz question",
        }
    }

    pub fn spec(&self) -> RecordSpec {
        match self {
            Self::MultipleChoice => RecordSpec::multiple_choice(),
            Self::TrueFalse => RecordSpec::TrueFalse,
            Self::FillBlank => RecordSpec::FillBlank,
            Self::Subjective => RecordSpec::subjective(),
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mcq" | "multiple_choice" | "multiple-choice" => Ok(Self::MultipleChoice),
            "tf" | "true_false" | "true-false" => Ok(Self::TrueFalse),
            "fill" | "fill_blank" | "fill-blank" => Ok(Self::FillBlank),
            "subjective" | "open" => Ok(Self::Subjective),
            other => Err(Error::validation_with_context(
                format!("unknown question kind '{}'", other),
                ErrorContext::new()
                    .with_field_path("plan.kinds")
                    .with_details("expected mcq, tf, fill or subjective"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(Error::validation_with_context(
                format!("unknown difficulty '{}'", other),
                ErrorContext::new().with_field_path("plan.difficulty"),
            )),
        }
    }
}

/// What quiz to generate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizPlan {
    pub subject: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub description: Option<String>,
    pub count: u32,
    pub kinds: Vec<QuestionKind>,
    pub subjective_marks: u32,
}

impl QuizPlan {
    pub fn new(subject: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            topic: topic.into(),
            difficulty: Difficulty::Medium,
            description: None,
            count: 5,
            kinds: vec![QuestionKind::MultipleChoice],
            subjective_marks: 10,
        }
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn with_kinds(mut self, kinds: Vec<QuestionKind>) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn with_subjective_marks(mut self, marks: u32) -> Self {
        self.subjective_marks = marks;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, msg: String| {
            Err(Error::validation_with_context(
                msg,
                ErrorContext::new()
                    .with_field_path(format!("plan.{}", field))
                    .with_source("quiz_plan"),
            ))
        };
        if self.subject.trim().is_empty() {
            return invalid("subject", "subject must not be empty".into());
        }
        if self.topic.trim().is_empty() {
            return invalid("topic", "topic must not be empty".into());
        }
        if self.kinds.is_empty() {
            return invalid("kinds", "select at least one question kind".into());
        }
        if let Some(dup) = self
            .kinds
            .iter()
            .enumerate()
            .find_map(|(i, kind)| self.kinds[..i].contains(kind).then_some(kind))
        {
            return invalid("kinds", format!("question kind '{}' is listed more than once", dup));
        }
        if self.count == 0 || self.count > MAX_QUESTIONS {
            return invalid(
                "count",
                format!("count must be between 1 and {}, got {}", MAX_QUESTIONS, self.count),
            );
        }
        if self.kinds.contains(&QuestionKind::Subjective)
            && !SUBJECTIVE_MARKS.contains(&self.subjective_marks)
        {
            return invalid(
                "subjective_marks",
                format!("subjective marks must be one of {:?}", SUBJECTIVE_MARKS),
            );
        }
        Ok(())
    }

    /// How many questions of each kind, in the given kind order.
    ///
    /// `count / kinds` each; the first `count % kinds` kinds get one extra.
    pub fn distribution(&self) -> Result<Vec<(QuestionKind, u32)>> {
        self.validate()?;
        let n = self.kinds.len() as u32;
        let (each, extra) = (self.count / n, self.count % n);
        Ok(self
            .kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| (*kind, each + u32::from((i as u32) < extra)))
            .collect())
    }

    pub fn marks_for(&self, kind: QuestionKind) -> u32 {
        match kind {
            QuestionKind::Subjective => self.subjective_marks,
            _ => 1,
        }
    }

    /// Generation prompt for one question, listing questions to avoid.
    pub fn prompt_for(&self, kind: QuestionKind, existing: &[String]) -> String {
        let marks = match kind {
            QuestionKind::Subjective => format!(" worth {} marks", self.subjective_marks),
            _ => String::new(),
        };
        let avoid = if existing.is_empty() {
            "None".to_string()
        } else {
            existing.join(", ")
        };
        let mut prompt = format!(
            "Generate a unique {} about {} in {} with {} difficulty{}.\n\
             Ensure the question is different from the following list:\n{}\n",
            kind.describe(),
            self.topic,
            self.subject,
            self.difficulty.as_str(),
            marks,
            avoid
        );
        if let Some(ref description) = self.description {
            prompt.push_str(&format!(
                "\nAdditional context about the test:\n{}\n\
                 Use this information to generate a more relevant and targeted question.\n",
                description
            ));
        }
        prompt.push_str("\nFormat the quiz exactly as follows:\n");
        prompt.push_str(&kind.spec().format_hint());
        prompt
    }
}
