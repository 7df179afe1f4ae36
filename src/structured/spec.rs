use serde::{Deserialize, Serialize};

/// Shape of the record expected from a model reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordSpec {
    MultipleChoice { labels: Vec<String> },
    TrueFalse,
    FillBlank,
    Subjective { max_key_points: usize },
    /// Model grading report for a subjective answer.
    Grade { max_marks: u32 },
}

impl RecordSpec {
    /// Four options labelled `A`..`D`.
    pub fn multiple_choice() -> Self {
        Self::MultipleChoice {
            labels: ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn subjective() -> Self {
        Self::Subjective { max_key_points: 5 }
    }

    pub fn grade(max_marks: u32) -> Self {
        Self::Grade { max_marks }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::MultipleChoice { .. } => "multiple_choice",
            Self::TrueFalse => "true_false",
            Self::FillBlank => "fill_blank",
            Self::Subjective { .. } => "subjective",
            Self::Grade { .. } => "grade",
        }
    }

    /// Fields in the order the parser looks for them.
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            Self::MultipleChoice { .. } => &["question", "options", "correct_answer", "explanation"],
            Self::TrueFalse => &["question", "correct_answer", "explanation"],
            Self::FillBlank => &["question", "correct_answer", "explanation"],
            Self::Subjective { .. } => &["question", "ideal_answer", "key_points"],
            Self::Grade { .. } => &[
                "score",
                "feedback",
                "key_points_addressed",
                "key_points_missed",
            ],
        }
    }

    /// Line format the parser understands, for inclusion in prompts.
    pub fn format_hint(&self) -> String {
        match self {
            Self::MultipleChoice { labels } => {
                let mut hint = String::from("Question: [question text]\n");
                for label in labels {
                    hint.push_str(&format!("{}: [option {}]\n", label, label));
                }
                hint.push_str(&format!(
                    "Correct Answer: [{}]\nExplanation: [why the answer is correct]",
                    labels.join("/")
                ));
                hint
            }
            Self::TrueFalse => "Question: [statement]\n\
                 Correct Answer: [True/False]\n\
                 Explanation: [why]"
                .to_string(),
            Self::FillBlank => "Question: [sentence with _____ for the blank]\n\
                 Correct Answer: [word or phrase for the blank]\n\
                 Explanation: [why]"
                .to_string(),
            Self::Subjective { max_key_points } => format!(
                "Question: [question text]\n\
                 Ideal Answer: [complete model answer]\n\
                 Key Points:\n- [point 1]\n- [point 2]\n(at most {} key points)",
                max_key_points
            ),
            Self::Grade { max_marks } => format!(
                "Score: [number]/{}\n\
                 Feedback: [detailed feedback]\n\
                 Key Points Addressed: [comma-separated list]\n\
                 Key Points Missed: [comma-separated list]",
                max_marks
            ),
        }
    }
}
