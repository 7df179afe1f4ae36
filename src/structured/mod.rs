//! 结构化解析模块：把模型的半结构化文本回复解析为类型化记录。
//!
//! # Structured Text Module
//!
//! Models are asked to answer in a simple line format (`Question:`, `A:`,
//! `Correct Answer:` ...) but rarely follow it exactly. The parser here is
//! tolerant of markdown decoration, fences, commentary and missing fields,
//! and always returns a complete record.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RecordSpec`] | Expected record shape and its prompt format hint |
//! | [`StructuredTextParser`] | Line-oriented field extraction with defaults |
//! | [`ParsedRecord`] | [`Record`] plus `is_fallback` and the defaulted fields |
//! | [`extract_json`] | JSON value from a reply (fenced or embedded) |
//! | [`parse_follow_ups`] | Follow-up question suggestions |
//!
//! ```rust
//! use smartstudy::structured::{parse, RecordSpec};
//!
//! let parsed = parse(
//!     "Question: What is 2+2?\nA: 3\nB: 4\nC: 5\nD: 6\nCorrect Answer: B",
//!     &RecordSpec::multiple_choice(),
//! );
//! let q = parsed.record.as_multiple_choice().unwrap();
//! assert_eq!(q.correct_label, "B");
//! assert!(!parsed.is_fallback);
//! ```

mod fence;
mod parser;
mod record;
mod spec;

pub use fence::{extract_json, parse_follow_ups, strip_code_fences, DEFAULT_FOLLOW_UPS};
pub use parser::{parse, StructuredTextParser};
pub use record::{
    FillBlankQuestion, GradeReport, MultipleChoiceQuestion, ParsedRecord, Record,
    SubjectiveQuestion, TrueFalseQuestion, NO_EXPLANATION, NO_FEEDBACK, PLACEHOLDER_ANSWER,
    PLACEHOLDER_QUESTION,
};
pub use spec::RecordSpec;
