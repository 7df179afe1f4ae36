use super::fence::strip_code_fences;
use super::record::*;
use super::spec::RecordSpec;
use once_cell::sync::Lazy;
use regex::Regex;

static SCORE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:/\s*(\d+(?:\.\d+)?)|out\s+of\s+(\d+(?:\.\d+)?))?").ok()
});
static LIST_ITEM: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(?:[-•*]|\d+[.)])\s*(.*)$").ok());

#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
    Question,
    Choice(String),
    Answer,
    Explanation,
    IdealAnswer,
    KeyPoints,
    KeyPointsAddressed,
    KeyPointsMissed,
    Score,
    Feedback,
}

/// Recognized prefixes, longest-first where one is a prefix of another.
const PREFIXES: &[(&str, Field)] = &[
    ("correct answer", Field::Answer),
    ("answer", Field::Answer),
    ("question", Field::Question),
    ("statement", Field::Question),
    ("explanation", Field::Explanation),
    ("ideal answer", Field::IdealAnswer),
    ("model answer", Field::IdealAnswer),
    ("key points addressed", Field::KeyPointsAddressed),
    ("key points missed", Field::KeyPointsMissed),
    ("key points", Field::KeyPoints),
    ("keypoints", Field::KeyPoints),
    ("score", Field::Score),
    ("feedback", Field::Feedback),
];

fn is_decoration(c: char) -> bool {
    matches!(c, '*' | '_' | '#' | '>') || c.is_whitespace()
}

/// Values keep underscores (fill-in blanks); only bold markers are dropped.
fn trim_bold(s: &str) -> &str {
    s.trim_matches(|c: char| c == '*' || c.is_whitespace())
}

/// `A:`, `A)`, `A.` or `(A)` for one of `labels`, in any case. Returns the
/// label as spelled in `labels`.
fn choice_prefix<'a>(line: &'a str, labels: &[String]) -> Option<(String, &'a str)> {
    let (inner, closers): (&str, &[char]) = match line.strip_prefix('(') {
        Some(inner) => (inner, &[')']),
        None => (line, &[':', ')', '.']),
    };
    labels.iter().find_map(|label| {
        let head = inner.get(..label.len())?;
        if !head.eq_ignore_ascii_case(label) {
            return None;
        }
        let rest = inner[label.len()..].strip_prefix(closers)?;
        Some((label.clone(), trim_bold(rest)))
    })
}

fn recognize<'a>(line: &'a str, labels: &[String]) -> Option<(Field, &'a str)> {
    let line = line.trim_start_matches(is_decoration);
    if let Some((label, rest)) = choice_prefix(line, labels) {
        return Some((Field::Choice(label), rest));
    }
    let lower = line.to_ascii_lowercase();
    for (name, field) in PREFIXES {
        if !lower.starts_with(name) {
            continue;
        }
        // "Question 3:" and "**Answer**:" are both fine.
        let after = line[name.len()..]
            .trim_start_matches(|c: char| is_decoration(c) || c.is_ascii_digit());
        if let Some(rest) = after.strip_prefix([':', '：']) {
            return Some((field.clone(), trim_bold(rest)));
        }
    }
    None
}

/// Field → lines, in order of appearance. The first line holds whatever
/// followed the prefix; later lines are continuations.
struct Sections {
    entries: Vec<(Field, Vec<String>)>,
}

impl Sections {
    fn scan(text: &str, labels: &[String]) -> Self {
        let mut entries: Vec<(Field, Vec<String>)> = Vec::new();
        for line in text.lines() {
            if let Some((field, rest)) = recognize(line, labels) {
                let lines = if rest.is_empty() {
                    Vec::new()
                } else {
                    vec![rest.to_string()]
                };
                entries.push((field, lines));
                continue;
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            // Text before the first recognized prefix is commentary.
            if let Some((_, lines)) = entries.last_mut() {
                lines.push(line.to_string());
            }
        }
        Self { entries }
    }

    fn lines(&self, field: &Field) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(f, lines)| f == field && !lines.is_empty())
            .map(|(_, lines)| lines.as_slice())
    }

    fn text(&self, field: &Field) -> Option<String> {
        self.lines(field)
            .map(|lines| lines.join(" "))
            .filter(|s| !s.trim().is_empty())
    }
}

/// Line-oriented extractor for model replies. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredTextParser;

impl StructuredTextParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, raw_text: &str, spec: &RecordSpec) -> ParsedRecord {
        parse(raw_text, spec)
    }

    /// The record produced when nothing could be extracted.
    pub fn fallback(&self, spec: &RecordSpec) -> ParsedRecord {
        parse("", spec)
    }
}

/// Tracks defaulted fields while a record is assembled.
#[derive(Default)]
struct Defaults {
    missing: Vec<&'static str>,
    is_fallback: bool,
}

impl Defaults {
    fn required(&mut self, field: &'static str, value: Option<String>, default: &str) -> String {
        value.unwrap_or_else(|| {
            self.mark(field, true);
            default.to_string()
        })
    }

    fn optional(&mut self, field: &'static str, value: Option<String>, default: &str) -> String {
        value.unwrap_or_else(|| {
            self.mark(field, false);
            default.to_string()
        })
    }

    fn mark(&mut self, field: &'static str, required: bool) {
        if !self.missing.contains(&field) {
            self.missing.push(field);
        }
        self.is_fallback |= required;
    }

    fn finish(self, record: Record) -> ParsedRecord {
        ParsedRecord {
            record,
            is_fallback: self.is_fallback,
            missing: self.missing,
        }
    }
}

pub fn parse(raw_text: &str, spec: &RecordSpec) -> ParsedRecord {
    let cleaned = strip_code_fences(raw_text);
    let labels: &[String] = match spec {
        RecordSpec::MultipleChoice { labels } => labels.as_slice(),
        _ => &[],
    };
    let sections = Sections::scan(&cleaned, labels);
    let mut d = Defaults::default();

    let record = match spec {
        RecordSpec::MultipleChoice { labels } => {
            let text = d.required("question", sections.text(&Field::Question), PLACEHOLDER_QUESTION);
            let options = labels
                .iter()
                .map(|label| {
                    let option = sections.text(&Field::Choice(label.clone()));
                    let text = d.required("options", option, &format!("Option {}", label));
                    (label.clone(), text)
                })
                .collect();
            let correct_label = match sections
                .text(&Field::Answer)
                .and_then(|v| answer_label(&v, labels))
            {
                Some(label) => label,
                None => {
                    d.mark("correct_answer", true);
                    labels.first().cloned().unwrap_or_else(|| "A".to_string())
                }
            };
            let explanation = sections.text(&Field::Explanation);
            if explanation.is_none() {
                d.mark("explanation", false);
            }
            Record::MultipleChoice(MultipleChoiceQuestion {
                text,
                options,
                correct_label,
                explanation,
            })
        }
        RecordSpec::TrueFalse => {
            let text = d.required("question", sections.text(&Field::Question), PLACEHOLDER_QUESTION);
            let correct = match sections.text(&Field::Answer).and_then(|v| truth_value(&v)) {
                Some(b) => b,
                None => {
                    d.mark("correct_answer", true);
                    true
                }
            };
            let explanation = d.optional("explanation", sections.text(&Field::Explanation), NO_EXPLANATION);
            Record::TrueFalse(TrueFalseQuestion {
                text,
                correct,
                explanation,
            })
        }
        RecordSpec::FillBlank => {
            let text = d.required("question", sections.text(&Field::Question), PLACEHOLDER_QUESTION);
            let correct_text = d.required("correct_answer", sections.text(&Field::Answer), PLACEHOLDER_ANSWER);
            let explanation = sections.text(&Field::Explanation);
            if explanation.is_none() {
                d.mark("explanation", false);
            }
            Record::FillBlank(FillBlankQuestion {
                text,
                correct_text,
                explanation,
            })
        }
        RecordSpec::Subjective { max_key_points } => {
            let text = d.required("question", sections.text(&Field::Question), PLACEHOLDER_QUESTION);
            let ideal = sections.text(&Field::IdealAnswer);
            let mut key_points = sections
                .lines(&Field::KeyPoints)
                .map(list_items)
                .unwrap_or_default();
            if key_points.is_empty() {
                d.mark("key_points", false);
                key_points = ideal.as_deref().map(key_points_from_answer).unwrap_or_default();
            }
            key_points.truncate(*max_key_points);
            let ideal_answer = d.required("ideal_answer", ideal, PLACEHOLDER_ANSWER);
            Record::Subjective(SubjectiveQuestion {
                text,
                ideal_answer,
                key_points,
            })
        }
        RecordSpec::Grade { max_marks } => {
            let score = match sections.text(&Field::Score).and_then(|v| parse_score(&v, *max_marks)) {
                Some(s) => s,
                None => {
                    d.mark("score", true);
                    0.0
                }
            };
            let feedback = d.optional("feedback", sections.text(&Field::Feedback), NO_FEEDBACK);
            let key_points_addressed = sections
                .lines(&Field::KeyPointsAddressed)
                .map(list_items)
                .unwrap_or_default();
            let key_points_missed = sections
                .lines(&Field::KeyPointsMissed)
                .map(list_items)
                .unwrap_or_default();
            Record::Grade(GradeReport {
                score,
                max_marks: *max_marks,
                feedback,
                key_points_addressed,
                key_points_missed,
            })
        }
    };

    d.finish(record)
}

/// First alphanumeric char after an optional "Option" word, upper-cased.
fn answer_label(value: &str, labels: &[String]) -> Option<String> {
    let v = value.trim_start_matches(|c: char| !c.is_alphanumeric());
    let v = match (v.get(..6), v.get(6..)) {
        (Some(word), Some(rest)) if word.eq_ignore_ascii_case("option") => {
            rest.trim_start_matches(|c: char| !c.is_alphanumeric())
        }
        _ => v,
    };
    let first = v.chars().next()?.to_string();
    labels.iter().find(|l| l.eq_ignore_ascii_case(&first)).cloned()
}

fn truth_value(value: &str) -> Option<bool> {
    let v = value.to_lowercase();
    if v.contains("true") {
        Some(true)
    } else if v.contains("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_score(value: &str, max_marks: u32) -> Option<f32> {
    let caps = SCORE.as_ref()?.captures(value)?;
    let score: f32 = caps.get(1)?.as_str().parse().ok()?;
    let out_of: Option<f32> = caps
        .get(2)
        .or_else(|| caps.get(3))
        .and_then(|m| m.as_str().parse().ok());
    let max = max_marks as f32;
    let scaled = match out_of {
        Some(d) if d > 0.0 && (d - max).abs() > f32::EPSILON => score * max / d,
        _ => score,
    };
    Some(scaled.clamp(0.0, max))
}

/// Bullet or numbered items; a single unmarked line is treated as a comma list.
/// `none` yields nothing.
fn list_items(lines: &[String]) -> Vec<String> {
    let bulleted: Vec<String> = lines
        .iter()
        .filter_map(|line| {
            LIST_ITEM
                .as_ref()?
                .captures(line)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
        })
        .filter(|s| !s.is_empty())
        .collect();
    if !bulleted.is_empty() {
        return bulleted;
    }
    let items: Vec<String> = if lines.len() == 1 {
        lines[0].split(',').map(|s| s.trim().to_string()).collect()
    } else {
        lines.iter().map(|s| s.trim().to_string()).collect()
    };
    items
        .into_iter()
        .map(|s| s.trim_end_matches('.').to_string())
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("none"))
        .collect()
}

/// Key points recovered from the ideal answer when none were listed.
fn key_points_from_answer(answer: &str) -> Vec<String> {
    let sentences: Vec<&str> = answer
        .split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if let Some(sentence) = sentences
        .iter()
        .find(|s| s.to_lowercase().contains("key point"))
    {
        let list = sentence
            .split_once(':')
            .map(|(_, rest)| rest)
            .unwrap_or(sentence);
        let points: Vec<String> = list
            .split(',')
            .map(|s| s.trim().trim_end_matches(['.', '!', '?']).trim())
            .map(|s| s.strip_prefix("and ").unwrap_or(s).to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !points.is_empty() {
            return points;
        }
    }

    sentences.iter().take(3).map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mc(raw: &str) -> (MultipleChoiceQuestion, ParsedRecord) {
        let parsed = parse(raw, &RecordSpec::multiple_choice());
        (parsed.record.as_multiple_choice().unwrap().clone(), parsed)
    }

    #[test]
    fn tolerant_prefixes() {
        let raw = "Sure! Here is your question.\n\n\
                   **Question 1:** Which structure is LIFO?\n\
                   (A) Queue\n\
                   B) Stack\n\
                   C. Heap\n\
                   **D:** Graph\n\
                   **Correct Answer**: b) Stack\n\
                   Explanation: Stacks pop the most\n  recently pushed item.";
        let (q, parsed) = mc(raw);
        assert!(!parsed.is_fallback);
        assert_eq!(q.text, "Which structure is LIFO?");
        assert_eq!(q.option_text("A"), Some("Queue"));
        assert_eq!(q.option_text("C"), Some("Heap"));
        assert_eq!(q.option_text("D"), Some("Graph"));
        assert_eq!(q.correct_label, "B");
        assert_eq!(
            q.explanation.as_deref(),
            Some("Stacks pop the most recently pushed item.")
        );
    }

    #[test]
    fn lowercase_option_labels() {
        let raw = "Question: Which keyword declares an immutable binding in Rust?\n\
                   a) let\n\
                   b) mut\n\
                   (c) var\n\
                   d. const fn\n\
                   Correct Answer: a";
        let (q, parsed) = mc(raw);
        assert!(!parsed.is_fallback, "missing: {:?}", parsed.missing);
        let labels: Vec<&str> = q.options.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["A", "B", "C", "D"]);
        assert_eq!(q.option_text("A"), Some("let"));
        assert_eq!(q.option_text("C"), Some("var"));
        assert_eq!(q.option_text("D"), Some("const fn"));
        assert_eq!(q.correct_label, "A");
    }

    #[test]
    fn multi_line_question() {
        let raw = "Question: Consider the code\nfor i in range(3): print(i)\nWhat is printed last?\n\
                   A: 0\nB: 1\nC: 2\nD: 3\nCorrect Answer: C";
        let (q, _) = mc(raw);
        assert_eq!(q.text, "Consider the code for i in range(3): print(i) What is printed last?");
    }

    #[test]
    fn invalid_label_defaults_to_first() {
        let (q, parsed) = mc("Question: Q?\nA: 1\nB: 2\nC: 3\nD: 4\nCorrect Answer: E");
        assert_eq!(q.correct_label, "A");
        assert!(parsed.is_fallback);
        assert_eq!(parsed.missing, vec!["correct_answer", "explanation"]);
    }

    #[test]
    fn option_prefixed_answer() {
        let (q, _) = mc("Question: Q?\nA: 1\nB: 2\nC: 3\nD: 4\nAnswer: Option D");
        assert_eq!(q.correct_label, "D");
    }

    #[test]
    fn missing_option_is_placeholder() {
        let (q, parsed) = mc("Question: Q?\nA: 1\nB: 2\nD: 4\nCorrect Answer: B");
        assert_eq!(q.option_text("C"), Some("Option C"));
        assert!(parsed.is_fallback);
    }

    #[test]
    fn true_false() {
        let parsed = parse(
            "Question: The sun is a star.\nCorrect Answer: False.\nExplanation: trick",
            &RecordSpec::TrueFalse,
        );
        let q = parsed.record.as_true_false().unwrap();
        assert!(!q.correct);
        assert!(!parsed.is_fallback);

        let parsed = parse("Question: X\nAnswer: maybe", &RecordSpec::TrueFalse);
        let q = parsed.record.as_true_false().unwrap();
        assert!(q.correct);
        assert!(parsed.is_fallback);
        assert_eq!(q.explanation, NO_EXPLANATION);
    }

    #[test]
    fn fill_blank() {
        let parsed = parse(
            "Question: The capital of France is _____.\nCorrect Answer: Paris",
            &RecordSpec::FillBlank,
        );
        let q = parsed.record.as_fill_blank().unwrap();
        assert_eq!(q.correct_text, "Paris");
        assert!(!parsed.is_fallback);

        let parsed = parse("Question: Only a question", &RecordSpec::FillBlank);
        assert!(parsed.is_fallback);
        assert_eq!(parsed.record.as_fill_blank().unwrap().correct_text, PLACEHOLDER_ANSWER);
    }

    #[test]
    fn subjective_with_bullets() {
        let raw = "Question: Explain TCP handshakes.\n\
                   Ideal Answer: The client sends SYN.\nThe server replies SYN-ACK.\n\
                   Key Points:\n- SYN\n• SYN-ACK\n1. ACK\n2) Sequence numbers\n* Timeouts\n- Retransmission";
        let parsed = parse(raw, &RecordSpec::subjective());
        let q = parsed.record.as_subjective().unwrap();
        assert_eq!(q.ideal_answer, "The client sends SYN. The server replies SYN-ACK.");
        assert_eq!(
            q.key_points,
            vec!["SYN", "SYN-ACK", "ACK", "Sequence numbers", "Timeouts"]
        );
        assert!(!parsed.is_fallback);
    }

    #[test]
    fn subjective_key_points_from_answer() {
        let raw = "Question: What is OOP?\n\
                   Ideal Answer: OOP organizes code around objects. \
                   Key points include: encapsulation, inheritance, and polymorphism.";
        let q = parse(raw, &RecordSpec::subjective()).record;
        assert_eq!(
            q.as_subjective().unwrap().key_points,
            vec!["encapsulation", "inheritance", "polymorphism"]
        );

        let raw = "Question: Q\nIdeal Answer: One. Two! Three? Four.";
        let q = parse(raw, &RecordSpec::subjective()).record;
        assert_eq!(q.as_subjective().unwrap().key_points, vec!["One.", "Two!", "Three?"]);
    }

    #[test]
    fn grade_report() {
        let raw = "Score: 7 out of 10\nFeedback: Good coverage of basics.\n\
                   Key Points Addressed: SYN, ACK\nKey Points Missed: none";
        let parsed = parse(raw, &RecordSpec::grade(10));
        let g = parsed.record.as_grade().unwrap();
        assert_eq!(g.score, 7.0);
        assert_eq!(g.key_points_addressed, vec!["SYN", "ACK"]);
        assert!(g.key_points_missed.is_empty());
        assert!(!parsed.is_fallback);
    }

    #[test]
    fn grade_scores() {
        assert_eq!(parse_score("8/10", 10), Some(8.0));
        assert_eq!(parse_score("8.5", 10), Some(8.5));
        assert_eq!(parse_score("4/5", 10), Some(8.0));
        assert_eq!(parse_score("25", 20), Some(20.0));
        assert_eq!(parse_score("excellent", 10), None);

        let parsed = parse("Feedback: fine", &RecordSpec::grade(5));
        assert!(parsed.is_fallback);
        assert_eq!(parsed.record.as_grade().unwrap().score, 0.0);
    }

    #[test]
    fn fenced_reply() {
        let raw = "```\nQuestion: Q?\nA: 1\nB: 2\nC: 3\nD: 4\nCorrect Answer: D\n```";
        let (q, parsed) = mc(raw);
        assert_eq!(q.correct_label, "D");
        assert!(!parsed.is_fallback);
    }
}
