//! Helpers for model replies that wrap content in markdown or return JSON.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

pub const DEFAULT_FOLLOW_UPS: [&str; 3] = [
    "Tell me more about this topic",
    "What are the most recent developments?",
    "How does this compare to alternatives?",
];

static FENCED_JSON: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)\s*```").ok());
static LIST_MARKER: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-•*]|\d+[.)])\s*").ok());

/// Drop markdown fence lines (```` ``` ````, ```` ```text ````), keep everything else.
pub fn strip_code_fences(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Find a JSON value in a model reply.
///
/// Tries the whole text, then a fenced block, then the widest `{...}` span,
/// then the widest `[...]` span.
pub fn extract_json(text: &str) -> Option<Value> {
    let text = text.trim();
    if let Ok(v) = serde_json::from_str::<Value>(text) {
        return Some(v);
    }

    if let Some(re) = FENCED_JSON.as_ref() {
        for caps in re.captures_iter(text) {
            if let Some(inner) = caps.get(1) {
                if let Ok(v) = serde_json::from_str::<Value>(inner.as_str()) {
                    return Some(v);
                }
            }
        }
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (text.find(open), text.rfind(close)) {
            if start < end {
                if let Ok(v) = serde_json::from_str::<Value>(&text[start..=end]) {
                    return Some(v);
                }
            }
        }
    }
    None
}

/// Up to three follow-up questions from a reply that should be a JSON array
/// of strings (or an object holding one). Falls back to question-like lines, then to [`DEFAULT_FOLLOW_UPS`].
pub fn parse_follow_ups(text: &str) -> Vec<String> {
    let items = match extract_json(text) {
        Some(Value::Array(items)) => items,
        // {"questions": [...]} or any object holding a list.
        Some(Value::Object(map)) => map
            .get("questions")
            .and_then(Value::as_array)
            .or_else(|| map.values().find_map(Value::as_array))
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    let from_json: Vec<String> = items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(3)
        .map(str::to_string)
        .collect();
    if !from_json.is_empty() {
        return from_json;
    }

    let from_lines: Vec<String> = text
        .lines()
        .map(|line| match LIST_MARKER.as_ref() {
            Some(re) => re.replace(line, "").trim().to_string(),
            None => line.trim().to_string(),
        })
        .filter(|line| line.ends_with('?') && line.len() > 1)
        .take(3)
        .collect();
    if !from_lines.is_empty() {
        return from_lines;
    }

    DEFAULT_FOLLOW_UPS.iter().map(|s| s.to_string()).collect()
}
