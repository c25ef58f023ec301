//! Extraction of the test-list agent's structured selection from free-form
//! reply text.
//!
//! The expected shape is a JSON object with a `currentTest` key whose value
//! is either `null` (workflow complete) or an object with non-empty string
//! fields `description`, `testFile` and `implFile`. The JSON may sit inside
//! a fenced code block or inline anywhere in the text.

use crate::error::ParseError;
use crate::types::TestCase;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[a-zA-Z]*[ \t]*\r?\n(.*?)```").unwrap());

/// Extract the agent's test selection.
///
/// Returns `Ok(None)` when `currentTest` is JSON-null (no further tests) and
/// `Ok(Some(test))` for a well-formed selection. Every other shape is a hard
/// error: proceeding without a selection is not meaningful.
pub fn parse_test_selection(text: &str) -> Result<Option<TestCase>, ParseError> {
    // 1. Fenced blocks whose contents mention the key, in order.
    for capture in FENCED_BLOCK.captures_iter(text) {
        let block = &capture[1];
        if !block.contains("\"currentTest\"") {
            continue;
        }
        if let Some(raw) = first_balanced_object(block)
            && let Ok(value) = serde_json::from_str::<Value>(raw)
        {
            return validate_selection(&value);
        }
    }

    // 2. A depth-balanced object starting at the key, inline.
    for needle in ["{\"currentTest\"", "{ \"currentTest\""] {
        if let Some(start) = text.find(needle)
            && let Some(raw) = balanced_object_at(text, start)
        {
            let value = serde_json::from_str::<Value>(raw)
                .map_err(|e| ParseError::InvalidJson(e.to_string()))?;
            return validate_selection(&value);
        }
    }

    Err(ParseError::MissingSelection)
}

fn validate_selection(value: &Value) -> Result<Option<TestCase>, ParseError> {
    let selection = value
        .get("currentTest")
        .ok_or(ParseError::MissingSelection)?;
    if selection.is_null() {
        return Ok(None);
    }
    let object = selection
        .as_object()
        .ok_or_else(|| ParseError::WrongShape(type_name(selection).to_string()))?;

    let description = required_field(object, "description")?;
    let test_file = required_field(object, "testFile")?;
    let impl_file = required_field(object, "implFile")?;
    Ok(Some(TestCase::new(description, test_file, impl_file)))
}

fn required_field(
    object: &serde_json::Map<String, Value>,
    key: &'static str,
) -> Result<String, ParseError> {
    let value = object.get(key).ok_or(ParseError::MissingField(key))?;
    let text = value.as_str().ok_or(ParseError::BlankField(key))?;
    if text.trim().is_empty() {
        return Err(ParseError::BlankField(key));
    }
    Ok(text.to_string())
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// The first `{...}` object in `text`, balanced and string-aware.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    balanced_object_at(text, start)
}

/// The balanced object beginning at byte offset `start` (which must be a
/// `{`), honouring string literals and escapes.
fn balanced_object_at(text: &str, start: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    debug_assert_eq!(bytes.get(start), Some(&b'{'));
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
