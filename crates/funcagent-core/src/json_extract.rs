//! Tolerant extraction of JSON objects from model replies.
//!
//! Model output is rarely strict JSON. It may be wrapped in prose or code
//! fences, carry a trailing comma, or stop before the closing brace. Every
//! call site that reads structured data out of a reply goes through this
//! module so the recovery rules live in exactly one place:
//!
//! 1. The object starts at the first `{`. The strict candidate ends at the
//!    last `}`.
//! 2. If the strict candidate does not parse, the text from the first `{`
//!    onward is repaired (trailing commas dropped, unterminated strings and
//!    unclosed brackets closed) and the first JSON value is taken.
//! 3. Field lookup prefers an exact key. Otherwise the first key, in
//!    document order, whose name contains the requested name
//!    (case-insensitive) wins, skipping keys that contain any excluded
//!    substring.

use serde_json::{Map, Value};

/// Parse the first JSON object embedded in `text`.
pub fn extract_object(text: &str) -> Option<Map<String, Value>> {
    let start = text.find('{')?;
    let tail = &text[start..];

    let bounded = text
        .rfind('}')
        .filter(|&end| end > start)
        .map(|end| &text[start..=end]);

    if let Some(obj) = bounded.and_then(parse_first_object) {
        return Some(obj);
    }
    if let Some(obj) = parse_first_object(&repair(tail)) {
        return Some(obj);
    }
    bounded.and_then(|b| parse_first_object(&repair(b)))
}

/// Look up `field` in `obj`: exact key first, then the first key containing
/// `field` (case-insensitive) that contains none of `exclude`.
pub fn find_field<'a>(obj: &'a Map<String, Value>, field: &str, exclude: &[&str]) -> Option<&'a Value> {
    if let Some(v) = obj.get(field) {
        return Some(v);
    }
    let wanted = field.to_lowercase();
    let excluded: Vec<String> = exclude.iter().map(|e| e.to_lowercase()).collect();
    obj.iter()
        .find(|(key, _)| {
            let key = key.to_lowercase();
            key.contains(&wanted) && !excluded.iter().any(|e| key.contains(e.as_str()))
        })
        .map(|(_, v)| v)
}

/// Render a scalar field value as a string. `null` yields `None`.
pub fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

pub fn value_as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Extract `field` from the object embedded in `text` as a string.
pub fn string_field(text: &str, field: &str) -> Option<String> {
    string_field_excluding(text, field, &[])
}

pub fn string_field_excluding(text: &str, field: &str, exclude: &[&str]) -> Option<String> {
    let obj = extract_object(text)?;
    find_field(&obj, field, exclude).and_then(value_as_string)
}

pub fn bool_field(text: &str, field: &str) -> Option<bool> {
    let obj = extract_object(text)?;
    find_field(&obj, field, &[]).and_then(value_as_bool)
}

// ---------------------------------------------------------------------------
// Internal
// ---------------------------------------------------------------------------

fn parse_first_object(candidate: &str) -> Option<Map<String, Value>> {
    let mut values = serde_json::Deserializer::from_str(candidate).into_iter::<Value>();
    match values.next() {
        Some(Ok(Value::Object(obj))) => Some(obj),
        _ => None,
    }
}

/// Make a best-effort syntactic repair of a truncated or sloppy JSON text.
fn repair(src: &str) -> String {
    let mut out = String::with_capacity(src.len() + 4);
    let mut open: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in src.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '{' => {
                open.push('}');
                out.push(c);
            }
            '[' => {
                open.push(']');
                out.push(c);
            }
            '}' | ']' => {
                drop_trailing_comma(&mut out);
                if open.last() == Some(&c) {
                    open.pop();
                }
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }
    drop_trailing_comma(&mut out);
    while let Some(closer) = open.pop() {
        out.push(closer);
    }
    out
}

fn drop_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    if out[..trimmed_len].ends_with(',') {
        out.truncate(trimmed_len - 1);
    }
}
