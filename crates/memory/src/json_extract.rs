//! Tolerant JSON extraction from model output.
//!
//! Models asked for JSON still wrap it in code fences, prefix it with prose,
//! or trail commentary. [`extract_json`] strips fences, tries a direct
//! parse, then scans for balanced `{...}` / `[...]` spans with a bracket
//! matcher that understands JSON strings, so braces inside fact text do not
//! confuse it.

use serde_json::Value;

/// Find the first JSON object or array in `raw`.
pub fn extract_json(raw: &str) -> Option<Value> {
    find_json(raw, |value| {
        (value.is_object() || value.is_array()).then_some(value)
    })
}

/// Pull a list of strings out of a `{"facts": [...]}` object or a bare array.
///
/// Candidates of the wrong shape (a stray `[2]` in the prose, an object
/// without `key`) are skipped and the scan moves on. Non-string items are
/// skipped; entries are trimmed and empties dropped.
pub fn extract_string_list(raw: &str, key: &str) -> Option<Vec<String>> {
    find_json(raw, |value| string_list(&value, key))
}

fn string_list(value: &Value, key: &str) -> Option<Vec<String>> {
    let items = match value {
        Value::Object(map) => map.get(key)?.as_array()?,
        Value::Array(items) if items.iter().all(Value::is_string) => items,
        _ => return None,
    };
    Some(
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
    )
}

/// Return the first candidate span that parses and that `accept` maps to `Some`.
///
/// A balanced span is consumed whole whether or not it is accepted, so each
/// byte is rescanned only while the scan sits inside an unterminated bracket.
fn find_json<T>(raw: &str, mut accept: impl FnMut(Value) -> Option<T>) -> Option<T> {
    let text = strip_code_fences(raw);
    if text.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        if let Some(found) = accept(value) {
            return Some(found);
        }
    }

    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(offset) = text[start..].find(['{', '[']) {
        let open = start + offset;
        match matching_close(bytes, open) {
            Some(close) => {
                if let Ok(value) = serde_json::from_str::<Value>(&text[open..=close]) {
                    if let Some(found) = accept(value) {
                        return Some(found);
                    }
                }
                start = close + 1;
            }
            None => start = open + 1,
        }
    }
    None
}

/// Remove surrounding markdown code fences (```` ``` ```` or ```` ```json ````).
fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string ("json", "JSON", ...) on the opening line.
        text = match rest.find('\n') {
            Some(nl) => &rest[nl + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Index of the bracket closing the one at `open`, honouring JSON strings.
fn matching_close(bytes: &[u8], open: usize) -> Option<usize> {
    let mut stack: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => stack.push(b'}'),
            b'[' => stack.push(b']'),
            b'}' | b']' => {
                if stack.pop() != Some(b) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_clean_object() {
        let v = extract_json(r#"{"facts": ["a", "b"]}"#).unwrap();
        assert_eq!(v, json!({"facts": ["a", "b"]}));
    }

    #[test]
    fn strips_json_code_fence() {
        let raw = "```json\n{\"facts\": [\"The user lives in Lisbon\"]}\n```";
        let facts = extract_string_list(raw, "facts").unwrap();
        assert_eq!(facts, vec!["The user lives in Lisbon"]);
    }

    #[test]
    fn strips_bare_code_fence() {
        let raw = "```\n[\"one\"]\n```";
        assert_eq!(extract_string_list(raw, "facts").unwrap(), vec!["one"]);
    }

    #[test]
    fn finds_object_after_prose() {
        let raw = "Sure! Here are the facts:\n{\"facts\": [\"Prefers Rust\"]}\nLet me know.";
        assert_eq!(
            extract_string_list(raw, "facts").unwrap(),
            vec!["Prefers Rust"]
        );
    }

    #[test]
    fn braces_inside_strings_do_not_break_matching() {
        let raw = r#"Result: {"facts": ["Uses the {placeholder} syntax", "Likes [brackets] } too"]} done"#;
        let facts = extract_string_list(raw, "facts").unwrap();
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0], "Uses the {placeholder} syntax");
        assert_eq!(facts[1], "Likes [brackets] } too");
    }

    #[test]
    fn escaped_quotes_inside_strings() {
        let raw = r#"noise {"facts": ["Said \"hi}\" loudly"]} noise"#;
        let facts = extract_string_list(raw, "facts").unwrap();
        assert_eq!(facts, vec![r#"Said "hi}" loudly"#]);
    }

    #[test]
    fn skips_unparseable_span_and_tries_next() {
        let raw = r#"{not json} then {"facts": ["real"]}"#;
        assert_eq!(extract_string_list(raw, "facts").unwrap(), vec!["real"]);
    }

    #[test]
    fn nested_objects_are_balanced() {
        let raw = r#"x {"meta": {"n": 1}, "facts": ["deep"]} y"#;
        assert_eq!(extract_string_list(raw, "facts").unwrap(), vec!["deep"]);
    }

    #[test]
    fn bare_array_is_accepted() {
        let raw = r#"Facts: ["a", "  b  ", ""]"#;
        assert_eq!(extract_string_list(raw, "facts").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn stray_bracket_in_prose_does_not_hide_facts() {
        let raw = r#"Based on turn [2], here you go: {"facts": ["The user lives in Porto"]}"#;
        assert_eq!(
            extract_string_list(raw, "facts"),
            Some(vec!["The user lives in Porto".to_string()])
        );
    }

    #[test]
    fn object_without_key_is_skipped_for_later_match() {
        let raw = r#"{"note": "none"} and then {"facts": ["second"]}"#;
        assert_eq!(extract_string_list(raw, "facts").unwrap(), vec!["second"]);
    }

    #[test]
    fn bracket_heavy_noise_is_scanned_once() {
        let mut raw = "[1] ".repeat(5_000);
        raw.push_str(r#"{"facts": ["late"]}"#);
        assert_eq!(extract_string_list(&raw, "facts").unwrap(), vec!["late"]);
    }

    #[test]
    fn object_without_key_yields_none() {
        assert!(extract_string_list(r#"{"items": ["a"]}"#, "facts").is_none());
    }

    #[test]
    fn garbage_yields_none() {
        assert!(extract_json("I could not find any facts.").is_none());
        assert!(extract_json("").is_none());
        assert!(extract_json("{ unterminated").is_none());
        assert!(extract_json("```json\n```").is_none());
    }

    #[test]
    fn scalar_json_is_not_accepted() {
        assert!(extract_json("42").is_none());
        assert!(extract_json("\"just a string\"").is_none());
    }
}
