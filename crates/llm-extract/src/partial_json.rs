//! Lenient decoding of truncated JSON objects.
//!
//! Tool-call arguments stream in as arbitrary fragments of a JSON object,
//! so at almost every point the accumulated buffer is invalid JSON:
//!
//! ```text
//! {"city": "San Fr
//! {"city": "San Francisco", "tags": ["a", "b
//! {"city": "San Francisco", "pop
//! ```
//!
//! [`parse_partial_object`] turns such a prefix into the best complete
//! object it implies. Open strings are closed, open containers are closed,
//! and trailing members that cannot be completed yet (a dangling key, the
//! first letters of `true`) are dropped until more bytes arrive.

use serde_json::Value;

use crate::extract::ArgumentMap;

/// Decodes a possibly truncated JSON object.
///
/// Returns `None` for an empty buffer, or when no prefix of the buffer
/// repairs to a JSON object.
///
/// ```rust
/// use llm_extract::partial_json::parse_partial_object;
///
/// let map = parse_partial_object(r#"{"city": "San Fr"#).unwrap();
/// assert_eq!(map["city"], "San Fr");
///
/// let map = parse_partial_object(r#"{"city": "Paris", "pop"#).unwrap();
/// assert!(!map.contains_key("pop"));
/// ```
pub fn parse_partial_object(buffer: &str) -> Option<ArgumentMap> {
    let input = buffer.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(input) {
        return into_object(value);
    }

    let mut end = input.len();
    loop {
        let repaired = repair(&input[..end]);
        if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
            if let Some(map) = into_object(value) {
                return Some(map);
            }
        }
        end = back_off(input, end)?;
    }
}

fn into_object(value: Value) -> Option<ArgumentMap> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Finds the next shorter cut: just after the last `{`/`[` or at the last
/// `,` before `end`. Always strictly less than `end`.
fn back_off(input: &str, end: usize) -> Option<usize> {
    let bytes = input.as_bytes();
    let pos = bytes[..end]
        .iter()
        .rposition(|b| matches!(b, b',' | b'{' | b'['))?;
    let cut = if bytes[pos] == b',' { pos } else { pos + 1 };
    if cut < end {
        Some(cut)
    } else if pos > 0 {
        Some(pos)
    } else {
        None
    }
}

/// Closes whatever is open at the end of `prefix`.
fn repair(prefix: &str) -> String {
    let mut closers: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    // Byte offset of an escape sequence that has not finished yet.
    let mut open_escape: Option<usize> = None;
    let mut hex_remaining = 0u8;
    let mut hex_value = 0u32;
    // A complete `\uD8xx` at the very end needs its low half to parse.
    let mut trailing_high_surrogate: Option<usize> = None;

    for (i, c) in prefix.char_indices() {
        if in_string {
            if hex_remaining > 0 {
                match c.to_digit(16) {
                    Some(d) => {
                        hex_value = hex_value * 16 + d;
                        hex_remaining -= 1;
                        if hex_remaining == 0 {
                            trailing_high_surrogate = if (0xD800..=0xDBFF).contains(&hex_value)
                            {
                                open_escape
                            } else {
                                None
                            };
                            open_escape = None;
                        }
                    }
                    None => {
                        hex_remaining = 0;
                        open_escape = None;
                    }
                }
                continue;
            }
            if escaped {
                escaped = false;
                if c == 'u' {
                    hex_remaining = 4;
                    hex_value = 0;
                } else {
                    open_escape = None;
                }
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    open_escape = Some(i);
                    trailing_high_surrogate = None;
                }
                '"' => {
                    in_string = false;
                    trailing_high_surrogate = None;
                }
                _ => trailing_high_surrogate = None,
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => closers.push('}'),
            '[' => closers.push(']'),
            '}' | ']' => {
                closers.pop();
            }
            _ => {}
        }
    }

    let mut out = String::with_capacity(prefix.len() + closers.len() + 1);
    if in_string {
        let cut = open_escape
            .or(trailing_high_surrogate)
            .unwrap_or(prefix.len());
        out.push_str(&prefix[..cut]);
        out.push('"');
    } else {
        out.push_str(prefix.trim_end());
        if out.ends_with(',') {
            out.pop();
        }
    }
    while let Some(closer) = closers.pop() {
        out.push(closer);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(s: &str) -> Value {
        Value::Object(parse_partial_object(s).unwrap())
    }

    #[test]
    fn test_complete_object() {
        assert_eq!(parse(r#"{"a": 1, "b": "x"}"#), json!({"a": 1, "b": "x"}));
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert!(parse_partial_object("").is_none());
        assert!(parse_partial_object("   \n").is_none());
    }

    #[test]
    fn test_opening_brace_only() {
        assert_eq!(parse("{"), json!({}));
    }

    #[test]
    fn test_unterminated_string_value() {
        assert_eq!(parse(r#"{"city": "San"#), json!({"city": "San"}));
        assert_eq!(parse(r#"{"city": ""#), json!({"city": ""}));
    }

    #[test]
    fn test_dangling_key_is_dropped() {
        assert_eq!(parse(r#"{"city": "Paris", "co"#), json!({"city": "Paris"}));
        assert_eq!(parse(r#"{"city": "Paris", "country""#), json!({"city": "Paris"}));
        assert_eq!(parse(r#"{"city": "Paris", "country":"#), json!({"city": "Paris"}));
        assert_eq!(parse(r#"{"ci"#), json!({}));
    }

    #[test]
    fn test_trailing_comma() {
        assert_eq!(parse(r#"{"a": 1,"#), json!({"a": 1}));
        assert_eq!(parse(r#"{"a": [1, 2, "#), json!({"a": [1, 2]}));
    }

    #[test]
    fn test_partial_literal_backs_off() {
        assert_eq!(parse(r#"{"a": 1, "ok": tr"#), json!({"a": 1}));
        assert_eq!(parse(r#"{"ok": fals"#), json!({}));
        assert_eq!(parse(r#"{"n": -"#), json!({}));
    }

    #[test]
    fn test_partial_number_is_kept() {
        assert_eq!(parse(r#"{"n": 12"#), json!({"n": 12}));
    }

    #[test]
    fn test_nested_containers() {
        assert_eq!(
            parse(r#"{"people": [{"name": "Ada"}, {"name": "Gr"#),
            json!({"people": [{"name": "Ada"}, {"name": "Gr"}]})
        );
        assert_eq!(
            parse(r#"{"a": {"b": {"c": [1, [2"#),
            json!({"a": {"b": {"c": [1, [2]]}}})
        );
    }

    #[test]
    fn test_braces_inside_strings_are_ignored() {
        assert_eq!(
            parse(r#"{"code": "fn main() { let v = [1"#),
            json!({"code": "fn main() { let v = [1"})
        );
    }

    #[test]
    fn test_dangling_escape_is_dropped() {
        assert_eq!(parse(r#"{"q": "say \"#), json!({"q": "say "}));
        assert_eq!(parse(r#"{"q": "say \"hi\""#), json!({"q": "say \"hi\""}));
    }

    #[test]
    fn test_partial_unicode_escape_is_dropped() {
        assert_eq!(parse(r#"{"s": "caf\u00"#), json!({"s": "caf"}));
        assert_eq!(parse(r#"{"s": "café"#), json!({"s": "café"}));
    }

    #[test]
    fn test_lone_high_surrogate_is_dropped() {
        assert_eq!(parse(r#"{"s": "hi \ud83d"#), json!({"s": "hi "}));
        assert_eq!(parse(r#"{"s": "hi 😀"#), json!({"s": "hi 😀"}));
    }

    #[test]
    fn test_multibyte_text_is_preserved() {
        assert_eq!(parse(r#"{"city": "Zürich, Schw"#), json!({"city": "Zürich, Schw"}));
    }

    #[test]
    fn test_non_object_top_level() {
        assert!(parse_partial_object("[1, 2]").is_none());
        assert!(parse_partial_object(r#""just a string"#).is_none());
        assert!(parse_partial_object("42").is_none());
    }

    #[test]
    fn test_growing_buffer_never_loses_complete_members() {
        let full = r#"{"city": "San Francisco", "tags": ["fog", "hills"], "pop": 815201}"#;
        let mut last_len = 0;
        for end in 1..=full.len() {
            if !full.is_char_boundary(end) {
                continue;
            }
            let map = parse_partial_object(&full[..end]).unwrap();
            assert!(map.len() >= last_len, "shrank at {end}: {map:?}");
            last_len = map.len();
        }
        assert_eq!(last_len, 3);
    }
}
