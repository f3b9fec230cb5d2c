//! Small text and time helpers shared by the pipelines.
//!
//! - Timestamps in the `YYYY-MM-DDTHH:MM:SSZ` form both documents use
//! - HTML stripping and whitespace compaction for feed summaries
//! - Truncation for log previews and JSON error classification

use chrono::{SecondsFormat, Utc};
use scraper::Html;
use serde_json::Value;

/// Current UTC time at second precision, e.g. `2025-05-06T14:30:00Z`.
pub fn utc_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The `YYYY-MM-DD` prefix of a timestamp produced by [`utc_now`].
pub fn date_stamp(timestamp: &str) -> &str {
    timestamp.get(..10).unwrap_or(timestamp)
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a char boundary) with an
/// ellipsis and a count of the bytes dropped.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// Model completions cut off by a token limit fail with an EOF error; this
/// lets the caller say so in the error message instead of a bare parse error.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Remove markup from an HTML fragment, returning its decoded text content.
pub fn strip_html(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(value);
    let text: String = fragment.root_element().text().collect();
    text.trim().to_string()
}

/// Collapse runs of whitespace to single spaces and cap the result at
/// `limit` characters, ending in `...` when shortened.
pub fn compact_text(value: &str, limit: usize) -> String {
    let compact = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if compact.chars().count() <= limit {
        return compact;
    }
    let keep = limit.saturating_sub(3);
    let mut out: String = compact.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Locate the JSON object inside a model completion.
///
/// Returns the trimmed text when it already looks like an object, otherwise
/// the span between the first `{` and the last `}`. `None` when no such
/// span exists.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let text = text.trim();
    if text.starts_with('{') && text.ends_with('}') {
        return Some(text);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Whether a JSON value counts as present: null, `false`, `0`, and empty
/// strings, arrays or objects do not.
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_truthy() {
        for v in [json!(null), json!(false), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
            assert!(!is_truthy(&v), "{v} should be empty");
        }
        for v in [json!(true), json!(7), json!(" "), json!("0"), json!([0]), json!({"a": 1})] {
            assert!(is_truthy(&v), "{v} should be present");
        }
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundary() {
        let s = "é".repeat(10);
        let result = truncate_for_log(&s, 5);
        assert!(result.starts_with("éé…"));
    }

    #[test]
    fn test_looks_truncated() {
        let json_eof = r#"{"field": "value"#;
        let result: Result<serde_json::Value, _> = serde_json::from_str(json_eof);
        if let Err(e) = result {
            assert!(looks_truncated(&e));
        }
    }

    #[test]
    fn test_utc_now_shape() {
        let now = utc_now();
        assert_eq!(now.len(), 20);
        assert!(now.ends_with('Z'));
        assert_eq!(&now[10..11], "T");
    }

    #[test]
    fn test_date_stamp() {
        assert_eq!(date_stamp("2025-05-06T14:30:00Z"), "2025-05-06");
        assert_eq!(date_stamp("short"), "short");
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(strip_html(""), "");
        assert_eq!(
            strip_html("<p>Markets <b>rally</b> &amp; bonds slip</p>"),
            "Markets rally & bonds slip"
        );
        assert_eq!(strip_html("  plain text  "), "plain text");
    }

    #[test]
    fn test_compact_text() {
        assert_eq!(compact_text("a  b\n\tc", 100), "a b c");
        assert_eq!(compact_text("abcdefghij", 10), "abcdefghij");
        assert_eq!(compact_text("abcdefghijk", 10), "abcdefg...");
        assert_eq!(compact_text("", 10), "");
    }

    #[test]
    fn test_extract_json_object() {
        assert_eq!(extract_json_object(" {\"a\":1} "), Some("{\"a\":1}"));
        assert_eq!(
            extract_json_object("Sure! ```json\n{\"items\": []}\n```"),
            Some("{\"items\": []}")
        );
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }
}
