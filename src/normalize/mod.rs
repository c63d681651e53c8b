use serde_json::Value;
use thiserror::Error;

/// Maximum length of the diagnostic snippet carried by a failure.
const SNIPPET_MAX_CHARS: usize = 200;

/// Why a model reply could not be normalized.
#[derive(Debug, Error)]
pub enum ParseFailureReason {
    /// The cleaned reply (and the brace-scan recovery substring) was not
    /// valid JSON.
    #[error("invalid JSON: {0}")]
    Decode(#[source] serde_json::Error),
    /// The reply decoded, but to a scalar rather than an object or array.
    #[error("decoded to a JSON scalar, expected an object or array")]
    NotStructured,
}

/// Explicit failure signal from [`normalize`]. Carries the original raw
/// reply, truncated, for diagnostics. Callers substitute their own empty
/// default structure; a failure here is never fatal to a run.
#[derive(Debug, Error)]
#[error("failed to normalize model reply ({reason}); reply began: {snippet:?}")]
pub struct ParseFailure {
    pub reason: ParseFailureReason,
    pub snippet: String,
}

impl ParseFailure {
    fn new(reason: ParseFailureReason, raw: &str) -> Self {
        Self {
            reason,
            snippet: truncate_chars(raw, SNIPPET_MAX_CHARS),
        }
    }
}

/// Recover a structured JSON value from a raw text-generation reply.
///
/// The reply is expected to be JSON but may be wrapped in a fenced code
/// block (optionally tagged `json`) or surrounded by prose the model was
/// asked not to emit. Processing:
///
/// 1. trim, then strip the first fence pair (only the first opening fence
///    and its matching closing fence; never a global replacement, which
///    would corrupt JSON string values containing backticks);
/// 2. strict decode;
/// 3. on failure, brace-scan recovery: decode the substring between the
///    first and last structural delimiter (`{`..`}` or `[`..`]`, whichever
///    shape opens first);
/// 4. on failure again, return a [`ParseFailure`] — never a guessed or
///    partial value.
///
/// The decoded value is returned unchanged in shape; schema mapping is the
/// caller's job.
pub fn normalize(raw: &str) -> Result<Value, ParseFailure> {
    let cleaned = strip_fences(raw.trim());

    match decode_structured(cleaned) {
        Ok(value) => Ok(value),
        Err(first_err) => match recover_substring(cleaned) {
            Some(candidate) => decode_structured(candidate)
                .map_err(|reason| ParseFailure::new(reason, raw)),
            None => Err(ParseFailure::new(first_err, raw)),
        },
    }
}

/// Strip a leading code fence and its matching closing fence, if present.
/// Content outside the fence pair is dropped; a missing closing fence means
/// everything after the opening fence is kept.
fn strip_fences(text: &str) -> &str {
    const FENCE: &str = "```";

    let Some(rest) = text.strip_prefix(FENCE) else {
        return text;
    };

    // A language tag sits between the opening fence and the first newline.
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);

    match rest.find(FENCE) {
        Some(end) => rest[..end].trim(),
        None => rest.trim(),
    }
}

/// Strict decode, additionally rejecting scalar top-level values: a bare
/// number or string is never a usable extraction result.
fn decode_structured(text: &str) -> Result<Value, ParseFailureReason> {
    let value: Value = serde_json::from_str(text).map_err(ParseFailureReason::Decode)?;
    if value.is_object() || value.is_array() {
        Ok(value)
    } else {
        Err(ParseFailureReason::NotStructured)
    }
}

/// Locate the substring between the first and last structural delimiter.
/// Object and array shapes are detected explicitly; whichever opener
/// appears first in the text decides the shape.
fn recover_substring(text: &str) -> Option<&str> {
    let brace = text.find('{');
    let bracket = text.find('[');

    let (open, close) = match (brace, bracket) {
        (Some(b), Some(k)) if b < k => (b, text.rfind('}')?),
        (Some(b), None) => (b, text.rfind('}')?),
        (_, Some(k)) => (k, text.rfind(']')?),
        (None, None) => return None,
    };

    if close > open {
        Some(&text[open..=close])
    } else {
        None
    }
}

/// Truncate on a char boundary without splitting a multi-byte character.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json_object() {
        let value = normalize(r#"{"a": 1}"#).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_fenced_json_with_tag() {
        let value = normalize("```json\n{\"a\":1}\n```").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_fenced_json_without_tag() {
        let value = normalize("```\n{\"a\":1}\n```").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_fence_without_closing_fence() {
        let value = normalize("```json\n{\"a\":1}").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_prose_wrapped_object_recovers_via_brace_scan() {
        let value = normalize("Sure! {\"a\":1} Hope that helps.").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_prose_wrapped_array_recovers_via_bracket_scan() {
        let value = normalize("Here you go: [1, 2, 3] as requested.").unwrap();
        assert_eq!(value, json!([1, 2, 3]));
    }

    #[test]
    fn test_array_opener_before_object_uses_array_shape() {
        let value = normalize("[{\"a\":1},{\"a\":2}]").unwrap();
        assert_eq!(value, json!([{"a": 1}, {"a": 2}]));
    }

    #[test]
    fn test_backticks_inside_string_values_survive() {
        // Only the first fence pair is stripped; backticks embedded in a
        // value must not be touched.
        let raw = "```json\n{\"code\": \"use `let` here\"}\n```";
        // The embedded backticks are single, not triple, so the fence pair
        // resolves cleanly.
        let value = normalize(raw).unwrap();
        assert_eq!(value["code"], "use `let` here");
    }

    #[test]
    fn test_not_json_returns_failure() {
        let err = normalize("not json at all").unwrap_err();
        assert!(matches!(err.reason, ParseFailureReason::Decode(_)));
        assert_eq!(err.snippet, "not json at all");
    }

    #[test]
    fn test_scalar_reply_is_rejected() {
        let err = normalize("42").unwrap_err();
        assert!(matches!(err.reason, ParseFailureReason::NotStructured));
    }

    #[test]
    fn test_empty_reply_returns_failure() {
        assert!(normalize("").is_err());
        assert!(normalize("   \n  ").is_err());
    }

    #[test]
    fn test_snippet_is_truncated() {
        let long = "x".repeat(500);
        let err = normalize(&long).unwrap_err();
        assert_eq!(err.snippet.chars().count(), 200);
    }

    #[test]
    fn test_unbalanced_braces_fail_cleanly() {
        let err = normalize("{\"a\": 1").unwrap_err();
        assert!(matches!(err.reason, ParseFailureReason::Decode(_)));
    }
}
