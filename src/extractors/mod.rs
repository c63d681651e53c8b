pub mod entities;
pub mod intent;
pub mod sentiment;
pub mod soap;

pub use entities::*;
pub use intent::*;
pub use sentiment::*;
pub use soap::*;

use thiserror::Error;

use crate::llm::GenerateError;
use crate::normalize::ParseFailure;

/// Extraction failure. The variants stay distinguishable so callers can
/// tell an upstream API error from an unusable reply before deciding to
/// substitute a module's empty default structure.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("generation request failed")]
    Generate(#[from] GenerateError),
    #[error("model reply was not usable JSON")]
    Normalize(#[from] ParseFailure),
    #[error("model reply did not match the expected schema")]
    Schema(#[source] serde_json::Error),
}

/// Round a confidence score to three decimals for output.
pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Shorten a statement for display, appending an ellipsis when truncated.
/// Cuts on a char boundary.
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round3() {
        assert_eq!(round3(0.8567891), 0.857);
        assert_eq!(round3(0.5), 0.5);
    }

    #[test]
    fn test_preview_short_text_unchanged() {
        assert_eq!(preview("short", 100), "short");
    }

    #[test]
    fn test_preview_truncates_with_ellipsis() {
        let long = "a".repeat(150);
        let shortened = preview(&long, 100);
        assert_eq!(shortened.chars().count(), 103);
        assert!(shortened.ends_with("..."));
    }
}
