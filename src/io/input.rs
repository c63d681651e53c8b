use std::path::Path;

use anyhow::{Context, Result};

/// Read a transcript file into memory. The parser handles formatting, so
/// this is a plain UTF-8 read with a BOM strip.
pub fn read_transcript(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript: {:?}", path))?;
    Ok(content.trim_start_matches('\u{feff}').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("visit.md");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "\u{feff}Physician: Hello.\n").unwrap();

        let content = read_transcript(&path).unwrap();
        assert_eq!(content, "Physician: Hello.\n");
    }

    #[test]
    fn test_read_missing_file_has_context() {
        let err = read_transcript(Path::new("/nonexistent/visit.md")).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read transcript"));
    }
}
