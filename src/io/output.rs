use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

/// Create the output directory if it does not exist yet.
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {:?}", dir))
}

/// Write a value as pretty-printed JSON (2-space indent, UTF-8) into the
/// output directory, returning the full path written.
pub fn write_json<T: Serialize>(dir: &Path, file_name: &str, value: &T) -> Result<PathBuf> {
    ensure_output_dir(dir)?;
    let path = dir.join(file_name);
    let file = std::fs::File::create(&path)
        .with_context(|| format!("Failed to create file: {:?}", path))?;
    serde_json::to_writer_pretty(file, value)
        .with_context(|| format!("Failed to write JSON: {:?}", path))?;
    info!("Saved {:?}", path);
    Ok(path)
}

/// Write plain text into the output directory.
pub fn write_text(dir: &Path, file_name: &str, content: &str) -> Result<PathBuf> {
    ensure_output_dir(dir)?;
    let path = dir.join(file_name);
    std::fs::write(&path, content).with_context(|| format!("Failed to write file: {:?}", path))?;
    info!("Saved {:?}", path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_json_pretty_two_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("outputs");

        let path = write_json(&out, "report.json", &json!({"a": {"b": 1}})).unwrap();
        let content = std::fs::read_to_string(path).unwrap();

        assert!(content.starts_with("{\n  \"a\""));
        assert!(content.contains("\n    \"b\": 1"));
    }

    #[test]
    fn test_output_dir_created_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("deeply").join("nested");

        write_text(&out, "note.txt", "SOAP NOTE").unwrap();
        assert!(out.join("note.txt").exists());
    }
}
