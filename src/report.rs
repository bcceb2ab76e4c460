//! JSON export for readings.

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// One reading with the context needed to audit it later.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadingReport {
    /// Local time of the read, RFC 3339
    pub timestamp: String,
    pub algorithm: String,
    pub reading: String,
    /// Capture the reading came from, if it was read from disk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ReadingReport {
    /// Builds a report stamped with the current local time.
    pub fn new(algorithm: &str, reading: &str, source: Option<&Path>) -> Self {
        Self {
            timestamp: Local::now().to_rfc3339(),
            algorithm: algorithm.to_string(),
            reading: reading.to_string(),
            source: source.map(|p| p.display().to_string()),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize reading report to JSON")
    }
}

/// Export a report to a JSON file.
///
/// The output is pretty-printed for human readability.
pub fn export_to_json(report: &ReadingReport, output_path: &Path) -> Result<()> {
    let json = report.to_json()?;

    let mut file = File::create(output_path)
        .context(format!("Failed to create JSON file: {}", output_path.display()))?;

    file.write_all(json.as_bytes())
        .context("Failed to write JSON data")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_export_to_json() {
        let report = ReadingReport::new("tesseract_v1", "144.786", Some(Path::new("144_786.png")));

        let dir = tempdir().unwrap();
        let path = dir.path().join("reading.json");

        export_to_json(&report, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"reading\": \"144.786\""));
        assert!(content.contains("\"algorithm\": \"tesseract_v1\""));
        assert!(content.contains("\"source\": \"144_786.png\""));

        let parsed: ReadingReport = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn test_source_omitted_when_absent() {
        let report = ReadingReport::new("simple_tesseract", "0.0", None);
        let json = report.to_json().unwrap();
        assert!(!json.contains("source"));
        assert!(chrono::DateTime::parse_from_rfc3339(&report.timestamp).is_ok());
    }
}
