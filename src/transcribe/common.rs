use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::config::TranscriptionTask;
use crate::error::{Result, SubburnError};
use crate::subtitle::TimedSegment;

/// What to ask of the speech model for one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionRequest {
    /// ISO-639-1-like language code, e.g. "en"
    pub language: String,
    pub task: TranscriptionTask,
}

impl TranscriptionRequest {
    pub fn new(language: impl Into<String>, task: TranscriptionTask) -> Self {
        Self {
            language: language.into(),
            task,
        }
    }

    pub fn translate(language: impl Into<String>) -> Self {
        Self::new(language, TranscriptionTask::Translate)
    }

    pub fn transcribe(language: impl Into<String>) -> Self {
        Self::new(language, TranscriptionTask::Transcribe)
    }
}

/// Trait for converting backend-specific output into timed segments
pub trait TranscriptionMapper<T> {
    fn to_segments(service_result: T) -> Result<Vec<TimedSegment>>;
}

/// Accept a language code only if it is short and alphanumeric.
///
/// The code is passed straight to an external process, so anything else is
/// rejected before it gets there.
pub fn validate_language(language: &str) -> Result<()> {
    let valid = !language.is_empty()
        && language.len() <= 16
        && language.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SubburnError::transcription(format!("Invalid language code '{}'", language)))
    }
}

/// Warn about segments that break the usual ordering convention.
///
/// Segments are passed through unchanged; the encoder tolerates them.
pub fn check_segment_order(segments: &[TimedSegment]) {
    let mut previous_end = 0.0_f64;
    for (i, segment) in segments.iter().enumerate() {
        if segment.start > segment.end {
            warn!("Segment {} ends before it starts ({} > {})", i + 1, segment.start, segment.end);
        }
        if segment.start < previous_end {
            warn!("Segment {} overlaps the previous one", i + 1);
        }
        previous_end = previous_end.max(segment.end);
    }
}

/// Read and parse a JSON file written by a whisper backend
pub fn read_json_output<T: serde::de::DeserializeOwned>(json_file: &Path) -> Result<T> {
    if !json_file.exists() {
        return Err(SubburnError::transcription(format!(
            "Whisper JSON output file not found: {}",
            json_file.display()
        )));
    }

    let json_content = std::fs::read_to_string(json_file)
        .map_err(|e| SubburnError::transcription(format!("Failed to read JSON output: {}", e)))?;

    serde_json::from_str(&json_content)
        .map_err(|e| SubburnError::transcription(format!("Failed to parse whisper JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_language() {
        assert!(validate_language("en").is_ok());
        assert!(validate_language("zh-TW").is_ok());
        assert!(validate_language("").is_err());
        assert!(validate_language("en; rm -rf").is_err());
    }

    #[test]
    fn test_read_json_output_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_json_output::<serde_json::Value>(&dir.path().join("none.json")).unwrap_err();
        assert!(matches!(err, SubburnError::Transcription { .. }));
    }

    #[test]
    fn test_read_json_output_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = read_json_output::<serde_json::Value>(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse whisper JSON"));
    }
}
