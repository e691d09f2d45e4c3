use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stage an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Input,
    AudioExtraction,
    Transcription,
    Encoding,
    Burn,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Input => "input",
            Stage::AudioExtraction => "audio extraction",
            Stage::Transcription => "transcription",
            Stage::Encoding => "subtitle encoding",
            Stage::Burn => "subtitle burn-in",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum SubburnError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Video not found: {0}")]
    NotFound(String),

    #[error("Audio extraction failed: {message}")]
    AudioExtraction { message: String, transient: bool },

    #[error("Transcription failed: {message}")]
    Transcription { message: String, transient: bool },

    #[error("Subtitle encoding error: {0}")]
    Encoding(String),

    #[error("Subtitle burn-in failed: {message}")]
    Burn { message: String, transient: bool },

    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: Stage, secs: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Job error: {0}")]
    Job(String),

    #[error("Invalid job transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl SubburnError {
    pub fn audio_extraction(message: impl Into<String>) -> Self {
        Self::AudioExtraction { message: message.into(), transient: false }
    }

    pub fn transcription(message: impl Into<String>) -> Self {
        Self::Transcription { message: message.into(), transient: false }
    }

    pub fn burn(message: impl Into<String>) -> Self {
        Self::Burn { message: message.into(), transient: false }
    }

    /// Builds the stage error for a process that could not be spawned or waited on.
    pub(crate) fn spawn_failure(stage: Stage, message: impl Into<String>) -> Self {
        let message = message.into();
        match stage {
            Stage::AudioExtraction => Self::AudioExtraction { message, transient: true },
            Stage::Transcription => Self::Transcription { message, transient: true },
            Stage::Burn => Self::Burn { message, transient: true },
            Stage::Encoding => Self::Encoding(message),
            Stage::Input => Self::NotFound(message),
        }
    }

    /// Builds the stage error for a process that ran and reported failure.
    pub(crate) fn process_failure(stage: Stage, message: impl Into<String>) -> Self {
        let message = message.into();
        match stage {
            Stage::AudioExtraction => Self::audio_extraction(message),
            Stage::Transcription => Self::transcription(message),
            Stage::Burn => Self::burn(message),
            Stage::Encoding => Self::Encoding(message),
            Stage::Input => Self::NotFound(message),
        }
    }

    /// The pipeline stage this error belongs to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::NotFound(_) => Some(Stage::Input),
            Self::AudioExtraction { .. } => Some(Stage::AudioExtraction),
            Self::Transcription { .. } => Some(Stage::Transcription),
            Self::Encoding(_) => Some(Stage::Encoding),
            Self::Burn { .. } => Some(Stage::Burn),
            Self::Timeout { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether retrying the same job could plausibly succeed.
    ///
    /// Timeouts and failures to launch a process are transient; a process that
    /// ran and exited non-zero, or produced output we cannot read, is not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Http(_) => true,
            Self::AudioExtraction { transient, .. }
            | Self::Transcription { transient, .. }
            | Self::Burn { transient, .. } => *transient,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SubburnError>;
