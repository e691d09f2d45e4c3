use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SubburnError};

/// Default file looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "subburn.toml";

fn default_max_concurrent_jobs() -> usize {
    2
}

fn default_max_upload_mb() -> usize {
    1024
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub transcriber: TranscriberConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriberConfig {
    /// Which speech engine to drive
    pub implementation: TranscriberImplementation,
    /// Path to the engine binary (`whisper` or `whisper-cli`)
    pub binary_path: String,
    /// Model name ("base") or, for whisper.cpp, a path to a ggml model file
    pub model: String,
    /// Language used when a request does not name one
    pub default_language: String,
    /// Task used when a request does not name one
    pub default_task: TranscriptionTask,
    /// Sampling temperature
    pub temperature: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriberImplementation {
    /// OpenAI Whisper command-line tool
    #[serde(rename = "openai")]
    OpenAI,
    /// whisper.cpp `whisper-cli`
    WhisperCpp,
}

/// What the speech model is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionTask {
    /// Output text is translated regardless of the spoken language
    #[default]
    Translate,
    /// Output text stays in the spoken language
    Transcribe,
}

impl TranscriptionTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptionTask::Translate => "translate",
            TranscriptionTask::Transcribe => "transcribe",
        }
    }
}

impl std::str::FromStr for TranscriptionTask {
    type Err = SubburnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "translate" => Ok(TranscriptionTask::Translate),
            "transcribe" => Ok(TranscriptionTask::Transcribe),
            other => Err(SubburnError::Config(format!(
                "Invalid task '{}'. Valid tasks: translate, transcribe",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Video encoder used when re-encoding frames with burned-in subtitles
    pub video_codec: String,
    /// Extra encoder options appended to the burn-in command,
    /// e.g. ["-preset", "medium", "-crf", "23"]
    pub subtitle_options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root for application data: logs and downloaded models
    pub data_dir: PathBuf,
    /// Uploaded videos, one subdirectory per job
    pub upload_dir: PathBuf,
    /// Job artifacts, one subdirectory per job
    pub processed_dir: PathBuf,
    pub audio_filename: String,
    pub subtitle_filename: String,
    pub output_filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_concurrent_jobs: usize,
    pub max_upload_mb: usize,
}

/// Upper bounds on each external process, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub extract_secs: u64,
    pub transcribe_secs: u64,
    pub burn_secs: u64,
}

impl TimeoutConfig {
    pub fn extract(&self) -> Duration {
        Duration::from_secs(self.extract_secs)
    }

    pub fn transcribe(&self) -> Duration {
        Duration::from_secs(self.transcribe_secs)
    }

    pub fn burn(&self) -> Duration {
        Duration::from_secs(self.burn_secs)
    }
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            implementation: TranscriberImplementation::OpenAI,
            binary_path: "whisper".to_string(),
            model: "base".to_string(),
            default_language: "en".to_string(),
            default_task: TranscriptionTask::Translate,
            temperature: 0.0,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            video_codec: "libx264".to_string(),
            subtitle_options: Vec::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".subburn"),
            upload_dir: PathBuf::from("uploads"),
            processed_dir: PathBuf::from("processed"),
            audio_filename: "audio.wav".to_string(),
            subtitle_filename: "subtitles.srt".to_string(),
            output_filename: "output.mp4".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_concurrent_jobs: default_max_concurrent_jobs(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            extract_secs: 600,
            transcribe_secs: 3600,
            burn_secs: 3600,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SubburnError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| SubburnError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SubburnError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SubburnError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Reject values that would only fail later inside a job.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_concurrent_jobs == 0 {
            return Err(SubburnError::Config("server.max_concurrent_jobs must be at least 1".to_string()));
        }
        let t = &self.timeouts;
        if t.extract_secs == 0 || t.transcribe_secs == 0 || t.burn_secs == 0 {
            return Err(SubburnError::Config("timeouts must be greater than zero".to_string()));
        }
        for name in [
            &self.storage.audio_filename,
            &self.storage.subtitle_filename,
            &self.storage.output_filename,
        ] {
            if name.is_empty() || name.contains('/') || name.contains('\\') {
                return Err(SubburnError::Config(format!("Invalid artifact filename '{}'", name)));
            }
        }
        Ok(())
    }
}
