// OpenAI Whisper command-line backend

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use super::common::{check_segment_order, read_json_output, validate_language, TranscriptionMapper};
use super::{TranscriberTrait, TranscriptionRequest};
use crate::config::{TimeoutConfig, TranscriberConfig};
use crate::error::{Result, Stage, SubburnError};
use crate::process::run_with_timeout;
use crate::subtitle::TimedSegment;

/// OpenAI Whisper JSON output format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIWhisperOutput {
    #[serde(default)]
    pub text: String,
    pub segments: Vec<OpenAIWhisperSegment>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIWhisperSegment {
    pub id: u64,
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub avg_logprob: Option<f64>,
    pub no_speech_prob: Option<f64>,
}

pub struct OpenAIWhisperMapper;

impl TranscriptionMapper<OpenAIWhisperOutput> for OpenAIWhisperMapper {
    fn to_segments(whisper_output: OpenAIWhisperOutput) -> Result<Vec<TimedSegment>> {
        Ok(whisper_output
            .segments
            .into_iter()
            .map(|seg| TimedSegment::new(seg.start, seg.end, seg.text))
            .collect())
    }
}

pub struct OpenAITranscriber {
    config: TranscriberConfig,
    timeouts: TimeoutConfig,
}

impl OpenAITranscriber {
    pub fn new(config: TranscriberConfig, timeouts: TimeoutConfig) -> Self {
        Self { config, timeouts }
    }

    fn build_command(&self, audio_path: &Path, request: &TranscriptionRequest, output_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.config.binary_path);
        cmd.arg(audio_path)
            .arg("--model")
            .arg(&self.config.model)
            .arg("--task")
            .arg(request.task.as_str())
            .arg("--language")
            .arg(&request.language)
            .arg("--temperature")
            .arg(self.config.temperature.to_string())
            .arg("--output_format")
            .arg("json")
            .arg("--output_dir")
            .arg(output_dir);
        cmd
    }
}

#[async_trait]
impl TranscriberTrait for OpenAITranscriber {
    async fn transcribe(&self, audio_path: &Path, request: &TranscriptionRequest) -> Result<Vec<TimedSegment>> {
        validate_language(&request.language)?;
        info!(
            "Running whisper ({}, {}) on {} with model {}",
            request.task.as_str(),
            request.language,
            audio_path.display(),
            self.config.model
        );

        // whisper writes <stem>.json into the output directory
        let temp_dir = tempfile::tempdir()
            .map_err(|e| SubburnError::transcription(format!("Failed to create temp directory: {}", e)))?;

        let cmd = self.build_command(audio_path, request, temp_dir.path());
        run_with_timeout(cmd, Stage::Transcription, "whisper", self.timeouts.transcribe()).await?;

        let audio_stem = audio_path
            .file_stem()
            .ok_or_else(|| SubburnError::transcription("Invalid audio filename"))?;
        let json_file = temp_dir.path().join(format!("{}.json", audio_stem.to_string_lossy()));

        let output: OpenAIWhisperOutput = read_json_output(&json_file)?;
        debug!("Whisper detected language: {:?}", output.language);

        let segments = OpenAIWhisperMapper::to_segments(output)?;
        check_segment_order(&segments);
        info!("Transcription produced {} segments", segments.len());
        Ok(segments)
    }

    async fn check_availability(&self) -> Result<()> {
        let mut cmd = Command::new(&self.config.binary_path);
        cmd.arg("--help");

        run_with_timeout(cmd, Stage::Transcription, "whisper --help", Duration::from_secs(30))
            .await
            .map_err(|e| {
                SubburnError::Config(format!(
                    "OpenAI Whisper not available (install with `pip install openai-whisper`): {}",
                    e
                ))
            })?;

        info!("OpenAI Whisper command-line tool is available");
        Ok(())
    }
}
