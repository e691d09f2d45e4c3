// whisper.cpp `whisper-cli` backend

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use super::common::{check_segment_order, read_json_output, validate_language, TranscriptionMapper};
use super::{TranscriberTrait, TranscriptionRequest};
use crate::config::{TimeoutConfig, TranscriberConfig, TranscriptionTask};
use crate::error::{Result, Stage, SubburnError};
use crate::process::run_with_timeout;
use crate::setup::resolve_model_path;
use crate::subtitle::TimedSegment;

/// whisper.cpp `-oj` output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppOutput {
    pub result: Option<WhisperCppResult>,
    pub transcription: Vec<WhisperCppSegment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppResult {
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppSegment {
    pub offsets: WhisperCppOffsets,
    pub text: String,
}

/// Segment boundaries in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperCppOffsets {
    pub from: i64,
    pub to: i64,
}

pub struct WhisperCppMapper;

impl TranscriptionMapper<WhisperCppOutput> for WhisperCppMapper {
    fn to_segments(whisper_output: WhisperCppOutput) -> Result<Vec<TimedSegment>> {
        Ok(whisper_output
            .transcription
            .into_iter()
            .map(|seg| {
                TimedSegment::new(
                    seg.offsets.from.max(0) as f64 / 1000.0,
                    seg.offsets.to.max(0) as f64 / 1000.0,
                    seg.text,
                )
            })
            .collect())
    }
}

pub struct WhisperCppTranscriber {
    config: TranscriberConfig,
    timeouts: TimeoutConfig,
    models_dir: PathBuf,
}

impl WhisperCppTranscriber {
    pub fn new(config: TranscriberConfig, timeouts: TimeoutConfig, models_dir: PathBuf) -> Self {
        Self {
            config,
            timeouts,
            models_dir,
        }
    }

    fn model_path(&self) -> Result<PathBuf> {
        let path = resolve_model_path(&self.models_dir, &self.config.model);
        if !path.exists() {
            return Err(SubburnError::transcription(format!(
                "whisper.cpp model not found at {} (run `subburn models --download {}`)",
                path.display(),
                self.config.model
            )));
        }
        Ok(path)
    }

    fn build_command(
        &self,
        model_path: &Path,
        audio_path: &Path,
        request: &TranscriptionRequest,
        output_prefix: &Path,
    ) -> Command {
        let mut cmd = Command::new(&self.config.binary_path);
        cmd.arg("-m")
            .arg(model_path)
            .arg("-f")
            .arg(audio_path)
            .arg("-l")
            .arg(&request.language)
            .arg("-tp")
            .arg(self.config.temperature.to_string());

        if request.task == TranscriptionTask::Translate {
            cmd.arg("-tr");
        }

        cmd.arg("-oj").arg("-of").arg(output_prefix);
        cmd
    }
}

#[async_trait]
impl TranscriberTrait for WhisperCppTranscriber {
    async fn transcribe(&self, audio_path: &Path, request: &TranscriptionRequest) -> Result<Vec<TimedSegment>> {
        validate_language(&request.language)?;
        let model_path = self.model_path()?;
        info!(
            "Running whisper.cpp ({}, {}) on {} with {}",
            request.task.as_str(),
            request.language,
            audio_path.display(),
            model_path.display()
        );

        let temp_dir = tempfile::tempdir()
            .map_err(|e| SubburnError::transcription(format!("Failed to create temp directory: {}", e)))?;
        let output_prefix = temp_dir.path().join("transcript");

        let cmd = self.build_command(&model_path, audio_path, request, &output_prefix);
        run_with_timeout(cmd, Stage::Transcription, "whisper-cli", self.timeouts.transcribe()).await?;

        let output: WhisperCppOutput = read_json_output(&output_prefix.with_extension("json"))?;
        debug!("whisper.cpp language: {:?}", output.result.as_ref().map(|r| &r.language));

        let segments = WhisperCppMapper::to_segments(output)?;
        check_segment_order(&segments);
        info!("Transcription produced {} segments", segments.len());
        Ok(segments)
    }

    async fn check_availability(&self) -> Result<()> {
        let mut cmd = Command::new(&self.config.binary_path);
        cmd.arg("--help");

        run_with_timeout(cmd, Stage::Transcription, "whisper-cli --help", Duration::from_secs(30))
            .await
            .map_err(|e| SubburnError::Config(format!("whisper.cpp not available: {}", e)))?;
        self.model_path()
            .map_err(|e| SubburnError::Config(e.to_string()))?;

        info!("whisper.cpp is available");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_OUTPUT: &str = r#"{
        "systeminfo": "AVX = 1",
        "model": {"type": "base"},
        "result": {"language": "en"},
        "transcription": [
            {"timestamps": {"from": "00:00:00,000", "to": "00:00:02,000"},
             "offsets": {"from": 0, "to": 2000}, "text": " Hi"},
            {"timestamps": {"from": "00:00:02,000", "to": "00:00:04,500"},
             "offsets": {"from": 2000, "to": 4500}, "text": " there"}
        ]
    }"#;

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_mapper_converts_milliseconds() {
        let output: WhisperCppOutput = serde_json::from_str(SAMPLE_OUTPUT).unwrap();
        let segments = WhisperCppMapper::to_segments(output).unwrap();

        assert_eq!(
            segments,
            vec![TimedSegment::new(0.0, 2.0, " Hi"), TimedSegment::new(2.0, 4.5, " there")]
        );
    }

    #[test]
    fn test_translate_flag_only_for_translate_task() {
        let transcriber = WhisperCppTranscriber::new(
            TranscriberConfig::default(),
            TimeoutConfig::default(),
            PathBuf::from("models"),
        );
        let model = Path::new("models/ggml-base.bin");
        let audio = Path::new("audio.wav");
        let prefix = Path::new("/tmp/transcript");

        let translate = transcriber.build_command(model, audio, &TranscriptionRequest::translate("fr"), prefix);
        assert!(args_of(&translate).contains(&"-tr".to_string()));

        let transcribe = transcriber.build_command(model, audio, &TranscriptionRequest::transcribe("fr"), prefix);
        let args = args_of(&transcribe);
        assert!(!args.contains(&"-tr".to_string()));
        assert!(args.windows(2).any(|w| w == ["-l", "fr"]));
    }

    #[tokio::test]
    async fn test_missing_model_is_transcription_error() {
        let dir = tempfile::tempdir().unwrap();
        let transcriber =
            WhisperCppTranscriber::new(TranscriberConfig::default(), TimeoutConfig::default(), dir.path().to_path_buf());

        let err = transcriber
            .transcribe(Path::new("audio.wav"), &TranscriptionRequest::translate("en"))
            .await
            .unwrap_err();
        assert!(matches!(err, SubburnError::Transcription { .. }));
        assert!(err.to_string().contains("ggml-base.bin"));
    }
}
