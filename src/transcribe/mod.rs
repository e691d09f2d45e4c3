// Speech-to-text backends
//
// Both backends shell out to a whisper command-line tool and map its JSON
// output onto TimedSegment:
// - OpenAI: the `whisper` Python CLI
// - WhisperCpp: whisper.cpp's `whisper-cli`
//
// A new backend needs a serde model of its output, a TranscriptionMapper for
// it, a TranscriberImplementation variant and a factory arm.

pub mod common;
pub mod openai;
pub mod whisper_cpp;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub use common::*;
use crate::config::{TimeoutConfig, TranscriberConfig, TranscriberImplementation};
use crate::error::Result;
use crate::subtitle::TimedSegment;

/// Speech capability consumed by the workflow
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriberTrait: Send + Sync {
    /// Turn mono 16 kHz audio into ordered timed segments
    async fn transcribe(&self, audio_path: &Path, request: &TranscriptionRequest) -> Result<Vec<TimedSegment>>;

    /// Check if the backend can be executed
    async fn check_availability(&self) -> Result<()>;
}

/// Factory for creating transcriber instances
pub struct TranscriberFactory;

impl TranscriberFactory {
    /// Create the transcriber selected by `config.implementation`
    ///
    /// `models_dir` is where downloaded whisper.cpp models live.
    pub fn create_transcriber(
        config: TranscriberConfig,
        timeouts: TimeoutConfig,
        models_dir: PathBuf,
    ) -> Box<dyn TranscriberTrait> {
        match config.implementation {
            TranscriberImplementation::OpenAI => Box::new(openai::OpenAITranscriber::new(config, timeouts)),
            TranscriberImplementation::WhisperCpp => {
                Box::new(whisper_cpp::WhisperCppTranscriber::new(config, timeouts, models_dir))
            }
        }
    }
}
