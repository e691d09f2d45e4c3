// Media processing over the ffmpeg command line
//
// - Processor: the MediaProcessorTrait implementation used by the workflow
// - Commands: argument builders and bounded execution

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::Path;

pub use commands::*;
pub use processor::*;

use crate::config::{MediaConfig, TimeoutConfig};
use crate::error::Result;

/// Transcoding capability consumed by the workflow
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProcessorTrait: Send + Sync {
    /// Write a mono 16 kHz PCM WAV of the video's audio track to `audio_path`
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()>;

    /// Produce `output_path`: the video with subtitles rendered into its frames
    async fn burn_subtitles(&self, video_path: &Path, subtitle_path: &Path, output_path: &Path) -> Result<()>;

    /// Check if the media processor can be executed
    async fn check_availability(&self) -> Result<()>;

    /// First line of the media processor's version banner
    async fn get_version_info(&self) -> Result<String>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (FFmpeg-based)
    pub fn create_processor(config: MediaConfig, timeouts: TimeoutConfig) -> Box<dyn MediaProcessorTrait> {
        Box::new(processor::MediaProcessorImpl::new(config, timeouts))
    }
}
