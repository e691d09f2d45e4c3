use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use super::{MediaCommandBuilder, MediaProcessorTrait};
use crate::config::{MediaConfig, TimeoutConfig};
use crate::error::{Result, SubburnError};

const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// FFmpeg-backed media processor
pub struct MediaProcessorImpl {
    config: MediaConfig,
    timeouts: TimeoutConfig,
    command_builder: MediaCommandBuilder,
}

impl MediaProcessorImpl {
    pub fn new(config: MediaConfig, timeouts: TimeoutConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path);

        Self {
            config,
            timeouts,
            command_builder,
        }
    }
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()> {
        info!("Extracting audio from {} to {}", video_path.display(), audio_path.display());

        let command = self.command_builder.extract_audio(video_path, audio_path);
        command.execute(self.timeouts.extract()).await?;

        if !audio_path.exists() {
            return Err(SubburnError::audio_extraction(format!(
                "ffmpeg reported success but {} was not written",
                audio_path.display()
            )));
        }

        info!("Audio extraction completed");
        Ok(())
    }

    async fn burn_subtitles(&self, video_path: &Path, subtitle_path: &Path, output_path: &Path) -> Result<()> {
        info!(
            "Burning subtitles from {} into {} -> {}",
            subtitle_path.display(),
            video_path.display(),
            output_path.display()
        );

        let command = self.command_builder.burn_subtitles(
            video_path,
            subtitle_path,
            output_path,
            &self.config.video_codec,
            &self.config.subtitle_options,
        );
        command.execute(self.timeouts.burn()).await?;

        info!("Subtitle burn-in completed successfully");
        Ok(())
    }

    async fn check_availability(&self) -> Result<()> {
        self.command_builder
            .version_check()
            .execute(VERSION_CHECK_TIMEOUT)
            .await
            .map_err(|e| SubburnError::Config(format!("Media processor not available: {}", e)))?;

        info!("Media processor is available");
        Ok(())
    }

    async fn get_version_info(&self) -> Result<String> {
        debug!("Getting media processor version information");

        let output = self
            .command_builder
            .version_check()
            .execute(VERSION_CHECK_TIMEOUT)
            .await?;

        let version_info = String::from_utf8_lossy(&output.stdout);
        Ok(version_info.lines().next().unwrap_or("Unknown version").to_string())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Write an executable shell script standing in for ffmpeg.
    fn fake_ffmpeg(dir: &Path, body: &str) -> String {
        let path = dir.join("ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    fn processor(binary_path: String) -> MediaProcessorImpl {
        let config = MediaConfig {
            binary_path,
            ..MediaConfig::default()
        };
        MediaProcessorImpl::new(config, TimeoutConfig::default())
    }

    #[tokio::test]
    async fn test_extract_audio_writes_last_argument() {
        let dir = tempfile::tempdir().unwrap();
        // The output path is the final argument of the extraction command.
        let ffmpeg = fake_ffmpeg(dir.path(), r#"for last; do :; done; echo RIFF > "$last""#);
        let audio = dir.path().join("audio.wav");

        processor(ffmpeg)
            .extract_audio(Path::new("video.mp4"), &audio)
            .await
            .unwrap();

        assert!(audio.exists());
    }

    #[tokio::test]
    async fn test_extract_audio_missing_output_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), "exit 0");

        let err = processor(ffmpeg)
            .extract_audio(Path::new("video.mp4"), &dir.path().join("audio.wav"))
            .await
            .unwrap_err();

        assert!(matches!(err, SubburnError::AudioExtraction { .. }));
    }

    #[tokio::test]
    async fn test_burn_failure_is_burn_error() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), "echo 'No such filter' >&2; exit 1");

        let err = processor(ffmpeg)
            .burn_subtitles(Path::new("v.mp4"), Path::new("s.srt"), &dir.path().join("o.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(err, SubburnError::Burn { transient: false, .. }));
    }

    #[tokio::test]
    async fn test_version_info() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = fake_ffmpeg(dir.path(), "echo 'ffmpeg version 6.1'; echo 'built with gcc'");

        let p = processor(ffmpeg);
        p.check_availability().await.unwrap();
        assert_eq!(p.get_version_info().await.unwrap(), "ffmpeg version 6.1");
    }
}
