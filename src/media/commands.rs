use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

use crate::error::{Result, Stage};
use crate::process::run_with_timeout;

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
    pub stage: Stage,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2, stage: Stage) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
            stage,
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-acodec").arg(codec)
    }

    /// Copy audio stream unmodified
    pub fn copy_audio(self) -> Self {
        self.arg("-c:a").arg("copy")
    }

    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    pub fn audio_channels(self, channels: u32) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    /// Execute the command, killing it after `timeout`
    pub async fn execute(&self, timeout: Duration) -> Result<Output> {
        let mut cmd = Command::new(&self.binary_path);
        cmd.args(&self.args);
        run_with_timeout(cmd, self.stage, &self.description, timeout).await
    }
}

/// Builder for the ffmpeg invocations the pipeline needs
#[derive(Debug, Clone)]
pub struct MediaCommandBuilder {
    binary_path: String,
}

impl MediaCommandBuilder {
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Mono 16 kHz signed 16-bit PCM, the input format whisper expects
    pub fn extract_audio<P: AsRef<Path>>(&self, video_path: P, audio_path: P) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Audio extraction", Stage::AudioExtraction)
            .input(video_path)
            .no_video()
            .audio_codec("pcm_s16le")
            .audio_sample_rate(16000)
            .audio_channels(1)
            .overwrite()
            .output(audio_path)
    }

    /// Render subtitles into the frames, keeping the original audio stream
    pub fn burn_subtitles<P: AsRef<Path>>(
        &self,
        video_path: P,
        subtitle_path: P,
        output_path: P,
        video_codec: &str,
        additional_options: &[String],
    ) -> MediaCommand {
        let mut cmd = MediaCommand::new(&self.binary_path, "Subtitle burn-in", Stage::Burn)
            .overwrite()
            .input(&video_path)
            .video_filter(subtitles_filter(subtitle_path.as_ref()));

        if !video_codec.is_empty() {
            cmd = cmd.video_codec(video_codec);
        }

        cmd.copy_audio()
            .args(additional_options.iter().cloned())
            .output(output_path)
    }

    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check", Stage::Burn).arg("-version")
    }
}

/// Build the `subtitles=` filter for a path.
///
/// Inside a filtergraph `:` separates options and `\` escapes, so Windows
/// separators are flipped, colons escaped, and the whole path single-quoted.
pub fn subtitles_filter(subtitle_path: &Path) -> String {
    let escaped = subtitle_path
        .to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "'\\''");
    format!("subtitles='{}'", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_extract_audio_args() {
        let cmd = MediaCommandBuilder::new("ffmpeg").extract_audio("in.mp4", "out.wav");
        assert_eq!(
            cmd.args,
            vec!["-i", "in.mp4", "-vn", "-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1", "-y", "out.wav"]
        );
        assert_eq!(cmd.stage, Stage::AudioExtraction);
    }

    #[test]
    fn test_burn_subtitles_args() {
        let options = vec!["-crf".to_string(), "23".to_string()];
        let cmd = MediaCommandBuilder::new("ffmpeg").burn_subtitles(
            Path::new("in.mp4"),
            Path::new("/jobs/1/subtitles.srt"),
            Path::new("/jobs/1/output.mp4"),
            "libx264",
            &options,
        );

        assert_eq!(
            cmd.args,
            vec![
                "-y",
                "-i",
                "in.mp4",
                "-vf",
                "subtitles='/jobs/1/subtitles.srt'",
                "-c:v",
                "libx264",
                "-c:a",
                "copy",
                "-crf",
                "23",
                "/jobs/1/output.mp4",
            ]
        );
        assert_eq!(cmd.stage, Stage::Burn);
    }

    #[test]
    fn test_burn_without_codec_override() {
        let cmd = MediaCommandBuilder::new("ffmpeg").burn_subtitles(
            Path::new("a.mp4"),
            Path::new("a.srt"),
            Path::new("b.mp4"),
            "",
            &[],
        );
        assert!(!cmd.args.iter().any(|a| a == "-c:v"));
    }

    #[test]
    fn test_subtitles_filter_escapes_windows_paths() {
        let path = PathBuf::from(r"C:\jobs\1\subtitles.srt");
        assert_eq!(subtitles_filter(&path), r"subtitles='C\:/jobs/1/subtitles.srt'");
    }

    #[test]
    fn test_subtitles_filter_escapes_quotes() {
        let path = PathBuf::from("/tmp/it's.srt");
        assert_eq!(subtitles_filter(&path), r"subtitles='/tmp/it'\''s.srt'");
    }
}
