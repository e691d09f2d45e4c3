use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Result, SubburnError};
use crate::jobs::{JobStatus, JobWorkspace};
use crate::media::{MediaProcessorFactory, MediaProcessorTrait};
use crate::subtitle::{parse_srt, write_srt};
use crate::transcribe::{TranscriberFactory, TranscriberTrait, TranscriptionRequest};

const VIDEO_EXTENSIONS: [&str; 7] = ["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm"];

/// Receives each status a job reaches while the pipeline runs
#[async_trait]
pub trait StageObserver: Send + Sync {
    async fn on_status(&self, status: JobStatus);
}

/// Observer that ignores progress
pub struct NoopObserver;

#[async_trait]
impl StageObserver for NoopObserver {
    async fn on_status(&self, _status: JobStatus) {}
}

/// Terminal artifacts of a finished job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobOutput {
    pub subtitle_path: PathBuf,
    pub output_video_path: PathBuf,
}

/// Outcome of processing a directory
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub succeeded: Vec<(PathBuf, JobOutput)>,
    pub failed: Vec<(PathBuf, String)>,
}

pub struct Workflow {
    config: Config,
    transcriber: Box<dyn TranscriberTrait>,
    media: Box<dyn MediaProcessorTrait>,
}

impl Workflow {
    pub async fn new(config: Config) -> Result<Self> {
        let models_dir = config.storage.data_dir.join("models");
        let transcriber =
            TranscriberFactory::create_transcriber(config.transcriber.clone(), config.timeouts.clone(), models_dir);
        let media = MediaProcessorFactory::create_processor(config.media.clone(), config.timeouts.clone());

        // Check dependencies
        media.check_availability().await?;
        info!("Using {}", media.get_version_info().await?);

        Ok(Self::with_components(config, transcriber, media))
    }

    /// Build a workflow around already-constructed capabilities
    pub fn with_components(
        config: Config,
        transcriber: Box<dyn TranscriberTrait>,
        media: Box<dyn MediaProcessorTrait>,
    ) -> Self {
        Self {
            config,
            transcriber,
            media,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Verify the speech backend before any job depends on it
    pub async fn check_transcriber(&self) -> Result<()> {
        self.transcriber.check_availability().await
    }

    /// Run the full pipeline for one video inside `workspace`.
    ///
    /// Stages run strictly in order: extract audio, transcribe, write SRT,
    /// burn in. The first failure aborts the job. The temporary audio file is
    /// removed whatever the outcome.
    pub async fn process(
        &self,
        video_path: &Path,
        workspace: &JobWorkspace,
        request: &TranscriptionRequest,
        observer: &dyn StageObserver,
    ) -> Result<JobOutput> {
        let video_path = fs::canonicalize(video_path)
            .await
            .map_err(|_| SubburnError::NotFound(video_path.display().to_string()))?;
        if !video_path.is_file() {
            return Err(SubburnError::NotFound(video_path.display().to_string()));
        }

        info!("Processing video: {}", video_path.display());

        fs::create_dir_all(&workspace.root).await.map_err(|e| {
            SubburnError::audio_extraction(format!(
                "Failed to create workspace {}: {}",
                workspace.root.display(),
                e
            ))
        })?;

        let result = self.run_stages(&video_path, workspace, request, observer).await;
        remove_temporary_audio(&workspace.audio_path).await;

        match &result {
            Ok(output) => info!("Done! Captioned video saved at: {}", output.output_video_path.display()),
            Err(e) => error!("Processing {} failed: {}", video_path.display(), e),
        }
        result
    }

    async fn run_stages(
        &self,
        video_path: &Path,
        workspace: &JobWorkspace,
        request: &TranscriptionRequest,
        observer: &dyn StageObserver,
    ) -> Result<JobOutput> {
        // Step 1: Extract audio
        self.media.extract_audio(video_path, &workspace.audio_path).await?;
        observer.on_status(JobStatus::AudioExtracted).await;

        // Step 2: Transcribe (or translate)
        let segments = self.transcriber.transcribe(&workspace.audio_path, request).await?;
        observer.on_status(JobStatus::Transcribed).await;

        // Step 3: Write SRT
        write_srt(&segments, &workspace.subtitle_path).await?;
        observer.on_status(JobStatus::SubtitlesWritten).await;

        // Step 4: Burn subtitles into the video
        self.media
            .burn_subtitles(video_path, &workspace.subtitle_path, &workspace.output_path)
            .await?;
        observer.on_status(JobStatus::Burned).await;

        Ok(JobOutput {
            subtitle_path: workspace.subtitle_path.clone(),
            output_video_path: workspace.output_path.clone(),
        })
    }

    /// Process one file, writing artifacts to `output_dir` or a fresh job directory
    pub async fn process_single_file<P: AsRef<Path>>(
        &self,
        input_path: P,
        output_dir: Option<PathBuf>,
        request: &TranscriptionRequest,
    ) -> Result<JobOutput> {
        let workspace = match output_dir {
            Some(dir) => JobWorkspace::in_dir(&self.config.storage, dir),
            None => JobWorkspace::for_job(&self.config.storage, Uuid::new_v4()),
        };
        self.process(input_path.as_ref(), &workspace, request, &NoopObserver).await
    }

    /// Process every video under `input_dir`, one workspace per file.
    ///
    /// A failing file is logged and recorded; the rest of the batch continues.
    pub async fn process_directory<P: AsRef<Path>>(
        &self,
        input_dir: P,
        output_dir: Option<PathBuf>,
        request: &TranscriptionRequest,
    ) -> Result<BatchSummary> {
        let input_dir = input_dir.as_ref();
        info!("Processing directory: {}", input_dir.display());

        if !input_dir.is_dir() {
            return Err(SubburnError::Config("Input path is not a directory".to_string()));
        }

        let output_dir = output_dir.unwrap_or_else(|| self.config.storage.processed_dir.clone());
        let video_files = find_video_files(input_dir);
        info!("Found {} video files to process", video_files.len());

        let mut summary = BatchSummary::default();
        for (index, video_path) in video_files.into_iter().enumerate() {
            let stem = video_path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| format!("video-{}", index + 1));
            // Same-named files in different subdirectories must not share a workspace
            let workspace =
                JobWorkspace::in_dir(&self.config.storage, output_dir.join(format!("{:03}-{}", index + 1, stem)));

            match self.process(&video_path, &workspace, request, &NoopObserver).await {
                Ok(output) => {
                    info!("Successfully processed: {}", video_path.display());
                    summary.succeeded.push((video_path, output));
                }
                Err(e) => {
                    warn!("Failed to process {}: {}", video_path.display(), e);
                    summary.failed.push((video_path, e.to_string()));
                }
            }
        }

        Ok(summary)
    }

    /// Extract audio from a video file
    pub async fn extract_audio<P: AsRef<Path>>(&self, video_path: P, audio_path: P) -> Result<()> {
        let video_path = video_path.as_ref();
        if !video_path.exists() {
            return Err(SubburnError::NotFound(video_path.display().to_string()));
        }
        self.media.extract_audio(video_path, audio_path.as_ref()).await
    }

    /// Transcribe an audio file straight to an SRT file; returns the cue count
    pub async fn transcribe_to_srt<P: AsRef<Path>>(
        &self,
        audio_path: P,
        srt_path: P,
        request: &TranscriptionRequest,
    ) -> Result<usize> {
        let audio_path = audio_path.as_ref();
        if !audio_path.exists() {
            return Err(SubburnError::NotFound(audio_path.display().to_string()));
        }

        let segments = self.transcriber.transcribe(audio_path, request).await?;
        write_srt(&segments, srt_path).await?;
        Ok(segments.len())
    }

    /// Burn an existing SRT file into a video after checking it parses
    pub async fn burn_subtitles<P: AsRef<Path>>(&self, video_path: P, srt_path: P, output_path: P) -> Result<()> {
        let video_path = video_path.as_ref();
        let srt_path = srt_path.as_ref();
        if !video_path.exists() {
            return Err(SubburnError::NotFound(video_path.display().to_string()));
        }

        let content = fs::read_to_string(srt_path)
            .await
            .map_err(|e| SubburnError::Encoding(format!("Failed to read {}: {}", srt_path.display(), e)))?;
        let cues = parse_srt(&content)?;
        info!("Burning {} cues from {}", cues.len(), srt_path.display());

        self.media
            .burn_subtitles(video_path, srt_path, output_path.as_ref())
            .await
    }
}

fn find_video_files(input_dir: &Path) -> Vec<PathBuf> {
    let mut video_files: Vec<PathBuf> = WalkDir::new(input_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .map(|e| e.into_path())
        .collect();
    video_files.sort();
    video_files
}

/// Best-effort removal; a leftover temp file is not worth failing a job over
async fn remove_temporary_audio(audio_path: &Path) {
    match fs::remove_file(audio_path).await {
        Ok(()) => info!("Removed temporary audio {}", audio_path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove temporary audio {}: {}", audio_path.display(), e),
    }
}
