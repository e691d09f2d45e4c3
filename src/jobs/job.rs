use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::TranscriptionTask;
use crate::error::{Result, Stage, SubburnError};

/// Lifecycle of a single job.
///
/// Jobs move forward one step at a time and may fail from any non-terminal
/// state. `Done` and `Failed` are terminal; a failed job is resubmitted, not
/// resumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Uploaded,
    AudioExtracted,
    Transcribed,
    SubtitlesWritten,
    Burned,
    Done,
    Failed { stage: Option<Stage>, reason: String },
}

impl JobStatus {
    /// The status that follows this one on success
    pub fn next(&self) -> Option<JobStatus> {
        match self {
            JobStatus::Uploaded => Some(JobStatus::AudioExtracted),
            JobStatus::AudioExtracted => Some(JobStatus::Transcribed),
            JobStatus::Transcribed => Some(JobStatus::SubtitlesWritten),
            JobStatus::SubtitlesWritten => Some(JobStatus::Burned),
            JobStatus::Burned => Some(JobStatus::Done),
            JobStatus::Done | JobStatus::Failed { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobStatus::Uploaded => "uploaded",
            JobStatus::AudioExtracted => "audio_extracted",
            JobStatus::Transcribed => "transcribed",
            JobStatus::SubtitlesWritten => "subtitles_written",
            JobStatus::Burned => "burned",
            JobStatus::Done => "done",
            JobStatus::Failed { .. } => "failed",
        }
    }

    /// Validate a move from `self` to `to`
    pub fn transition(&self, to: JobStatus) -> Result<JobStatus> {
        let allowed = match &to {
            JobStatus::Failed { .. } => !self.is_terminal(),
            _ => self.next().as_ref() == Some(&to),
        };

        if allowed {
            Ok(to)
        } else {
            Err(SubburnError::InvalidTransition {
                from: self.label().to_string(),
                to: to.label().to_string(),
            })
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Failed { stage: Some(stage), reason } => write!(f, "failed during {}: {}", stage, reason),
            JobStatus::Failed { stage: None, reason } => write!(f, "failed: {}", reason),
            other => f.write_str(other.label()),
        }
    }
}

/// Status record for one upload-to-captioned-video request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub original_filename: String,
    pub target_language: String,
    pub task: TranscriptionTask,
    pub status: JobStatus,
    /// Where the uploaded video is stored
    pub video_path: PathBuf,
    pub subtitle_path: Option<PathBuf>,
    pub output_video_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        id: Uuid,
        original_filename: impl Into<String>,
        target_language: impl Into<String>,
        task: TranscriptionTask,
        video_path: PathBuf,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            original_filename: original_filename.into(),
            target_language: target_language.into(),
            task,
            status: JobStatus::Uploaded,
            video_path,
            subtitle_path: None,
            output_video_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn advance(&mut self, to: JobStatus) -> Result<()> {
        self.status = self.status.transition(to)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Move to `Failed`, recording the stage and message of `error`
    pub fn fail(&mut self, error: &SubburnError) -> Result<()> {
        self.advance(JobStatus::Failed {
            stage: error.stage(),
            reason: error.to_string(),
        })
    }

    pub fn is_done(&self) -> bool {
        self.status == JobStatus::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(Uuid::new_v4(), "clip.mp4", "es", TranscriptionTask::Translate, PathBuf::from("clip.mp4"))
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut job = job();
        for status in [
            JobStatus::AudioExtracted,
            JobStatus::Transcribed,
            JobStatus::SubtitlesWritten,
            JobStatus::Burned,
            JobStatus::Done,
        ] {
            job.advance(status).unwrap();
        }
        assert!(job.is_done());
        assert!(job.status.is_terminal());
    }

    #[test]
    fn test_cannot_skip_stages() {
        let mut job = job();
        let err = job.advance(JobStatus::Transcribed).unwrap_err();
        assert!(matches!(err, SubburnError::InvalidTransition { .. }));
        assert_eq!(job.status, JobStatus::Uploaded);
    }

    #[test]
    fn test_fail_from_any_running_state() {
        let mut job = job();
        job.advance(JobStatus::AudioExtracted).unwrap();
        job.fail(&SubburnError::transcription("model crashed")).unwrap();

        assert_eq!(
            job.status,
            JobStatus::Failed {
                stage: Some(Stage::Transcription),
                reason: "Transcription failed: model crashed".to_string(),
            }
        );
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut job = job();
        job.fail(&SubburnError::NotFound("clip.mp4".into())).unwrap();

        assert!(job.advance(JobStatus::AudioExtracted).is_err());
        assert!(job.fail(&SubburnError::burn("again")).is_err());
    }

    #[test]
    fn test_status_serialization() {
        let status = JobStatus::Failed {
            stage: Some(Stage::Burn),
            reason: "exit 1".to_string(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["stage"], "burn");
        assert_eq!(status.to_string(), "failed during subtitle burn-in: exit 1");
    }
}
