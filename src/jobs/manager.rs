use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::job::{Job, JobStatus};
use super::workspace::{sanitize_filename, upload_path, JobWorkspace};
use crate::config::{StorageConfig, TranscriptionTask};
use crate::error::{Result, SubburnError};
use crate::transcribe::TranscriptionRequest;
use crate::workflow::{StageObserver, Workflow};

/// Name given to uploads whose client filename has nothing usable in it
const FALLBACK_UPLOAD_NAME: &str = "upload.mp4";

/// In-memory job table mirrored to `job.json` files
struct JobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
    storage: StorageConfig,
}

impl JobStore {
    /// Apply `change` to a job and persist the result
    async fn update<F>(&self, id: Uuid, change: F) -> Result<()>
    where
        F: FnOnce(&mut Job) -> Result<()>,
    {
        let snapshot = {
            let mut jobs = self.jobs.write().await;
            let job = jobs
                .get_mut(&id)
                .ok_or_else(|| SubburnError::Job(format!("Unknown job {}", id)))?;
            change(job)?;
            job.clone()
        };
        self.persist(&snapshot).await;
        Ok(())
    }

    /// Failures are logged; the in-memory table stays authoritative
    async fn persist(&self, job: &Job) {
        let record_path = JobWorkspace::for_job(&self.storage, job.id).record_path();
        if let Err(e) = write_record(&record_path, job).await {
            warn!("Could not persist job {} to {}: {}", job.id, record_path.display(), e);
        }
    }
}

async fn write_record(path: &Path, job: &Job) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(job)?;
    fs::write(path, json).await?;
    Ok(())
}

/// Advances a job's status as the pipeline reports progress
struct JobProgress {
    store: Arc<JobStore>,
    id: Uuid,
}

#[async_trait]
impl StageObserver for JobProgress {
    async fn on_status(&self, status: JobStatus) {
        debug!("Job {} reached {}", self.id, status);
        if let Err(e) = self.store.update(self.id, |job| job.advance(status)).await {
            warn!("Job {}: {}", self.id, e);
        }
    }
}

/// Runs jobs in the background and answers status queries
#[derive(Clone)]
pub struct JobManager {
    store: Arc<JobStore>,
    workflow: Arc<Workflow>,
    permits: Arc<Semaphore>,
}

impl JobManager {
    /// Create storage directories and reload jobs from earlier runs.
    ///
    /// A job that was still running when the process stopped cannot be
    /// resumed, so it is recorded as failed.
    pub async fn new(workflow: Arc<Workflow>, max_concurrent_jobs: usize) -> Result<Self> {
        let storage = workflow.config().storage.clone();
        fs::create_dir_all(&storage.upload_dir).await?;
        fs::create_dir_all(&storage.processed_dir).await?;

        let jobs = load_jobs(&storage.processed_dir).await?;
        let store = Arc::new(JobStore {
            jobs: RwLock::new(HashMap::new()),
            storage,
        });

        let mut interrupted = 0;
        for mut job in jobs {
            if !job.status.is_terminal() {
                job.fail(&SubburnError::Job("interrupted".to_string()))?;
                store.persist(&job).await;
                interrupted += 1;
            }
            store.jobs.write().await.insert(job.id, job);
        }

        let loaded = store.jobs.read().await.len();
        if loaded > 0 {
            info!("Loaded {} jobs ({} interrupted)", loaded, interrupted);
        }

        Ok(Self {
            store,
            workflow,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
        })
    }

    /// Allocate a job and the path its upload must be written to.
    ///
    /// The job is not tracked until it is passed to [`JobManager::submit`].
    pub async fn create_job(
        &self,
        original_filename: &str,
        target_language: &str,
        task: TranscriptionTask,
    ) -> Result<Job> {
        let id = Uuid::new_v4();
        let filename = sanitize_filename(original_filename).unwrap_or_else(|| FALLBACK_UPLOAD_NAME.to_string());
        let video_path = upload_path(&self.store.storage, id, &filename);

        if let Some(parent) = video_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        Ok(Job::new(id, original_filename, target_language, task, video_path))
    }

    /// Track `job` and start its pipeline in the background
    pub async fn submit(&self, job: Job) -> Result<Uuid> {
        let id = job.id;
        if job.status != JobStatus::Uploaded {
            return Err(SubburnError::Job(format!("Job {} was already submitted", id)));
        }

        let request = TranscriptionRequest::new(job.target_language.clone(), job.task);
        let video_path = job.video_path.clone();

        self.store.jobs.write().await.insert(id, job.clone());
        self.store.persist(&job).await;
        info!("Queued job {} ({})", id, job.original_filename);

        let store = self.store.clone();
        let workflow = self.workflow.clone();
        let permits = self.permits.clone();

        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("Job {} could not be scheduled: {}", id, e);
                    return;
                }
            };

            let workspace = JobWorkspace::for_job(&store.storage, id);
            let progress = JobProgress {
                store: store.clone(),
                id,
            };

            let result = workflow.process(&video_path, &workspace, &request, &progress).await;
            let recorded = match result {
                Ok(output) => {
                    store
                        .update(id, |job| {
                            job.subtitle_path = Some(output.subtitle_path);
                            job.output_video_path = Some(output.output_video_path);
                            job.advance(JobStatus::Done)
                        })
                        .await
                }
                Err(e) => {
                    if e.is_transient() {
                        warn!("Job {} failed with a transient error; resubmit to retry", id);
                    }
                    store.update(id, |job| job.fail(&e)).await
                }
            };

            if let Err(e) = recorded {
                error!("Job {} finished but its status could not be recorded: {}", id, e);
            }
        });

        Ok(id)
    }

    pub async fn get(&self, id: Uuid) -> Option<Job> {
        self.store.jobs.read().await.get(&id).cloned()
    }

    /// All known jobs, newest first
    pub async fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.store.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }
}

/// Read every `job.json` under `processed_dir` without modifying any of them.
///
/// Unreadable records are skipped with a warning.
pub async fn load_jobs(processed_dir: &Path) -> Result<Vec<Job>> {
    let mut jobs = Vec::new();
    let mut entries = fs::read_dir(processed_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let record_path = entry.path().join("job.json");
        if !record_path.is_file() {
            continue;
        }

        let loaded = fs::read_to_string(&record_path)
            .await
            .map_err(SubburnError::from)
            .and_then(|content| serde_json::from_str::<Job>(&content).map_err(SubburnError::from));
        match loaded {
            Ok(job) => jobs.push(job),
            Err(e) => warn!("Skipping unreadable job record {}: {}", record_path.display(), e),
        }
    }

    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::Stage;
    use crate::media::MockMediaProcessorTrait;
    use crate::subtitle::TimedSegment;
    use crate::transcribe::MockTranscriberTrait;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage.upload_dir = dir.path().join("uploads");
        config.storage.processed_dir = dir.path().join("processed");
        config
    }

    fn working_workflow(config: Config) -> Arc<Workflow> {
        let mut media = MockMediaProcessorTrait::new();
        media.expect_extract_audio().returning(|_, audio| {
            std::fs::write(audio, b"RIFF").unwrap();
            Ok(())
        });
        media.expect_burn_subtitles().returning(|_, _, out| {
            std::fs::write(out, b"captioned").unwrap();
            Ok(())
        });
        let mut transcriber = MockTranscriberTrait::new();
        transcriber
            .expect_transcribe()
            .returning(|_, _| Ok(vec![TimedSegment::new(0.0, 2.0, "Hi")]));

        Arc::new(Workflow::with_components(config, Box::new(transcriber), Box::new(media)))
    }

    async fn wait_for_terminal(manager: &JobManager, id: Uuid) -> Job {
        for _ in 0..200 {
            if let Some(job) = manager.get(id).await {
                if job.status.is_terminal() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish", id);
    }

    async fn upload(manager: &JobManager, name: &str) -> Job {
        let job = manager
            .create_job(name, "es", TranscriptionTask::Translate)
            .await
            .unwrap();
        std::fs::write(&job.video_path, b"video bytes").unwrap();
        job
    }

    #[tokio::test]
    async fn test_submitted_job_runs_to_done() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let manager = JobManager::new(working_workflow(config.clone()), 2).await.unwrap();

        let job = upload(&manager, "my clip.mp4").await;
        assert!(job.video_path.ends_with("my_clip.mp4"));
        let id = manager.submit(job).await.unwrap();

        let job = wait_for_terminal(&manager, id).await;
        assert!(job.is_done(), "unexpected status {}", job.status);

        let workspace = JobWorkspace::for_job(&config.storage, id);
        assert_eq!(job.subtitle_path.as_deref(), Some(workspace.subtitle_path.as_path()));
        assert_eq!(job.output_video_path.as_deref(), Some(workspace.output_path.as_path()));
        assert!(workspace.record_path().exists());
        assert_eq!(
            std::fs::read_to_string(&workspace.subtitle_path).unwrap(),
            "1\n00:00:00,000 --> 00:00:02,000\nHi\n\n"
        );
    }

    #[tokio::test]
    async fn test_failed_stage_is_recorded() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        let mut media = MockMediaProcessorTrait::new();
        media
            .expect_extract_audio()
            .returning(|_, _| Err(SubburnError::audio_extraction("no audio stream")));
        let workflow = Arc::new(Workflow::with_components(
            config,
            Box::new(MockTranscriberTrait::new()),
            Box::new(media),
        ));
        let manager = JobManager::new(workflow, 1).await.unwrap();

        let job = upload(&manager, "clip.mp4").await;
        let id = manager.submit(job).await.unwrap();
        let job = wait_for_terminal(&manager, id).await;

        match job.status {
            JobStatus::Failed { stage, reason } => {
                assert_eq!(stage, Some(Stage::AudioExtraction));
                assert!(reason.contains("no audio stream"));
            }
            other => panic!("expected failure, got {}", other),
        }
        assert!(job.output_video_path.is_none());
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let dir = TempDir::new().unwrap();
        let manager = JobManager::new(working_workflow(config_in(&dir)), 2).await.unwrap();

        let first = manager.submit(upload(&manager, "a.mp4").await).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = manager.submit(upload(&manager, "b.mp4").await).await.unwrap();

        let ids: Vec<Uuid> = manager.list().await.into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![second, first]);
        assert!(manager.get(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_resubmitting_is_rejected() {
        let dir = TempDir::new().unwrap();
        let manager = JobManager::new(working_workflow(config_in(&dir)), 1).await.unwrap();

        let mut job = upload(&manager, "a.mp4").await;
        job.advance(JobStatus::AudioExtracted).unwrap();
        assert!(matches!(manager.submit(job).await, Err(SubburnError::Job(_))));
    }

    #[tokio::test]
    async fn test_reload_marks_unfinished_jobs_interrupted() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        let mut running = Job::new(Uuid::new_v4(), "a.mp4", "en", TranscriptionTask::Transcribe, "a.mp4".into());
        running.advance(JobStatus::AudioExtracted).unwrap();
        let mut finished = Job::new(Uuid::new_v4(), "b.mp4", "en", TranscriptionTask::Translate, "b.mp4".into());
        for status in [
            JobStatus::AudioExtracted,
            JobStatus::Transcribed,
            JobStatus::SubtitlesWritten,
            JobStatus::Burned,
            JobStatus::Done,
        ] {
            finished.advance(status).unwrap();
        }
        for job in [&running, &finished] {
            let path = JobWorkspace::for_job(&config.storage, job.id).record_path();
            write_record(&path, job).await.unwrap();
        }
        std::fs::create_dir_all(config.storage.processed_dir.join("junk")).unwrap();
        std::fs::write(config.storage.processed_dir.join("junk/job.json"), "{not json").unwrap();

        let manager = JobManager::new(working_workflow(config.clone()), 1).await.unwrap();

        let reloaded = manager.get(running.id).await.unwrap();
        assert_eq!(
            reloaded.status,
            JobStatus::Failed {
                stage: None,
                reason: "Job error: interrupted".to_string(),
            }
        );
        assert!(manager.get(finished.id).await.unwrap().is_done());
        assert_eq!(manager.list().await.len(), 2);

        // The repaired status is written back
        let record = JobWorkspace::for_job(&config.storage, running.id).record_path();
        let on_disk: Job = serde_json::from_str(&std::fs::read_to_string(record).unwrap()).unwrap();
        assert_eq!(on_disk.status.label(), "failed");
    }
}
