// Job tracking for the web surface
//
// - Job: status record and its state machine
// - Workspace: per-job artifact paths and upload naming
// - Manager: background execution, lookup and persistence

pub mod job;
pub mod manager;
pub mod workspace;

pub use job::{Job, JobStatus};
pub use manager::{load_jobs, JobManager};
pub use workspace::{sanitize_filename, upload_path, JobWorkspace};
