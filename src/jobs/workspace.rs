use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::StorageConfig;

/// Longest filename kept from an upload
const MAX_FILENAME_LEN: usize = 128;

/// Per-job artifact paths; every job gets its own directory, so jobs never
/// overwrite each other's files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobWorkspace {
    pub root: PathBuf,
    /// Temporary; removed once the job finishes
    pub audio_path: PathBuf,
    pub subtitle_path: PathBuf,
    pub output_path: PathBuf,
}

impl JobWorkspace {
    /// Workspace rooted at `<processed_dir>/<job_id>`
    pub fn for_job(storage: &StorageConfig, job_id: Uuid) -> Self {
        Self::in_dir(storage, storage.processed_dir.join(job_id.to_string()))
    }

    /// Workspace rooted at an arbitrary directory, using the configured artifact names
    pub fn in_dir(storage: &StorageConfig, root: PathBuf) -> Self {
        Self {
            audio_path: root.join(&storage.audio_filename),
            subtitle_path: root.join(&storage.subtitle_filename),
            output_path: root.join(&storage.output_filename),
            root,
        }
    }

    /// Where the job's status record is kept
    pub fn record_path(&self) -> PathBuf {
        self.root.join("job.json")
    }
}

/// Where an uploaded file for `job_id` is stored
pub fn upload_path(storage: &StorageConfig, job_id: Uuid, filename: &str) -> PathBuf {
    storage.upload_dir.join(job_id.to_string()).join(filename)
}

/// Reduce a client-supplied filename to a safe single path component.
///
/// Directory parts are dropped and anything outside `[A-Za-z0-9._-]` becomes
/// `_`. Returns `None` when nothing usable is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");

    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        return None;
    }

    let mut cleaned = cleaned.to_string();
    if cleaned.len() > MAX_FILENAME_LEN {
        let extension = Path::new(&cleaned)
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .filter(|e| e.len() < 16);
        cleaned.truncate(MAX_FILENAME_LEN);
        if let Some(extension) = extension {
            let keep = MAX_FILENAME_LEN - extension.len() - 1;
            cleaned.truncate(keep);
            cleaned.push('.');
            cleaned.push_str(&extension);
        }
    }
    Some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_paths_are_per_job() {
        let storage = StorageConfig::default();
        let a = JobWorkspace::for_job(&storage, Uuid::new_v4());
        let b = JobWorkspace::for_job(&storage, Uuid::new_v4());

        assert_ne!(a.root, b.root);
        assert_ne!(a.subtitle_path, b.subtitle_path);
        assert_ne!(a.output_path, b.output_path);
        assert!(a.audio_path.starts_with(&a.root));
        assert_eq!(a.subtitle_path.file_name().unwrap(), "subtitles.srt");
        assert_eq!(a.record_path(), a.root.join("job.json"));
    }

    #[test]
    fn test_upload_path() {
        let storage = StorageConfig::default();
        let id = Uuid::nil();
        assert_eq!(
            upload_path(&storage, id, "clip.mp4"),
            PathBuf::from("uploads/00000000-0000-0000-0000-000000000000/clip.mp4")
        );
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("clip.mp4").as_deref(), Some("clip.mp4"));
        assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_filename(r"C:\Users\me\my video.mov").as_deref(), Some("my_video.mov"));
        assert_eq!(sanitize_filename(".hidden").as_deref(), Some("hidden"));
        assert_eq!(sanitize_filename(""), None);
        assert_eq!(sanitize_filename("dir/"), None);
        assert_eq!(sanitize_filename("???"), None);
    }

    #[test]
    fn test_sanitize_keeps_extension_when_truncating() {
        let long = format!("{}.mp4", "a".repeat(300));
        let cleaned = sanitize_filename(&long).unwrap();
        assert_eq!(cleaned.len(), MAX_FILENAME_LEN);
        assert!(cleaned.ends_with(".mp4"));
    }
}
