//! Request handlers

use axum::{
    body::Body,
    extract::{multipart::Field, Multipart, Path as UrlPath, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::server::AppState;
use crate::config::TranscriptionTask;
use crate::error::SubburnError;
use crate::jobs::Job;
use crate::transcribe::validate_language;

const UPLOAD_PAGE: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>subburn</title></head>
<body>
<h1>Add subtitles to a video</h1>
<form action="/jobs" method="post" enctype="multipart/form-data">
  <p><input type="file" name="file" accept="video/*" required></p>
  <p><label>Language <input type="text" name="language" value="en" size="6"></label></p>
  <p>
    <label><input type="radio" name="task" value="translate" checked> Translate to English</label>
    <label><input type="radio" name="task" value="transcribe"> Keep spoken language</label>
  </p>
  <p><button type="submit">Upload</button></p>
</form>
<p><a href="/jobs">All jobs</a></p>
</body>
</html>
"#;

/// Error returned to HTTP clients as `{"error": "..."}`
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m),
            ApiError::Internal(m) => {
                error!("Request failed: {}", m);
                (StatusCode::INTERNAL_SERVER_ERROR, m)
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<SubburnError> for ApiError {
    fn from(e: SubburnError) -> Self {
        match e {
            SubburnError::NotFound(_) => ApiError::NotFound(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

/// Upload form
pub async fn index() -> Html<&'static str> {
    Html(UPLOAD_PAGE)
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "subburn",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<Job>> {
    Json(state.jobs.list().await)
}

pub async fn job_status(State(state): State<AppState>, UrlPath(id): UrlPath<String>) -> Result<Json<Job>, ApiError> {
    Ok(Json(find_job(&state, &id).await?))
}

/// Uploaded file parked in the upload directory until its job exists
struct StagedUpload {
    filename: String,
    path: PathBuf,
    size: u64,
}

/// Accept a multipart upload and start a job for it
pub async fn create_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut language: Option<String> = None;
    let mut task: Option<String> = None;
    let mut upload: Option<StagedUpload> = None;

    let parsed: Result<(), ApiError> = async {
        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let path = state
                        .config
                        .storage
                        .upload_dir
                        .join(format!(".incoming-{}", Uuid::new_v4()));
                    // Set before streaming so a failed read still gets cleaned up
                    if let Some(previous) = upload.replace(StagedUpload {
                        filename,
                        path: path.clone(),
                        size: 0,
                    }) {
                        discard(&previous.path).await;
                    }
                    let size = stream_to_file(&mut field, &path).await?;
                    if let Some(staged) = upload.as_mut() {
                        staged.size = size;
                    }
                }
                "language" => language = Some(read_text(field).await?),
                "task" => task = Some(read_text(field).await?),
                other => warn!("Ignoring unexpected form field '{}'", other),
            }
        }
        Ok::<(), ApiError>(())
    }
    .await;

    let staged = match (parsed, upload) {
        (Ok(()), Some(staged)) if staged.size > 0 && !staged.filename.is_empty() => staged,
        (result, staged) => {
            if let Some(staged) = staged {
                discard(&staged.path).await;
            }
            result?;
            return Err(ApiError::BadRequest("No file selected".to_string()));
        }
    };

    match start_job(&state, &staged, language, task).await {
        Ok(job) => {
            info!("Accepted upload {} ({} bytes) as job {}", staged.filename, staged.size, job.id);
            if wants_json(&headers) {
                Ok((StatusCode::ACCEPTED, Json(job)).into_response())
            } else {
                Ok(Redirect::to(&format!("/jobs/{}", job.id)).into_response())
            }
        }
        Err(e) => {
            discard(&staged.path).await;
            Err(e)
        }
    }
}

async fn start_job(
    state: &AppState,
    staged: &StagedUpload,
    language: Option<String>,
    task: Option<String>,
) -> Result<Job, ApiError> {
    let language = language
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| state.config.transcriber.default_language.clone());
    validate_language(&language).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let task = match task.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => t
            .parse::<TranscriptionTask>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => state.config.transcriber.default_task,
    };

    let job = state.jobs.create_job(&staged.filename, &language, task).await?;
    fs::rename(&staged.path, &job.video_path).await?;
    state.jobs.submit(job.clone()).await?;
    Ok(job)
}

pub async fn download_subtitles(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let job = finished_job(&state, &id).await?;
    let path = job
        .subtitle_path
        .as_deref()
        .ok_or_else(|| ApiError::Conflict(format!("Job {} has no subtitles", job.id)))?;
    let filename = format!("{}.srt", download_stem(&job));
    send_file(path, "application/x-subrip", &filename, request).await
}

pub async fn download_video(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
    request: Request,
) -> Result<Response, ApiError> {
    let job = finished_job(&state, &id).await?;
    let path = job
        .output_video_path
        .as_deref()
        .ok_or_else(|| ApiError::Conflict(format!("Job {} has no output video", job.id)))?;
    let filename = format!("{}-subtitled.mp4", download_stem(&job));
    send_file(path, "video/mp4", &filename, request).await
}

async fn find_job(state: &AppState, id: &str) -> Result<Job, ApiError> {
    let unknown = || ApiError::NotFound(format!("Unknown job {}", id));
    let id = Uuid::parse_str(id).map_err(|_| unknown())?;
    state.jobs.get(id).await.ok_or_else(unknown)
}

/// Artifacts are only served once the whole pipeline has finished
async fn finished_job(state: &AppState, id: &str) -> Result<Job, ApiError> {
    let job = find_job(state, id).await?;
    if !job.is_done() {
        return Err(ApiError::Conflict(format!("Job {} is {}", job.id, job.status)));
    }
    Ok(job)
}

fn download_stem(job: &Job) -> String {
    Path::new(&job.original_filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(crate::jobs::sanitize_filename)
        .unwrap_or_else(|| job.id.to_string())
}

/// Stream an artifact from disk; range requests are honoured
async fn send_file(
    path: &Path,
    content_type: &'static str,
    filename: &str,
    request: Request,
) -> Result<Response, ApiError> {
    if !path.is_file() {
        return Err(ApiError::NotFound(format!("{} is missing", path.display())));
    }

    let mut response = match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    };

    if response.status().is_success() {
        let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }
    Ok(response)
}

async fn stream_to_file(field: &mut Field<'_>, path: &Path) -> Result<u64, ApiError> {
    let mut file = fs::File::create(path).await?;
    let mut written = 0u64;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Upload interrupted: {}", e)))?
    {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(written)
}

async fn read_text(field: Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove staged upload {}: {}", path.display(), e);
        }
    }
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("application/json"))
        .unwrap_or(false)
}
