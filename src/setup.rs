use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::{Result, SubburnError};

const MODEL_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// whisper.cpp model names and approximate download sizes
const KNOWN_MODELS: &[(&str, f64)] = &[
    ("tiny", 75.0),
    ("tiny.en", 75.0),
    ("base", 142.0),
    ("base.en", 142.0),
    ("small", 466.0),
    ("small.en", 466.0),
    ("medium", 1500.0),
    ("medium.en", 1500.0),
    ("large-v3", 2900.0),
];

#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub name: String,
    pub filename: String,
    pub url: String,
    pub size_mb: f64,
}

/// Map a model name to a local file; names containing a path or `.bin` are used as given.
pub fn resolve_model_path(models_dir: &Path, model: &str) -> PathBuf {
    if model.contains('/') || model.contains('\\') || model.ends_with(".bin") {
        return PathBuf::from(model);
    }
    models_dir.join(format!("ggml-{}.bin", model))
}

/// Downloads whisper.cpp models into the application data directory
pub struct SetupManager {
    client: Client,
    models_dir: PathBuf,
}

impl SetupManager {
    pub fn new(data_dir: &Path) -> Result<Self> {
        let models_dir = data_dir.join("models");
        std::fs::create_dir_all(&models_dir)?;

        let client = Client::builder()
            .user_agent(concat!("subburn/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, models_dir })
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn available_models(&self) -> Vec<ModelInfo> {
        KNOWN_MODELS
            .iter()
            .map(|(name, size_mb)| {
                let filename = format!("ggml-{}.bin", name);
                ModelInfo {
                    name: name.to_string(),
                    url: format!("{}/{}", MODEL_BASE_URL, filename),
                    filename,
                    size_mb: *size_mb,
                }
            })
            .collect()
    }

    pub fn find_model(&self, name: &str) -> Result<ModelInfo> {
        self.available_models()
            .into_iter()
            .find(|m| m.name == name)
            .ok_or_else(|| SubburnError::Config(format!("Unknown whisper model '{}'", name)))
    }

    pub fn is_downloaded(&self, model: &ModelInfo) -> bool {
        self.models_dir.join(&model.filename).exists()
    }

    /// Fetch a model unless it is already present; returns its local path
    pub async fn download_model(&self, model: &ModelInfo) -> Result<PathBuf> {
        let local_path = self.models_dir.join(&model.filename);

        if local_path.exists() {
            info!("Model {} already exists at {}", model.name, local_path.display());
            return Ok(local_path);
        }

        info!("Downloading {} model (~{:.0} MB)...", model.name, model.size_mb);

        let mut response = self.client.get(&model.url).send().await?;
        if !response.status().is_success() {
            return Err(SubburnError::Config(format!(
                "Failed to download model {}: HTTP {}",
                model.name,
                response.status()
            )));
        }

        let total = response
            .content_length()
            .unwrap_or((model.size_mb * 1_000_000.0) as u64);
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                .map_err(|e| SubburnError::Config(format!("Invalid progress template: {}", e)))?
                .progress_chars("#>-"),
        );

        // Stream into a temp file so an interrupted download never looks complete
        let temp_path = local_path.with_extension("part");
        let mut file = async_fs::File::create(&temp_path).await?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            pb.inc(chunk.len() as u64);
        }
        file.flush().await?;
        drop(file);

        async_fs::rename(&temp_path, &local_path).await?;

        pb.finish_with_message(format!("Downloaded {}", model.name));
        info!("Successfully downloaded {} to {}", model.name, local_path.display());

        Ok(local_path)
    }
}
