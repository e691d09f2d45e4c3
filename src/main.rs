//! subburn - burn whisper subtitles into videos
//!
//! Entry point for the command line and the upload web server.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use subburn::api::{start_http_server, AppState};
use subburn::cli::{Args, Commands, ConfigAction, JobsAction};
use subburn::config::{Config, TranscriptionTask, DEFAULT_CONFIG_FILE};
use subburn::error::SubburnError;
use subburn::jobs::{load_jobs, JobManager};
use subburn::setup::SetupManager;
use subburn::transcribe::TranscriptionRequest;
use subburn::workflow::Workflow;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };

    // Setup logging to both console and file
    let _guard = setup_logging(args.verbose, &config.storage.data_dir)?;
    info!("Starting subburn {}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Commands::Process {
            input,
            language,
            task,
            output_dir,
        } => {
            let request = request_from(&config, language, task);
            let workflow = Workflow::new(config).await?;
            workflow.check_transcriber().await?;

            let output = workflow.process_single_file(&input, output_dir, &request).await?;
            println!("Subtitles: {}", output.subtitle_path.display());
            println!("Video:     {}", output.output_video_path.display());
        }
        Commands::Batch {
            input_dir,
            language,
            task,
            output_dir,
        } => {
            let request = request_from(&config, language, task);
            let workflow = Workflow::new(config).await?;
            workflow.check_transcriber().await?;

            let summary = workflow.process_directory(&input_dir, output_dir, &request).await?;
            for (video, output) in &summary.succeeded {
                println!("ok      {} -> {}", video.display(), output.output_video_path.display());
            }
            for (video, reason) in &summary.failed {
                println!("failed  {}: {}", video.display(), reason);
            }
            println!(
                "\n{} succeeded, {} failed",
                summary.succeeded.len(),
                summary.failed.len()
            );
            if !summary.failed.is_empty() {
                anyhow::bail!("{} of the videos could not be processed", summary.failed.len());
            }
        }
        Commands::Extract { input, output } => {
            info!("Extracting audio from: {}", input.display());
            let workflow = Workflow::new(config).await?;
            workflow.extract_audio(&input, &output).await?;
        }
        Commands::Transcribe {
            input,
            output,
            language,
            task,
        } => {
            info!("Transcribing audio: {}", input.display());
            let request = request_from(&config, language, task);
            let workflow = Workflow::new(config).await?;
            workflow.check_transcriber().await?;

            let cues = workflow.transcribe_to_srt(&input, &output, &request).await?;
            println!("Wrote {} cues to {}", cues, output.display());
        }
        Commands::Burn {
            video,
            subtitles,
            output,
        } => {
            info!("Burning subtitles into video: {}", video.display());
            let workflow = Workflow::new(config).await?;
            workflow.burn_subtitles(&video, &subtitles, &output).await?;
        }
        Commands::Serve { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            let workflow = Arc::new(Workflow::new(config.clone()).await?);
            if let Err(e) = workflow.check_transcriber().await {
                // Jobs will fail individually until the backend is fixed
                warn!("Speech backend is not ready: {}", e);
            }

            let jobs = JobManager::new(workflow, config.server.max_concurrent_jobs).await?;
            start_http_server(AppState {
                jobs,
                config: Arc::new(config),
            })
            .await?;
        }
        Commands::Jobs { action } => {
            let processed_dir = &config.storage.processed_dir;
            let mut jobs = if processed_dir.is_dir() {
                load_jobs(processed_dir).await?
            } else {
                Vec::new()
            };
            jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));

            match action {
                JobsAction::List => {
                    if jobs.is_empty() {
                        println!("No jobs found.");
                    } else {
                        println!("{:<38} {:<20} {:<10} {:<30}", "Id", "Created", "Language", "Status");
                        println!("{}", "-".repeat(100));
                        for job in &jobs {
                            println!(
                                "{:<38} {:<20} {:<10} {:<30}",
                                job.id,
                                job.created_at.format("%Y-%m-%d %H:%M:%S"),
                                job.target_language,
                                job.status.to_string()
                            );
                        }
                    }
                }
                JobsAction::Show { id } => {
                    let job = jobs
                        .iter()
                        .find(|job| job.id.to_string() == id)
                        .ok_or_else(|| SubburnError::Job(format!("Unknown job {}", id)))?;
                    println!("{}", serde_json::to_string_pretty(job)?);
                }
            }
        }
        Commands::Models { download } => {
            let setup_manager = SetupManager::new(&config.storage.data_dir)?;

            if let Some(name) = download {
                let model = setup_manager.find_model(&name)?;
                let path = setup_manager.download_model(&model).await?;
                println!("Model {} is available at {}", model.name, path.display());
            } else {
                println!("\nAvailable Whisper Models:");
                println!("{:<15} {:<25} {:<10} {:<10}", "Name", "Filename", "Size (MB)", "Status");
                println!("{}", "-".repeat(65));
                for model in setup_manager.available_models() {
                    let status = if setup_manager.is_downloaded(&model) {
                        "Downloaded"
                    } else {
                        "Missing"
                    };
                    println!(
                        "{:<15} {:<25} {:<10.1} {:<10}",
                        model.name, model.filename, model.size_mb, status
                    );
                }
                println!("\nModels directory: {}", setup_manager.models_dir().display());
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Init { path, force } => {
                write_default_config(&path, force)?;
                println!("Wrote default configuration to {}", path.display());
            }
            ConfigAction::Show => {
                print!("{}", toml::to_string_pretty(&config)?);
            }
        },
    }

    Ok(())
}

fn request_from(
    config: &Config,
    language: Option<String>,
    task: Option<TranscriptionTask>,
) -> TranscriptionRequest {
    TranscriptionRequest::new(
        language.unwrap_or_else(|| config.transcriber.default_language.clone()),
        task.unwrap_or(config.transcriber.default_task),
    )
}

fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Config::default().save_to_file(path)?;
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool, data_dir: &Path) -> Result<WorkerGuard> {
    let log_dir = data_dir.join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "subburn.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer().with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("subburn.log").display()
    );

    Ok(guard)
}
