use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::TranscriptionTask;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add burned-in subtitles to a single video file
    Process {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Language code passed to whisper (defaults to the configured language)
        #[arg(short, long)]
        language: Option<String>,

        /// translate or transcribe (defaults to the configured task)
        #[arg(short, long)]
        task: Option<TranscriptionTask>,

        /// Directory for the SRT and captioned video
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Process all video files in a directory
    Batch {
        /// Input directory containing video files
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Language code passed to whisper
        #[arg(short, long)]
        language: Option<String>,

        /// translate or transcribe
        #[arg(short, long)]
        task: Option<TranscriptionTask>,

        /// Output directory; each video gets its own subdirectory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Extract mono 16 kHz audio from a video file
    Extract {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Transcribe or translate an audio file to SRT
    Transcribe {
        /// Input audio file
        #[arg(short, long)]
        input: PathBuf,

        /// Output SRT file
        #[arg(short, long)]
        output: PathBuf,

        /// Language code passed to whisper
        #[arg(short, long)]
        language: Option<String>,

        /// translate or transcribe
        #[arg(short, long)]
        task: Option<TranscriptionTask>,
    },

    /// Burn an SRT file into a video
    Burn {
        /// Input video file
        #[arg(short, long)]
        video: PathBuf,

        /// Subtitle file
        #[arg(short, long)]
        subtitles: PathBuf,

        /// Output video file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run the upload web server
    Serve {
        /// Address to bind (overrides the configuration)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides the configuration)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Inspect jobs recorded by the web server
    Jobs {
        #[command(subcommand)]
        action: JobsAction,
    },

    /// List whisper.cpp models and their status
    Models {
        /// Download the named model
        #[arg(long, value_name = "NAME")]
        download: Option<String>,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum JobsAction {
    /// List all jobs, newest first
    List,

    /// Show one job in full
    Show {
        /// Job id
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a configuration file with default values
    Init {
        /// Where to write it
        #[arg(short, long, default_value = crate::config::DEFAULT_CONFIG_FILE)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_process_arguments() {
        let args = Args::try_parse_from([
            "subburn", "process", "--input", "clip.mp4", "--language", "es", "--task", "transcribe",
        ])
        .unwrap();

        match args.command {
            Commands::Process {
                input, language, task, output_dir,
            } => {
                assert_eq!(input, PathBuf::from("clip.mp4"));
                assert_eq!(language.as_deref(), Some("es"));
                assert_eq!(task, Some(TranscriptionTask::Transcribe));
                assert!(output_dir.is_none());
            }
            _ => panic!("expected process command"),
        }
    }

    #[test]
    fn test_invalid_task_is_rejected() {
        assert!(Args::try_parse_from(["subburn", "process", "-i", "clip.mp4", "--task", "dub"]).is_err());
    }
}
