//! subburn - automated subtitle burn-in
//!
//! Takes a video, extracts its audio with ffmpeg, transcribes or translates
//! the speech with whisper, writes an SRT file and renders the subtitles into
//! a new copy of the video. Runs from the command line or as a small upload
//! web service that tracks each request as a job.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod jobs;
pub mod media;
pub mod process;
pub mod setup;
pub mod subtitle;
pub mod transcribe;
pub mod workflow;
