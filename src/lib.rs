//! yt-analyzer - retrieve YouTube video assets for downstream analysis
//!
//! This library resolves YouTube video identifiers and fetches the video file,
//! a normalized transcript, and sampled frame images by orchestrating `yt-dlp`,
//! `ffmpeg` and YouTube's captions endpoint. Every command reports through a
//! single JSON envelope on stdout.

pub mod cli;
pub mod config;
pub mod download;
pub mod frames;
pub mod output;
pub mod pipeline;
pub mod resolver;
pub mod runner;
pub mod transcript;
pub mod utils;
pub mod workspace;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use output::Envelope;
pub use pipeline::Pipeline;
pub use resolver::{resolve, VideoId};
pub use runner::{CommandRunner, SystemRunner, ToolCommand, ToolOutput};
pub use transcript::{Transcript, TranscriptSegment, TranscriptSource};
pub use workspace::Workspace;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the analyzer
#[derive(thiserror::Error, Debug)]
pub enum AnalyzerError {
    #[error("{0}")]
    Usage(String),

    #[error("Could not extract video ID from: {0}")]
    Resolution(String),

    #[error("{tool} timed out after {secs} seconds")]
    ToolTimeout { tool: String, secs: u64 },

    #[error("{tool} not found. {hint}")]
    ToolMissing { tool: String, hint: String },

    #[error("{0}")]
    ToolFailure(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Machine-readable category carried in the failure envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Usage,
    Resolution,
    ToolTimeout,
    ToolMissing,
    ToolFailure,
    NotFound,
    Config,
    Io,
}

impl AnalyzerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalyzerError::Usage(_) => ErrorKind::Usage,
            AnalyzerError::Resolution(_) => ErrorKind::Resolution,
            AnalyzerError::ToolTimeout { .. } => ErrorKind::ToolTimeout,
            AnalyzerError::ToolMissing { .. } => ErrorKind::ToolMissing,
            AnalyzerError::ToolFailure(_) => ErrorKind::ToolFailure,
            AnalyzerError::NotFound(_) => ErrorKind::NotFound,
            AnalyzerError::Config(_) => ErrorKind::Config,
        }
    }
}

/// Classify any error surfaced to the top level.
pub fn error_kind(err: &anyhow::Error) -> ErrorKind {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<AnalyzerError>())
        .map(AnalyzerError::kind)
        .unwrap_or(ErrorKind::Io)
}
