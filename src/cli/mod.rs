use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "yt-analyzer",
    about = "Fetch YouTube videos, transcripts and frames for analysis",
    version,
    long_about = "Retrieves the video file, a normalized transcript and sampled frame images for a YouTube video. Every command prints exactly one JSON line: {\"success\": true, \"data\": {...}} or {\"success\": false, \"error\": \"...\"}."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (YAML)
    #[arg(long, global = true, value_name = "FILE", env = "YT_ANALYZER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Scratch root for per-video working directories
    #[arg(long, global = true, value_name = "DIR", env = "YT_ANALYZER_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Persistent storage root for finished videos
    #[arg(long, global = true, value_name = "DIR", env = "YT_ANALYZER_STORAGE_DIR")]
    pub storage_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit log lines as JSON on stderr
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a video into persistent storage
    Download {
        /// YouTube URL or 11-character video ID
        #[arg(value_name = "URL_OR_ID")]
        input: String,
    },

    /// Extract JPEG frames from a downloaded video
    ExtractFrames {
        /// YouTube URL or 11-character video ID
        #[arg(value_name = "VIDEO_ID_OR_URL")]
        input: String,

        /// JSON array of timestamps in seconds, e.g. '[30.5, 65, 120]'
        #[arg(value_name = "JSON_TIMESTAMPS")]
        timestamps: String,
    },

    /// Fetch a transcript, trying captions first and yt-dlp subtitles last
    FetchTranscript {
        /// YouTube URL or 11-character video ID
        #[arg(value_name = "URL_OR_ID")]
        input: String,
    },

    /// Report whether yt-dlp and ffmpeg are runnable
    CheckTools,

    /// Show the effective configuration
    Config,
}
