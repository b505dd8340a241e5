use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::download::{DownloadReport, Downloader};
use crate::frames::{self, FrameExtractor, FramesReport};
use crate::output;
use crate::resolver::resolve;
use crate::runner::{CommandRunner, SystemRunner};
use crate::transcript::captions::{CaptionsApi, InnertubeCaptions};
use crate::transcript::{self, TranscriptFetcher, TranscriptReport};
use crate::utils::{self, ToolStatus};
use crate::workspace::Workspace;

/// Successful `check-tools` payload
#[derive(Debug, Clone, Serialize)]
pub struct ToolsReport {
    pub all_available: bool,
    pub tools: Vec<ToolStatus>,
}

/// Wires configuration, the tool runner and the captions client into the
/// operations exposed on the command line
pub struct Pipeline {
    config: Config,
    workspace: Workspace,
    runner: Arc<dyn CommandRunner>,
    captions: Option<Arc<dyn CaptionsApi>>,
    quiet: bool,
}

impl Pipeline {
    /// Create a pipeline that runs real tools
    pub fn new(config: Config, quiet: bool) -> Result<Self> {
        let captions: Option<Arc<dyn CaptionsApi>> = if config.captions.enabled {
            Some(Arc::new(InnertubeCaptions::new(&config.captions)?))
        } else {
            None
        };
        Ok(Self::with_parts(config, Arc::new(SystemRunner::new()), captions, quiet))
    }

    pub fn with_parts(
        config: Config,
        runner: Arc<dyn CommandRunner>,
        captions: Option<Arc<dyn CaptionsApi>>,
        quiet: bool,
    ) -> Self {
        Self {
            workspace: Workspace::new(&config.paths),
            config,
            runner,
            captions,
            quiet,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn download(&self, input: &str) -> Result<DownloadReport> {
        let id = resolve(input)?;
        tracing::info!(video_id = %id, "download requested");

        let downloader = Downloader::new(
            self.runner.as_ref(),
            &self.workspace,
            &self.config.tools,
            &self.config.timeouts,
        );
        downloader.download(&id, &output::spinner(self.quiet)).await
    }

    pub async fn extract_frames(&self, input: &str, timestamps: &str) -> Result<FramesReport> {
        let id = resolve(input)?;
        let timestamps = frames::parse_timestamps(timestamps)?;
        tracing::info!(video_id = %id, count = timestamps.len(), "frame extraction requested");

        let extractor = FrameExtractor::new(
            self.runner.as_ref(),
            &self.config.tools,
            &self.config.frames,
            self.config.timeouts.frame(),
        );
        frames::extract_frames(
            &extractor,
            &self.workspace,
            &id,
            timestamps,
            &output::counter(self.quiet),
        )
        .await
    }

    pub async fn fetch_transcript(&self, input: &str) -> Result<TranscriptReport> {
        let id = resolve(input)?;
        tracing::info!(video_id = %id, "transcript requested");

        let fetcher = TranscriptFetcher::new(
            self.runner.as_ref(),
            self.captions.as_deref(),
            &self.workspace,
            &self.config.tools.yt_dlp,
            self.config.timeouts.subtitles(),
        );
        transcript::fetch_transcript(&fetcher, &id).await
    }

    pub async fn check_tools(&self) -> ToolsReport {
        let tools = utils::check_dependencies(
            self.runner.as_ref(),
            &self.config.tools.yt_dlp,
            &self.config.tools.ffmpeg,
        )
        .await;
        ToolsReport {
            all_available: tools.iter().all(|t| t.available),
            tools,
        }
    }
}
