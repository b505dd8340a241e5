use anyhow::{Context, Result};
use indicatif::ProgressBar;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::{TimeoutsConfig, ToolsConfig};
use crate::resolver::VideoId;
use crate::runner::{CommandRunner, ToolCommand};
use crate::utils::{size_mb, tail_chars};
use crate::workspace::Workspace;
use crate::AnalyzerError;

const FORMAT_SELECTOR: &str =
    "bestvideo[height<=1080][ext=mp4]+bestaudio[ext=m4a]/best[height<=1080][ext=mp4]/best";
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm"];
const UNKNOWN_TITLE: &str = "Unknown";

/// Successful `download` payload
#[derive(Debug, Clone, Serialize)]
pub struct DownloadReport {
    pub video_id: VideoId,
    pub path: PathBuf,
    pub title: String,
    pub size_mb: f64,
    pub already_existed: bool,
}

/// Downloads videos with yt-dlp into scratch, then copies them to storage
pub struct Downloader<'a> {
    runner: &'a dyn CommandRunner,
    workspace: &'a Workspace,
    tools: &'a ToolsConfig,
    timeouts: &'a TimeoutsConfig,
}

impl<'a> Downloader<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        workspace: &'a Workspace,
        tools: &'a ToolsConfig,
        timeouts: &'a TimeoutsConfig,
    ) -> Self {
        Self {
            runner,
            workspace,
            tools,
            timeouts,
        }
    }

    fn yt_dlp(&self, timeout: std::time::Duration) -> ToolCommand {
        let command = ToolCommand::new(&self.tools.yt_dlp, timeout);
        match &self.tools.js_runtime {
            Some(runtime) => command.args(["--js-runtimes", runtime.as_str()]),
            None => command,
        }
    }

    /// Video title, or "Unknown" when it cannot be probed
    pub async fn probe_title(&self, id: &VideoId) -> String {
        let command = self
            .yt_dlp(self.timeouts.title_probe())
            .args(["--print", "%(title)s", "--skip-download"])
            .arg(id.watch_url());

        match self.runner.run(&command).await {
            Ok(output) if output.success() => output.stdout.trim().to_string(),
            Ok(output) => {
                tracing::debug!(status = %output.status_label(), "title probe failed");
                UNKNOWN_TITLE.to_string()
            }
            Err(e) => {
                tracing::debug!(error = %e, "title probe failed");
                UNKNOWN_TITLE.to_string()
            }
        }
    }

    /// Ensure the video for `id` is on disk, downloading it if needed.
    ///
    /// `progress` is cleared on every outcome.
    pub async fn download(&self, id: &VideoId, progress: &ProgressBar) -> Result<DownloadReport> {
        let result = self.fetch_or_reuse(id, progress).await;
        progress.finish_and_clear();
        result
    }

    async fn fetch_or_reuse(&self, id: &VideoId, progress: &ProgressBar) -> Result<DownloadReport> {
        let final_path = self.workspace.stored_video_path(id);

        if let Some(size_mb) = existing_size(&final_path) {
            tracing::info!(video_id = %id, path = %final_path.display(), "video already stored");
            let title = self.probe_title(id).await;
            self.workspace.link_video(id, &final_path);
            return Ok(DownloadReport {
                video_id: id.clone(),
                path: final_path,
                title,
                size_mb,
                already_existed: true,
            });
        }

        let work_dir = self.workspace.work_dir(id)?;
        let title = self.probe_title(id).await;

        progress.set_message(format!("Downloading {} with yt-dlp...", id));
        self.run_download(id, &work_dir).await?;
        progress.set_message(format!("Storing {}...", id));

        let scratch_path = locate_download(&work_dir, id)?;
        let size_mb = size_mb(&scratch_path).context("Failed to read downloaded file")?;

        let stored_path = match self.store(&scratch_path, &final_path).await {
            Ok(()) => final_path,
            Err(e) => {
                tracing::warn!(error = %e, "keeping video in scratch location");
                scratch_path
            }
        };
        self.workspace.link_video(id, &stored_path);

        Ok(DownloadReport {
            video_id: id.clone(),
            path: stored_path,
            title,
            size_mb,
            already_existed: false,
        })
    }

    async fn run_download(&self, id: &VideoId, work_dir: &Path) -> Result<()> {
        let template = work_dir.join(format!("{}.%(ext)s", id));
        let command = self
            .yt_dlp(self.timeouts.download())
            .args(["-f", FORMAT_SELECTOR, "--merge-output-format", "mp4", "-o"])
            .arg(template.to_string_lossy())
            .arg("--no-playlist")
            .arg(id.watch_url());

        tracing::info!(video_id = %id, "starting download");
        let output = self.runner.run(&command).await.map_err(|e| match e {
            AnalyzerError::ToolTimeout { secs, .. } => AnalyzerError::ToolTimeout {
                tool: "Download".to_string(),
                secs,
            },
            other => other,
        })?;

        if !output.success() {
            return Err(AnalyzerError::ToolFailure(format!(
                "yt-dlp failed: {}",
                tail_chars(&output.stderr, 500)
            ))
            .into());
        }
        Ok(())
    }

    async fn store(&self, source: &Path, destination: &Path) -> std::io::Result<()> {
        tokio::fs::create_dir_all(self.workspace.storage_root()).await?;
        tokio::fs::copy(source, destination).await?;
        Ok(())
    }
}

/// Size in MiB of a non-empty file at `path`
fn existing_size(path: &Path) -> Option<f64> {
    let meta = fs_err::metadata(path).ok()?;
    (meta.is_file() && meta.len() > 0)
        .then(|| size_mb(path).ok())
        .flatten()
}

/// The file yt-dlp produced: `<id>.mp4`, else the first `<id>.{mp4,mkv,webm}`
fn locate_download(work_dir: &Path, id: &VideoId) -> Result<PathBuf> {
    let expected = work_dir.join(format!("{}.mp4", id));
    if expected.exists() {
        return Ok(expected);
    }

    let mut names: Vec<String> = fs_err::read_dir(work_dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();

    let candidate = names.iter().find(|name| {
        let path = Path::new(name.as_str());
        path.file_stem().and_then(|s| s.to_str()) == Some(id.as_str())
            && path
                .extension()
                .and_then(|e| e.to_str())
                .map_or(false, |ext| VIDEO_EXTENSIONS.contains(&ext))
    });

    match candidate {
        Some(name) => Ok(work_dir.join(name)),
        None => Err(AnalyzerError::NotFound(format!(
            "Download completed but file not found. Files in {}: {:?}",
            work_dir.display(),
            names
        ))
        .into()),
    }
}
