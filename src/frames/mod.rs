use anyhow::Result;
use indicatif::ProgressBar;
use serde::Serialize;
use serde_json::{Number, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{FramesConfig, ToolsConfig};
use crate::resolver::VideoId;
use crate::runner::{CommandRunner, ToolCommand};
use crate::utils::{format_timestamp, size_kb};
use crate::workspace::Workspace;
use crate::AnalyzerError;

/// One requested frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRequest {
    pub seconds: f64,
    /// The number exactly as the caller wrote it
    pub raw: Number,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractedFrame {
    pub timestamp: Number,
    pub timestamp_formatted: String,
    pub path: PathBuf,
    pub size_kb: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedFrame {
    pub timestamp: Number,
    pub timestamp_formatted: String,
}

/// Successful `extract-frames` payload
#[derive(Debug, Clone, Serialize)]
pub struct FramesReport {
    pub video_id: VideoId,
    pub frames_dir: PathBuf,
    pub extracted_count: usize,
    pub failed_count: usize,
    pub frames: Vec<ExtractedFrame>,
    pub failed: Vec<FailedFrame>,
}

/// Parse the caller's JSON array of timestamps in seconds
pub fn parse_timestamps(raw: &str) -> Result<Vec<Number>, AnalyzerError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| AnalyzerError::Usage(format!("Invalid JSON timestamps: {}", e)))?;

    let items = match value {
        Value::Array(items) if !items.is_empty() => items,
        _ => {
            return Err(AnalyzerError::Usage(
                "Timestamps must be a non-empty JSON array of numbers.".to_string(),
            ))
        }
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Number(n) if n.as_f64().is_some() => Ok(n),
            other => Err(AnalyzerError::Usage(format!(
                "Invalid timestamp: {} (must be a number)",
                other
            ))),
        })
        .collect()
}

/// `frame_<M-SS>_<seconds:.1>s.jpg`
pub fn frame_file_name(seconds: f64) -> String {
    format!(
        "frame_{}_{:.1}s.jpg",
        format_timestamp(seconds).replace(':', "-"),
        seconds
    )
}

/// Requests in ascending time order; equal times keep the caller's order
pub fn plan_requests(timestamps: Vec<Number>, frames_dir: &Path) -> Vec<FrameRequest> {
    let mut requests: Vec<FrameRequest> = timestamps
        .into_iter()
        .filter_map(|raw| {
            let seconds = raw.as_f64()?;
            Some(FrameRequest {
                seconds,
                output: frames_dir.join(frame_file_name(seconds)),
                raw,
            })
        })
        .collect();
    requests.sort_by(|a, b| a.seconds.total_cmp(&b.seconds));
    requests
}

/// Grabs single frames with ffmpeg
pub struct FrameExtractor<'a> {
    runner: &'a dyn CommandRunner,
    ffmpeg: &'a str,
    timeout: Duration,
    height: u32,
    quality: u32,
}

impl<'a> FrameExtractor<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        tools: &'a ToolsConfig,
        frames: &FramesConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            ffmpeg: &tools.ffmpeg,
            timeout,
            height: frames.height,
            quality: frames.quality,
        }
    }

    fn command(&self, video: &Path, request: &FrameRequest) -> ToolCommand {
        ToolCommand::new(self.ffmpeg, self.timeout).args([
            "-ss".to_string(),
            request.raw.to_string(),
            "-i".to_string(),
            video.to_string_lossy().into_owned(),
            "-vframes".to_string(),
            "1".to_string(),
            "-vf".to_string(),
            format!("scale=-1:{}", self.height),
            "-q:v".to_string(),
            self.quality.to_string(),
            "-y".to_string(),
            request.output.to_string_lossy().into_owned(),
        ])
    }

    /// True when ffmpeg exited cleanly and left the frame on disk
    pub async fn extract(&self, video: &Path, request: &FrameRequest) -> bool {
        match self.runner.run(&self.command(video, request)).await {
            Ok(output) if output.success() => request.output.exists(),
            Ok(output) => {
                tracing::debug!(
                    timestamp = request.seconds,
                    status = %output.status_label(),
                    "ffmpeg failed to extract frame"
                );
                false
            }
            Err(e) => {
                tracing::debug!(timestamp = request.seconds, error = %e, "ffmpeg did not run");
                false
            }
        }
    }
}

/// Extract one frame per timestamp from the stored video for `id`.
///
/// Individual failures are reported, not fatal; the call fails only when
/// no frame at all could be extracted.
pub async fn extract_frames(
    extractor: &FrameExtractor<'_>,
    workspace: &Workspace,
    id: &VideoId,
    timestamps: Vec<Number>,
    progress: &ProgressBar,
) -> Result<FramesReport> {
    let video = workspace.find_video(id)?.ok_or_else(|| {
        AnalyzerError::NotFound(format!("Video not found for {}. Run download first.", id))
    })?;

    let frames_dir = workspace.frames_dir(id)?;
    let requests = plan_requests(timestamps, &frames_dir);
    progress.set_length(requests.len() as u64);

    let mut frames = Vec::new();
    let mut failed = Vec::new();

    for request in requests {
        let timestamp_formatted = format_timestamp(request.seconds);
        progress.set_message(timestamp_formatted.clone());

        let extracted = extractor.extract(&video, &request).await;
        // a frame that vanished before it could be measured counts as failed
        match extracted.then(|| size_kb(&request.output).ok()).flatten() {
            Some(size_kb) => frames.push(ExtractedFrame {
                timestamp: request.raw,
                timestamp_formatted,
                path: request.output,
                size_kb,
            }),
            None => failed.push(FailedFrame {
                timestamp: request.raw,
                timestamp_formatted,
            }),
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    if frames.is_empty() {
        return Err(AnalyzerError::NotFound("Failed to extract any frames.".to_string()).into());
    }

    tracing::info!(
        video_id = %id,
        extracted = frames.len(),
        failed = failed.len(),
        "frame extraction finished"
    );

    Ok(FramesReport {
        video_id: id.clone(),
        frames_dir,
        extracted_count: frames.len(),
        failed_count: failed.len(),
        frames,
        failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathsConfig;
    use crate::resolver::resolve;
    use crate::runner::{MockCommandRunner, ToolOutput};
    use crate::{error_kind, ErrorKind};

    fn setup(root: &Path) -> (Workspace, VideoId) {
        let ws = Workspace::new(&PathsConfig {
            scratch_root: root.join("scratch"),
            storage_root: root.join("storage"),
        });
        let id = resolve("dQw4w9WgXcQ").unwrap();
        fs_err::create_dir_all(ws.storage_root()).unwrap();
        fs_err::write(ws.stored_video_path(&id), b"not really a video").unwrap();
        (ws, id)
    }

    /// Pretends to be ffmpeg: writes the output file unless the seek
    /// position is listed in `fail_at`.
    fn fake_ffmpeg(fail_at: &'static [&'static str]) -> MockCommandRunner {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(move |cmd| {
            let seek = cmd.arg_after("-ss").unwrap().to_string();
            if fail_at.contains(&seek.as_str()) {
                return Ok(ToolOutput {
                    status: Some(1),
                    stderr: "Invalid data".into(),
                    ..Default::default()
                });
            }
            let out = cmd.args.last().unwrap();
            fs_err::write(out, vec![0u8; 2048]).unwrap();
            Ok(ToolOutput {
                status: Some(0),
                ..Default::default()
            })
        });
        runner
    }

    #[test]
    fn test_parse_timestamps() {
        let parsed = parse_timestamps("[65.0, 30.5, 120]").unwrap();
        let shown: Vec<String> = parsed.iter().map(|n| n.to_string()).collect();
        assert_eq!(shown, ["65.0", "30.5", "120"]);

        for bad in ["", "[", "[]", "{}", "12", "[1, \"2\"]", "[null]"] {
            let err = parse_timestamps(bad).unwrap_err();
            assert!(matches!(err, AnalyzerError::Usage(_)), "{bad}");
        }
        assert_eq!(
            parse_timestamps("[1, true]").unwrap_err().to_string(),
            "Invalid timestamp: true (must be a number)"
        );
    }

    #[test]
    fn test_frame_file_name() {
        assert_eq!(frame_file_name(30.5), "frame_0-30_30.5s.jpg");
        assert_eq!(frame_file_name(65.0), "frame_1-05_65.0s.jpg");
        assert_eq!(frame_file_name(3725.3), "frame_1-02-05_3725.3s.jpg");
        // same clock label, different file
        assert_ne!(frame_file_name(10.2), frame_file_name(10.7));
    }

    #[test]
    fn test_plan_sorts_stably() {
        let stamps = parse_timestamps("[65.0, 30.5, 120.0, 30.5]").unwrap();
        let plan = plan_requests(stamps, Path::new("/frames"));
        let order: Vec<f64> = plan.iter().map(|r| r.seconds).collect();
        assert_eq!(order, [30.5, 30.5, 65.0, 120.0]);
        assert_eq!(plan[2].output, Path::new("/frames/frame_1-05_65.0s.jpg"));
    }

    #[tokio::test]
    async fn test_partial_failure_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let (ws, id) = setup(dir.path());
        let runner = fake_ffmpeg(&["120.0"]);
        let tools = ToolsConfig::default();
        let extractor = FrameExtractor::new(&runner, &tools, &FramesConfig::default(), Duration::from_secs(30));

        let stamps = parse_timestamps("[65.0, 30.5, 120.0]").unwrap();
        let report = extract_frames(&extractor, &ws, &id, stamps, &ProgressBar::hidden())
            .await
            .unwrap();

        assert_eq!(report.extracted_count, 2);
        assert_eq!(report.failed_count, 1);
        let done: Vec<String> = report.frames.iter().map(|f| f.timestamp.to_string()).collect();
        assert_eq!(done, ["30.5", "65.0"]);
        assert_eq!(report.frames[1].timestamp_formatted, "1:05");
        assert_eq!(report.frames[0].size_kb, 2.0);
        assert_eq!(report.failed[0].timestamp_formatted, "2:00");
        assert!(report.frames[0].path.starts_with(&report.frames_dir));
    }

    #[tokio::test]
    async fn test_all_failures_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let (ws, id) = setup(dir.path());
        let runner = fake_ffmpeg(&["1", "2"]);
        let tools = ToolsConfig::default();
        let extractor = FrameExtractor::new(&runner, &tools, &FramesConfig::default(), Duration::from_secs(30));

        let stamps = parse_timestamps("[2, 1]").unwrap();
        let err = extract_frames(&extractor, &ws, &id, stamps, &ProgressBar::hidden())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to extract any frames.");
        assert_eq!(error_kind(&err), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_ffmpeg_command_line() {
        let dir = tempfile::tempdir().unwrap();
        let (ws, id) = setup(dir.path());
        let video = ws.stored_video_path(&id);

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(move |cmd| {
                cmd.program == "ffmpeg"
                    && cmd.arg_after("-ss") == Some("7")
                    && cmd.arg_after("-i") == Some(video.to_str().unwrap())
                    && cmd.arg_after("-vframes") == Some("1")
                    && cmd.arg_after("-vf") == Some("scale=-1:720")
                    && cmd.arg_after("-q:v") == Some("2")
                    && cmd.has_arg("-y")
                    && cmd.timeout == Duration::from_secs(30)
            })
            .times(1)
            .returning(|_| {
                Err(AnalyzerError::ToolTimeout {
                    tool: "ffmpeg".into(),
                    secs: 30,
                })
            });
        let tools = ToolsConfig::default();
        let extractor = FrameExtractor::new(&runner, &tools, &FramesConfig::default(), Duration::from_secs(30));

        let stamps = parse_timestamps("[7]").unwrap();
        assert!(extract_frames(&extractor, &ws, &id, stamps, &ProgressBar::hidden())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_missing_video() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(&PathsConfig {
            scratch_root: dir.path().join("scratch"),
            storage_root: dir.path().join("storage"),
        });
        let id = resolve("dQw4w9WgXcQ").unwrap();
        let mut runner = MockCommandRunner::new();
        runner.expect_run().never();
        let tools = ToolsConfig::default();
        let extractor = FrameExtractor::new(&runner, &tools, &FramesConfig::default(), Duration::from_secs(30));

        let err = extract_frames(&extractor, &ws, &id, parse_timestamps("[1]").unwrap(), &ProgressBar::hidden())
            .await
            .unwrap_err();
        assert_eq!(error_kind(&err), ErrorKind::NotFound);
        assert!(err.to_string().starts_with("Video not found for dQw4w9WgXcQ"));
    }
}
