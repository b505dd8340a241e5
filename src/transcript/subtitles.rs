use std::path::{Path, PathBuf};
use std::time::Duration;

use super::json3::parse_json3;
use super::TranscriptSegment;
use crate::runner::{CommandRunner, ToolCommand};

/// Prefer auto captions, then uploaded ones
const SUBTITLE_FLAGS: [&str; 2] = ["--write-auto-sub", "--write-sub"];
const SUBTITLE_SUFFIXES: [&str; 2] = [".en.json3", ".json3"];

/// English subtitles extracted by yt-dlp into `<prefix>.en.json3`.
///
/// Returns `None` when yt-dlp produced nothing usable. A timeout or a
/// missing yt-dlp ends the attempt without trying the next flag.
pub async fn fetch_subtitles(
    runner: &dyn CommandRunner,
    yt_dlp: &str,
    prefix: &Path,
    url: &str,
    timeout: Duration,
) -> Option<Vec<TranscriptSegment>> {
    let output_template = prefix.to_string_lossy().into_owned();

    for flag in SUBTITLE_FLAGS {
        let command = ToolCommand::new(yt_dlp, timeout).args([
            "--skip-download",
            flag,
            "--sub-lang",
            "en",
            "--sub-format",
            "json3",
            "--convert-subs",
            "json3",
            "-o",
            output_template.as_str(),
            url,
        ]);

        match runner.run(&command).await {
            Ok(output) if !output.success() => {
                tracing::debug!(flag, status = %output.status_label(), "yt-dlp subtitle run failed");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(flag, error = %e, "yt-dlp subtitle extraction aborted");
                return None;
            }
        }

        if let Some(path) = produced_file(prefix) {
            return read_subtitles(&path);
        }
    }

    None
}

fn produced_file(prefix: &Path) -> Option<PathBuf> {
    SUBTITLE_SUFFIXES
        .iter()
        .map(|suffix| {
            let mut name = prefix.as_os_str().to_owned();
            name.push(suffix);
            PathBuf::from(name)
        })
        .find(|path| path.exists())
}

fn read_subtitles(path: &Path) -> Option<Vec<TranscriptSegment>> {
    let content = match fs_err::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(error = %e, "cannot read subtitle file");
            return None;
        }
    };

    match parse_json3(&content) {
        Ok(segments) if !segments.is_empty() => Some(segments),
        Ok(_) => {
            tracing::debug!(path = %path.display(), "subtitle file has no text");
            None
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot parse subtitle file");
            None
        }
    }
}
