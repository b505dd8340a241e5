use std::path::Path;

use crate::runner::{CommandRunner, ToolCommand};
use crate::AnalyzerError;
use serde::Serialize;

/// Format seconds as `H:MM:SS` (one hour and above) or `M:SS`.
///
/// Fractions are truncated, not rounded.
pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// File size in MiB, rounded to one decimal
pub fn size_mb(path: &Path) -> std::io::Result<f64> {
    let bytes = fs_err::metadata(path)?.len();
    Ok(round_to(bytes as f64 / (1024.0 * 1024.0), 1))
}

/// File size in KiB, rounded to one decimal
pub fn size_kb(path: &Path) -> std::io::Result<f64> {
    let bytes = fs_err::metadata(path)?.len();
    Ok(round_to(bytes as f64 / 1024.0, 1))
}

/// Keep only the last `max_chars` characters of tool output
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return "";
    }
    let trimmed = text.trim();
    match trimmed.char_indices().rev().nth(max_chars - 1) {
        Some((idx, _)) => &trimmed[idx..],
        None => trimmed,
    }
}

/// Availability of one external tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    pub tool: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
}

/// Check if the current environment has the required tools
pub async fn check_dependencies(
    runner: &dyn CommandRunner,
    yt_dlp: &str,
    ffmpeg: &str,
) -> Vec<ToolStatus> {
    let mut statuses = Vec::new();
    // ffmpeg only understands the single-dash spelling
    for (program, flag) in [(yt_dlp, "--version"), (ffmpeg, "-version")] {
        statuses.push(check_command_available(runner, program, flag).await);
    }
    statuses
}

async fn check_command_available(
    runner: &dyn CommandRunner,
    program: &str,
    flag: &str,
) -> ToolStatus {
    let command = ToolCommand::new(program, std::time::Duration::from_secs(10)).arg(flag);

    match runner.run(&command).await {
        Ok(output) if output.success() => ToolStatus {
            tool: program.to_string(),
            available: true,
            version: output.stdout.lines().next().map(|l| l.trim().to_string()),
            problem: None,
        },
        Ok(output) => ToolStatus {
            tool: program.to_string(),
            available: false,
            version: None,
            problem: Some(format!(
                "exited with {}: {}",
                output.status_label(),
                tail_chars(&output.stderr, 200)
            )),
        },
        Err(err) => {
            tracing::warn!(tool = program, error = %err, "tool check failed");
            ToolStatus {
                tool: program.to_string(),
                available: false,
                version: None,
                problem: Some(match err {
                    AnalyzerError::ToolMissing { .. } => "not installed".to_string(),
                    other => other.to_string(),
                }),
            }
        }
    }
}
