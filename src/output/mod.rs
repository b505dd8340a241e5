use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use crate::{error_kind, ErrorKind};

/// The single JSON line every command prints
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Envelope {
    Success { success: bool, data: Value },
    Failure { success: bool, error: String, kind: ErrorKind },
}

impl Envelope {
    pub fn success<T: Serialize>(data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Envelope::Success {
                success: true,
                data,
            },
            Err(e) => Envelope::Failure {
                success: false,
                error: format!("Failed to serialize result: {}", e),
                kind: ErrorKind::Io,
            },
        }
    }

    pub fn failure(err: &anyhow::Error) -> Self {
        Envelope::Failure {
            success: false,
            error: format!("{:#}", err),
            kind: error_kind(err),
        }
    }

    pub fn from_result<T: Serialize>(result: &crate::Result<T>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(err) => Self::failure(err),
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            Envelope::Success { .. } => ExitCode::SUCCESS,
            Envelope::Failure { .. } => ExitCode::FAILURE,
        }
    }

    pub fn to_line(&self) -> String {
        // every field is a plain JSON value
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"success":false,"error":"Failed to serialize result","kind":"io"}"#.to_string()
        })
    }

    /// Print the envelope on stdout and hand back the matching exit code
    pub fn emit(&self) -> ExitCode {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", self.to_line()).and_then(|_| stdout.flush()) {
            tracing::error!(error = %e, "failed to write result");
            return ExitCode::FAILURE;
        }
        self.exit_code()
    }
}

/// Spinner on stderr for long tool runs; hidden when quiet
pub fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}

/// Counting bar on stderr for per-item loops; hidden when quiet
pub fn counter(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AnalyzerError;
    use serde_json::json;

    #[test]
    fn test_success_shape() {
        let envelope = Envelope::success(&json!({"video_id": "dQw4w9WgXcQ"}));
        assert_eq!(
            envelope.to_line(),
            r#"{"success":true,"data":{"video_id":"dQw4w9WgXcQ"}}"#
        );
    }

    #[test]
    fn test_failure_shape() {
        let err = anyhow::Error::new(AnalyzerError::Resolution("nope".into()));
        let envelope = Envelope::failure(&err);
        let value: Value = serde_json::from_str(&envelope.to_line()).unwrap();
        assert_eq!(
            value,
            json!({
                "success": false,
                "error": "Could not extract video ID from: nope",
                "kind": "resolution"
            })
        );
    }

    #[test]
    fn test_from_result() {
        let ok: crate::Result<u32> = Ok(3);
        assert!(matches!(Envelope::from_result(&ok), Envelope::Success { .. }));

        let err: crate::Result<u32> = Err(AnalyzerError::NotFound("x".into()).into());
        match Envelope::from_result(&err) {
            Envelope::Failure { kind, .. } => assert_eq!(kind, ErrorKind::NotFound),
            other => panic!("unexpected {other:?}"),
        }
    }
}
