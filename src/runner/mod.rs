use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::AnalyzerError;

/// One invocation of an external tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
    pub current_dir: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// True if `flag` appears among the arguments
    pub fn has_arg(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    /// The argument following `flag`, if any
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Short tool name for messages, e.g. `yt-dlp` for `/usr/local/bin/yt-dlp`
    pub fn tool_name(&self) -> &str {
        Path::new(&self.program)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.program)
    }
}

/// Captured result of a finished tool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    /// Exit code, `None` when terminated by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn status_label(&self) -> String {
        match self.status {
            Some(code) => format!("status {}", code),
            None => "signal".to_string(),
        }
    }
}

/// The only boundary through which external processes are started.
///
/// A non-zero exit is returned as a normal [`ToolOutput`]; only a missing
/// program, a spawn failure or an elapsed timeout are errors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput, AnalyzerError>;
}

/// Runs tools as child processes, killing them when their timeout elapses
#[derive(Debug, Default, Clone)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, command: &ToolCommand) -> Result<ToolOutput, AnalyzerError> {
        tracing::debug!(
            program = %command.program,
            args = ?command.args,
            timeout_secs = command.timeout.as_secs(),
            "running external tool"
        );

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.current_dir {
            cmd.current_dir(dir);
        }

        let output = match tokio::time::timeout(command.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AnalyzerError::ToolMissing {
                    tool: command.tool_name().to_string(),
                    hint: install_hint(command.tool_name()).to_string(),
                });
            }
            Ok(Err(e)) => {
                return Err(AnalyzerError::ToolFailure(format!(
                    "Failed to run {}: {}",
                    command.tool_name(),
                    e
                )));
            }
            Err(_) => {
                tracing::warn!(program = %command.program, "external tool timed out");
                return Err(AnalyzerError::ToolTimeout {
                    tool: command.tool_name().to_string(),
                    secs: command.timeout.as_secs(),
                });
            }
        };

        let result = ToolOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(program = %command.program, status = ?result.status, "external tool finished");
        Ok(result)
    }
}

fn install_hint(tool: &str) -> &'static str {
    match tool {
        "yt-dlp" => "Install it with: pip install yt-dlp",
        "ffmpeg" => "Install it from https://ffmpeg.org/download.html",
        _ => "Make sure it is installed and on PATH",
    }
}
