use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::AnalyzerError;

const CONFIG_FILE_NAME: &str = "yt-analyzer.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where working files and finished videos live
    pub paths: PathsConfig,

    /// External programs
    pub tools: ToolsConfig,

    /// Per-invocation limits for external programs
    pub timeouts: TimeoutsConfig,

    /// Frame extraction settings
    pub frames: FramesConfig,

    /// Captions API settings
    pub captions: CaptionsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Scratch root; each video gets `<scratch_root>/<video_id>/`
    pub scratch_root: PathBuf,

    /// Persistent storage for finished videos
    pub storage_root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub yt_dlp: String,

    pub ffmpeg: String,

    /// Passed to yt-dlp as `--js-runtimes` for downloads and title probes
    pub js_runtime: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub download_secs: u64,
    pub title_probe_secs: u64,
    pub frame_secs: u64,
    pub subtitles_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramesConfig {
    /// Output height in pixels, width follows the aspect ratio
    pub height: u32,

    /// ffmpeg `-q:v` JPEG quality (2 is near lossless)
    pub quality: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionsConfig {
    /// Query YouTube's captions endpoint before falling back to yt-dlp
    pub enabled: bool,

    pub request_timeout_secs: u64,

    /// Innertube client version reported to the player endpoint
    pub client_version: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let storage_base = dirs::video_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(std::env::temp_dir);
        Self {
            scratch_root: std::env::temp_dir().join("yt-analyzer"),
            storage_root: storage_base.join("yt-analyzer"),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp: "yt-dlp".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            js_runtime: Some("node".to_string()),
        }
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            download_secs: 600,
            title_probe_secs: 30,
            frame_secs: 30,
            subtitles_secs: 60,
        }
    }
}

impl Default for FramesConfig {
    fn default() -> Self {
        Self {
            height: 720,
            quality: 2,
        }
    }
}

impl Default for CaptionsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            request_timeout_secs: 30,
            client_version: "20.10.38".to_string(),
        }
    }
}

impl TimeoutsConfig {
    pub fn download(&self) -> Duration {
        Duration::from_secs(self.download_secs)
    }

    pub fn title_probe(&self) -> Duration {
        Duration::from_secs(self.title_probe_secs)
    }

    pub fn frame(&self) -> Duration {
        Duration::from_secs(self.frame_secs)
    }

    pub fn subtitles(&self) -> Duration {
        Duration::from_secs(self.subtitles_secs)
    }
}

impl Config {
    /// Load configuration from `explicit`, the local file, the user config
    /// directory, or fall back to defaults.
    ///
    /// An explicit path that does not exist is an error; the implicit
    /// locations are optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(AnalyzerError::Config(format!(
                    "config file does not exist: {}",
                    path.display()
                ))
                .into());
            }
            Some(path) => Some(path.to_path_buf()),
            None => Self::config_path(),
        };

        let config = match path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config file");
                Self::from_file(&path)?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        serde_yaml::from_str(&content).map_err(|e| {
            anyhow::Error::from(AnalyzerError::Config(format!(
                "failed to parse {}: {}",
                path.display(),
                e
            )))
        })
    }

    /// First existing config file: current directory, then the user config dir
    fn config_path() -> Option<PathBuf> {
        let local_config = PathBuf::from(CONFIG_FILE_NAME);
        if local_config.exists() {
            return Some(local_config);
        }

        dirs::config_dir()
            .map(|dir| dir.join("yt-analyzer").join("config.yaml"))
            .filter(|path| path.exists())
    }

    /// Apply command line / environment overrides for the path roots
    pub fn with_overrides(mut self, scratch: Option<PathBuf>, storage: Option<PathBuf>) -> Self {
        if let Some(scratch) = scratch {
            self.paths.scratch_root = scratch;
        }
        if let Some(storage) = storage {
            self.paths.storage_root = storage;
        }
        self
    }

    fn validate(&self) -> Result<()> {
        let t = &self.timeouts;
        if [t.download_secs, t.title_probe_secs, t.frame_secs, t.subtitles_secs].contains(&0) {
            return Err(AnalyzerError::Config("timeouts must be greater than zero".into()).into());
        }
        if self.frames.height == 0 {
            return Err(AnalyzerError::Config("frames.height must be greater than zero".into()).into());
        }
        if self.tools.yt_dlp.trim().is_empty() || self.tools.ffmpeg.trim().is_empty() {
            return Err(AnalyzerError::Config("tool programs must not be empty".into()).into());
        }
        if self.captions.enabled && self.captions.request_timeout_secs == 0 {
            return Err(
                AnalyzerError::Config("captions.request_timeout_secs must be greater than zero".into()).into(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error_kind, ErrorKind};

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.timeouts.download(), Duration::from_secs(600));
        assert_eq!(config.timeouts.title_probe(), Duration::from_secs(30));
        assert_eq!(config.timeouts.frame(), Duration::from_secs(30));
        assert_eq!(config.timeouts.subtitles(), Duration::from_secs(60));
        assert_eq!(config.frames.height, 720);
        assert!(config.paths.scratch_root.ends_with("yt-analyzer"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs_err::write(
            &path,
            "paths:\n  scratch_root: /data/scratch\ntimeouts:\n  frame_secs: 5\ncaptions:\n  enabled: false\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.paths.scratch_root, PathBuf::from("/data/scratch"));
        assert_eq!(config.timeouts.frame_secs, 5);
        assert_eq!(config.timeouts.download_secs, 600);
        assert!(!config.captions.enabled);
        assert_eq!(config.tools.yt_dlp, "yt-dlp");
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/yt-analyzer.yaml"))).unwrap_err();
        assert_eq!(error_kind(&err), ErrorKind::Config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        fs_err::write(&path, "timeouts:\n  download_secs: 0\n").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert_eq!(error_kind(&err), ErrorKind::Config);

        fs_err::write(&path, "frames: [not, a, map]\n").unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert_eq!(error_kind(&err), ErrorKind::Config);
    }

    #[test]
    fn test_overrides() {
        let config = Config::default()
            .with_overrides(Some(PathBuf::from("/s")), None)
            .with_overrides(None, Some(PathBuf::from("/p")));
        assert_eq!(config.paths.scratch_root, PathBuf::from("/s"));
        assert_eq!(config.paths.storage_root, PathBuf::from("/p"));
    }
}
