//! Per-video filesystem layout.
//!
//! ```text
//! <scratch_root>/<id>/            working directory
//! <scratch_root>/<id>/frames/     extracted frames
//! <scratch_root>/<id>/subs.*      subtitle artifacts
//! <scratch_root>/<id>/transcript.json
//! <scratch_root>/<id>/video.mp4   link to wherever the video ended up
//! <storage_root>/<id>.mp4         persistent copy
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::PathsConfig;
use crate::resolver::VideoId;

const FRAMES_DIR: &str = "frames";
const SUBTITLES_PREFIX: &str = "subs";
const TRANSCRIPT_FILE: &str = "transcript.json";
const VIDEO_LINK: &str = "video.mp4";

#[derive(Debug, Clone)]
pub struct Workspace {
    scratch_root: PathBuf,
    storage_root: PathBuf,
}

impl Workspace {
    /// Relative roots are anchored to the current directory so link targets
    /// and reported paths stay valid from anywhere.
    pub fn new(paths: &PathsConfig) -> Self {
        Self {
            scratch_root: absolute(&paths.scratch_root),
            storage_root: absolute(&paths.storage_root),
        }
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Working directory for a video, created on demand
    pub fn work_dir(&self, id: &VideoId) -> Result<PathBuf> {
        let dir = self.scratch_root.join(id.as_str());
        fs_err::create_dir_all(&dir).context("Failed to create working directory")?;
        Ok(dir)
    }

    /// Frames directory for a video, created on demand
    pub fn frames_dir(&self, id: &VideoId) -> Result<PathBuf> {
        let dir = self.work_dir(id)?.join(FRAMES_DIR);
        fs_err::create_dir_all(&dir).context("Failed to create frames directory")?;
        Ok(dir)
    }

    /// Output prefix handed to yt-dlp for subtitle files
    pub fn subtitles_prefix(&self, id: &VideoId) -> Result<PathBuf> {
        Ok(self.work_dir(id)?.join(SUBTITLES_PREFIX))
    }

    pub fn transcript_path(&self, id: &VideoId) -> Result<PathBuf> {
        Ok(self.work_dir(id)?.join(TRANSCRIPT_FILE))
    }

    pub fn video_link(&self, id: &VideoId) -> Result<PathBuf> {
        Ok(self.work_dir(id)?.join(VIDEO_LINK))
    }

    /// Canonical persistent location of the finished video
    pub fn stored_video_path(&self, id: &VideoId) -> PathBuf {
        self.storage_root.join(format!("{}.mp4", id))
    }

    /// Point the working-directory link at `target`.
    ///
    /// Best effort: failures are logged and otherwise ignored.
    pub fn link_video(&self, id: &VideoId, target: &Path) {
        let link = match self.video_link(id) {
            Ok(link) => link,
            Err(e) => {
                tracing::warn!(error = %e, "cannot prepare video link");
                return;
            }
        };

        if fs_err::symlink_metadata(&link).is_ok() {
            if let Err(e) = fs_err::remove_file(&link) {
                tracing::warn!(error = %e, "cannot replace existing video link");
                return;
            }
        }

        if let Err(e) = make_symlink(target, &link) {
            tracing::warn!(link = %link.display(), error = %e, "cannot create video link");
        }
    }

    /// Video file for `id`: persistent storage first, then the working link
    pub fn find_video(&self, id: &VideoId) -> Result<Option<PathBuf>> {
        let stored = self.stored_video_path(id);
        if stored.exists() {
            return Ok(Some(stored));
        }

        let link = self.video_link(id)?;
        if link.exists() {
            return Ok(Some(fs_err::canonicalize(&link)?));
        }

        Ok(None)
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot resolve relative path");
            path.to_path_buf()
        }
    }
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;

    fn workspace(root: &Path) -> Workspace {
        Workspace::new(&PathsConfig {
            scratch_root: root.join("scratch"),
            storage_root: root.join("storage"),
        })
    }

    #[test]
    fn test_layout() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        let id = resolve("dQw4w9WgXcQ").unwrap();

        let work = ws.work_dir(&id).unwrap();
        assert_eq!(work, dir.path().join("scratch").join("dQw4w9WgXcQ"));
        assert!(work.is_dir());

        let frames = ws.frames_dir(&id).unwrap();
        assert_eq!(frames, work.join("frames"));
        assert!(frames.is_dir());

        assert_eq!(ws.subtitles_prefix(&id).unwrap(), work.join("subs"));
        assert_eq!(ws.transcript_path(&id).unwrap(), work.join("transcript.json"));
        assert_eq!(
            ws.stored_video_path(&id),
            dir.path().join("storage").join("dQw4w9WgXcQ.mp4")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_link_and_find_video() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(dir.path());
        let id = resolve("dQw4w9WgXcQ").unwrap();

        assert_eq!(ws.find_video(&id).unwrap(), None);

        let first = ws.work_dir(&id).unwrap().join("dQw4w9WgXcQ.webm");
        fs_err::write(&first, b"video").unwrap();
        ws.link_video(&id, &first);
        assert_eq!(
            ws.find_video(&id).unwrap(),
            Some(fs_err::canonicalize(&first).unwrap())
        );

        // relinking replaces the old link
        let second = dir.path().join("elsewhere.mp4");
        fs_err::write(&second, b"video").unwrap();
        ws.link_video(&id, &second);
        assert_eq!(
            fs_err::read_link(ws.video_link(&id).unwrap()).unwrap(),
            second
        );

        // persistent storage wins
        fs_err::create_dir_all(ws.storage_root()).unwrap();
        fs_err::write(ws.stored_video_path(&id), b"video").unwrap();
        assert_eq!(ws.find_video(&id).unwrap(), Some(ws.stored_video_path(&id)));
    }

    /// `target` expressed relative to the process working directory
    #[cfg(unix)]
    fn relative_to_cwd(target: &Path) -> PathBuf {
        let cwd = fs_err::canonicalize(std::env::current_dir().unwrap()).unwrap();
        let mut relative = PathBuf::new();
        for _ in cwd.components().skip(1) {
            relative.push("..");
        }
        relative.join(target.strip_prefix("/").unwrap())
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_roots_keep_links_valid() {
        let dir = tempfile::tempdir().unwrap();
        let root = fs_err::canonicalize(dir.path()).unwrap();
        let ws = Workspace::new(&PathsConfig {
            scratch_root: relative_to_cwd(&root.join("scratch")),
            storage_root: relative_to_cwd(&root.join("storage")),
        });
        let id = resolve("dQw4w9WgXcQ").unwrap();

        assert!(ws.storage_root().is_absolute());
        assert!(ws.transcript_path(&id).unwrap().is_absolute());

        // storage copy failed, video stayed in scratch
        let scratch_video = ws.work_dir(&id).unwrap().join("dQw4w9WgXcQ.mp4");
        fs_err::write(&scratch_video, b"video").unwrap();
        ws.link_video(&id, &scratch_video);

        assert_eq!(
            ws.find_video(&id).unwrap(),
            Some(root.join("scratch").join("dQw4w9WgXcQ").join("dQw4w9WgXcQ.mp4"))
        );
    }
}
