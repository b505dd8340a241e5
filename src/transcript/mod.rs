use anyhow::{Context, Result};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::resolver::VideoId;
use crate::runner::CommandRunner;
use crate::utils::{format_timestamp, round_to};
use crate::workspace::Workspace;
use crate::AnalyzerError;

pub mod captions;
pub mod json3;
pub mod subtitles;

use captions::CaptionsApi;

/// Individual transcript segment with timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds, two decimals
    pub start: f64,

    /// Duration in seconds, two decimals
    pub duration: f64,

    pub text: String,

    /// Clock string of the unrounded start
    pub timestamp: String,
}

impl TranscriptSegment {
    pub fn new(start: f64, duration: f64, text: impl Into<String>) -> Self {
        Self {
            start: round_to(start, 2),
            duration: round_to(duration, 2),
            text: text.into(),
            timestamp: format_timestamp(start),
        }
    }
}

/// Chronologically ordered segments; persisted as a bare JSON array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub fn new(mut segments: Vec<TranscriptSegment>) -> Self {
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));
        Self { segments }
    }

    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// End of the last segment
    pub fn total_duration(&self) -> f64 {
        self.segments
            .last()
            .map(|last| round_to(last.start + last.duration, 2))
            .unwrap_or(0.0)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize transcript")?;
        fs_err::write(path, content).context("Failed to write transcript file")?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read transcript file")?;
        serde_json::from_str(&content).context("Failed to parse transcript file")
    }
}

/// Where a transcript came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptSource {
    ManualEnglish,
    AutoEnglish,
    /// Any listed caption track, by language code
    Language(String),
    /// yt-dlp subtitle extraction
    Downloader,
}

impl fmt::Display for TranscriptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptSource::ManualEnglish => write!(f, "en (manual)"),
            TranscriptSource::AutoEnglish => write!(f, "en (auto)"),
            TranscriptSource::Language(code) => write!(f, "{}", code),
            TranscriptSource::Downloader => write!(f, "yt-dlp"),
        }
    }
}

impl Serialize for TranscriptSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Successful `fetch-transcript` payload
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptReport {
    pub video_id: VideoId,
    pub source: TranscriptSource,
    pub segment_count: usize,
    pub total_duration: f64,
    pub total_duration_formatted: String,
    pub transcript_path: PathBuf,
}

/// One step of the fallback chain
#[derive(Debug, Clone, PartialEq)]
enum Attempt {
    /// English through the captions API, reported under the given label
    English(TranscriptSource),
    /// Every listed track through the captions API, in order
    AnyListedLanguage,
    /// yt-dlp subtitle extraction
    Downloader,
}

/// Tries transcript sources in a fixed order and keeps the first success
pub struct TranscriptFetcher<'a> {
    runner: &'a dyn CommandRunner,
    captions: Option<&'a dyn CaptionsApi>,
    workspace: &'a Workspace,
    yt_dlp: &'a str,
    subtitles_timeout: Duration,
}

impl<'a> TranscriptFetcher<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        captions: Option<&'a dyn CaptionsApi>,
        workspace: &'a Workspace,
        yt_dlp: &'a str,
        subtitles_timeout: Duration,
    ) -> Self {
        Self {
            runner,
            captions,
            workspace,
            yt_dlp,
            subtitles_timeout,
        }
    }

    fn plan(&self) -> Vec<Attempt> {
        let mut plan = Vec::with_capacity(4);
        if self.captions.is_some() {
            // Both English steps make the same request; the second only
            // changes the reported label.
            plan.push(Attempt::English(TranscriptSource::ManualEnglish));
            plan.push(Attempt::English(TranscriptSource::AutoEnglish));
            plan.push(Attempt::AnyListedLanguage);
        }
        plan.push(Attempt::Downloader);
        plan
    }

    /// First transcript any source can provide.
    pub async fn fetch(&self, id: &VideoId) -> Result<(Transcript, TranscriptSource)> {
        for attempt in self.plan() {
            tracing::debug!(video_id = %id, ?attempt, "trying transcript source");
            if let Some((segments, source)) = self.try_attempt(&attempt, id).await? {
                tracing::info!(video_id = %id, %source, segments = segments.len(), "transcript found");
                return Ok((Transcript::new(segments), source));
            }
        }

        Err(AnalyzerError::NotFound(
            "No transcript available. Video may lack captions entirely.".to_string(),
        )
        .into())
    }

    /// `Ok(None)` means this source had nothing; errors are reserved for
    /// local failures such as an unusable working directory.
    async fn try_attempt(
        &self,
        attempt: &Attempt,
        id: &VideoId,
    ) -> Result<Option<(Vec<TranscriptSegment>, TranscriptSource)>> {
        match attempt {
            Attempt::English(source) => {
                let Some(api) = self.captions else {
                    return Ok(None);
                };
                Ok(fetch_language(api, id, "en")
                    .await
                    .map(|segments| (segments, source.clone())))
            }
            Attempt::AnyListedLanguage => {
                let Some(api) = self.captions else {
                    return Ok(None);
                };
                let tracks = match api.list(id).await {
                    Ok(tracks) => tracks,
                    Err(e) => {
                        tracing::debug!(error = %e, "listing caption tracks failed");
                        return Ok(None);
                    }
                };
                for track in tracks {
                    if let Some(segments) = fetch_language(api, id, &track.language_code).await {
                        return Ok(Some((segments, TranscriptSource::Language(track.language_code))));
                    }
                }
                Ok(None)
            }
            Attempt::Downloader => {
                let prefix = self.workspace.subtitles_prefix(id)?;
                Ok(subtitles::fetch_subtitles(
                    self.runner,
                    self.yt_dlp,
                    &prefix,
                    &id.watch_url(),
                    self.subtitles_timeout,
                )
                .await
                .map(|segments| (segments, TranscriptSource::Downloader)))
            }
        }
    }
}

async fn fetch_language(
    api: &dyn CaptionsApi,
    id: &VideoId,
    language: &str,
) -> Option<Vec<TranscriptSegment>> {
    match api.fetch(id, &[language.to_string()]).await {
        Ok(segments) if !segments.is_empty() => Some(segments),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(language, error = %e, "caption fetch failed");
            None
        }
    }
}

/// Fetch, persist and summarize the transcript for `id`
pub async fn fetch_transcript(fetcher: &TranscriptFetcher<'_>, id: &VideoId) -> Result<TranscriptReport> {
    let (transcript, source) = fetcher.fetch(id).await?;

    let transcript_path = fetcher.workspace.transcript_path(id)?;
    transcript.save(&transcript_path)?;

    let total_duration = transcript.total_duration();
    Ok(TranscriptReport {
        video_id: id.clone(),
        source,
        segment_count: transcript.len(),
        total_duration,
        total_duration_formatted: format_timestamp(total_duration),
        transcript_path,
    })
}
