use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

use super::json3::parse_json3;
use super::TranscriptSegment;
use crate::config::CaptionsConfig;
use crate::resolver::VideoId;

const PLAYER_ENDPOINT: &str = "https://www.youtube.com/youtubei/v1/player?prettyPrint=false";

/// A caption track advertised for a video
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionTrack {
    pub language_code: String,
    /// Automatic speech recognition track
    pub generated: bool,
    pub base_url: String,
}

/// Source of caption tracks for a video
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CaptionsApi: Send + Sync {
    /// All caption tracks available for the video, in listed order
    async fn list(&self, id: &VideoId) -> Result<Vec<CaptionTrack>>;

    /// Fetch the best track for the first matching language
    async fn fetch(&self, id: &VideoId, languages: &[String]) -> Result<Vec<TranscriptSegment>>;
}

/// Pick a track for the first language in `languages` that has one,
/// preferring manually authored tracks over generated ones.
pub fn select_track<'a>(tracks: &'a [CaptionTrack], languages: &[String]) -> Option<&'a CaptionTrack> {
    languages.iter().find_map(|lang| {
        let matching = || tracks.iter().filter(move |t| &t.language_code == lang);
        matching()
            .find(|t| !t.generated)
            .or_else(|| matching().next())
    })
}

/// Captions client backed by YouTube's innertube player endpoint
pub struct InnertubeCaptions {
    client: Client,
    client_version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    playability_status: Option<PlayabilityStatus>,
    captions: Option<PlayerCaptions>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: String,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerCaptions {
    player_captions_tracklist_renderer: Option<Tracklist>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tracklist {
    #[serde(default)]
    caption_tracks: Vec<RawCaptionTrack>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCaptionTrack {
    base_url: String,
    language_code: String,
    kind: Option<String>,
}

impl InnertubeCaptions {
    pub fn new(config: &CaptionsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build captions HTTP client")?;

        Ok(Self {
            client,
            client_version: config.client_version.clone(),
        })
    }

    async fn player(&self, id: &VideoId) -> Result<PlayerResponse> {
        tracing::debug!(video_id = %id, "querying player endpoint for caption tracks");

        let body = json!({
            "context": {
                "client": {
                    "clientName": "ANDROID",
                    "clientVersion": self.client_version,
                }
            },
            "videoId": id.as_str(),
        });

        let response = self.client.post(PLAYER_ENDPOINT).json(&body).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("Player endpoint returned HTTP {}", response.status());
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl CaptionsApi for InnertubeCaptions {
    async fn list(&self, id: &VideoId) -> Result<Vec<CaptionTrack>> {
        let player = self.player(id).await?;

        if let Some(status) = player.playability_status.as_ref().filter(|s| s.status != "OK") {
            anyhow::bail!(
                "Video is not playable ({}): {}",
                status.status,
                status.reason.as_deref().unwrap_or("no reason given")
            );
        }

        let tracks = player
            .captions
            .and_then(|c| c.player_captions_tracklist_renderer)
            .map(|t| t.caption_tracks)
            .unwrap_or_default();

        Ok(tracks
            .into_iter()
            .map(|raw| CaptionTrack {
                generated: raw.kind.as_deref() == Some("asr"),
                language_code: raw.language_code,
                base_url: raw.base_url,
            })
            .collect())
    }

    async fn fetch(&self, id: &VideoId, languages: &[String]) -> Result<Vec<TranscriptSegment>> {
        let tracks = self.list(id).await?;
        let track = select_track(&tracks, languages)
            .ok_or_else(|| anyhow::anyhow!("No caption track for languages {:?}", languages))?;

        let url = json3_url(&track.base_url)?;
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let segments = parse_json3(&body).context("Failed to parse caption track")?;
        if segments.is_empty() {
            anyhow::bail!("Caption track for {} is empty", track.language_code);
        }
        Ok(segments)
    }
}

/// Rewrite a track URL to request the json3 format
fn json3_url(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url).context("Invalid caption track URL")?;
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "fmt")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair("fmt", "json3");
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(lang: &str, generated: bool) -> CaptionTrack {
        CaptionTrack {
            language_code: lang.to_string(),
            generated,
            base_url: format!("https://example.test/{lang}/{generated}"),
        }
    }

    #[test]
    fn test_select_prefers_manual() {
        let tracks = vec![track("en", true), track("de", false), track("en", false)];
        let picked = select_track(&tracks, &["en".to_string()]).unwrap();
        assert_eq!(picked, &tracks[2]);
    }

    #[test]
    fn test_select_falls_back_to_generated_and_later_languages() {
        let tracks = vec![track("fr", true), track("de", false)];
        assert_eq!(select_track(&tracks, &["fr".to_string()]), Some(&tracks[0]));
        assert_eq!(
            select_track(&tracks, &["en".to_string(), "de".to_string()]),
            Some(&tracks[1])
        );
        assert_eq!(select_track(&tracks, &["en".to_string()]), None);
    }

    #[test]
    fn test_json3_url_replaces_format() {
        let url = json3_url("https://www.youtube.com/api/timedtext?v=abc&fmt=srv3&lang=en").unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.youtube.com/api/timedtext?v=abc&lang=en&fmt=json3"
        );
    }

    #[test]
    fn test_player_response_shape() {
        let raw = r#"{
            "playabilityStatus": {"status": "OK"},
            "captions": {"playerCaptionsTracklistRenderer": {"captionTracks": [
                {"baseUrl": "https://x.test/a", "languageCode": "en", "kind": "asr", "name": {"runs": []}},
                {"baseUrl": "https://x.test/b", "languageCode": "es"}
            ]}}
        }"#;
        let player: PlayerResponse = serde_json::from_str(raw).unwrap();
        let tracks = player
            .captions
            .and_then(|c| c.player_captions_tracklist_renderer)
            .unwrap()
            .caption_tracks;
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].kind.as_deref(), Some("asr"));
        assert_eq!(tracks[1].language_code, "es");
    }
}
