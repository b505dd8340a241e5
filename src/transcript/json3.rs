//! YouTube's `json3` timed-text format, as served by the captions endpoint
//! and written by `yt-dlp --sub-format json3`.

use serde::Deserialize;

use super::TranscriptSegment;

#[derive(Debug, Deserialize)]
struct Json3Document {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Json3Event {
    #[serde(default)]
    t_start_ms: f64,
    #[serde(default)]
    d_duration_ms: f64,
    segs: Option<Vec<Json3Seg>>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// Parse a json3 document into transcript segments.
///
/// Events without `segs` are skipped. The text of one event is the
/// concatenation of its segments, trimmed; events with no text left are
/// dropped. Times are milliseconds in the source.
pub fn parse_json3(content: &str) -> Result<Vec<TranscriptSegment>, serde_json::Error> {
    let document: Json3Document = serde_json::from_str(content)?;

    let segments = document
        .events
        .into_iter()
        .filter_map(|event| {
            let segs = event.segs?;
            let text: String = segs.iter().map(|seg| seg.utf8.as_str()).collect();
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            Some(TranscriptSegment::new(
                event.t_start_ms / 1000.0,
                event.d_duration_ms / 1000.0,
                text,
            ))
        })
        .collect();

    Ok(segments)
}
