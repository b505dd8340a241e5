use serde::Serialize;
use std::fmt;
use url::Url;

use crate::AnalyzerError;

const ID_LEN: usize = 11;

const SHORT_HOSTS: &[&str] = &["youtu.be", "www.youtu.be"];
const LONG_HOSTS: &[&str] = &["youtube.com", "www.youtube.com", "m.youtube.com"];
const PATH_PREFIXES: &[&str] = &["/embed/", "/v/", "/shorts/"];

/// Canonical 11-character YouTube video identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Accept `candidate` only if it is exactly a video identifier
    pub fn parse(candidate: &str) -> Option<Self> {
        is_video_id(candidate).then(|| Self(candidate.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch URL handed to external tools
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn is_video_id(s: &str) -> bool {
    s.len() == ID_LEN
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Resolve a raw identifier or a YouTube URL into a [`VideoId`].
///
/// Accepted shapes are a bare id, `youtu.be/<id>`, `youtube.com/watch?v=<id>`
/// and `youtube.com/{embed,v,shorts}/<id>` (with `www.` and `m.` variants).
/// Resolution is pure parsing and never touches the network.
pub fn resolve(input: &str) -> Result<VideoId, AnalyzerError> {
    if let Some(id) = VideoId::parse(input) {
        return Ok(id);
    }

    Url::parse(input)
        .ok()
        .and_then(|url| candidate_from_url(&url))
        .and_then(|candidate| VideoId::parse(&candidate))
        .ok_or_else(|| AnalyzerError::Resolution(input.to_string()))
}

fn candidate_from_url(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let path = url.path();

    if SHORT_HOSTS.contains(&host) {
        return path
            .trim_start_matches('/')
            .split('/')
            .next()
            .map(str::to_string);
    }

    if !LONG_HOSTS.contains(&host) {
        return None;
    }

    if path == "/watch" {
        if let Some((_, v)) = url
            .query_pairs()
            .find(|(key, value)| key == "v" && !value.is_empty())
        {
            if is_video_id(&v) {
                return Some(v.into_owned());
            }
        }
    }

    PATH_PREFIXES.iter().find_map(|prefix| {
        path.strip_prefix(prefix)
            .and_then(|rest| rest.split('/').next())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RICK: &str = "dQw4w9WgXcQ";

    #[test]
    fn test_bare_ids_pass_through() {
        for id in [RICK, "abc-DEF_123", "___________", "-----------"] {
            assert_eq!(resolve(id).unwrap().as_str(), id);
        }
    }

    #[test]
    fn test_url_shapes() {
        let urls = [
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?t=42",
            "https://www.youtu.be/dQw4w9WgXcQ/extra",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://m.youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://youtube.com/watch?v=dQw4w9WgXcQ&v=aaaaaaaaaaa",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ?feature=oembed",
            "https://www.youtube.com/v/dQw4w9WgXcQ/more",
        ];
        for url in urls {
            assert_eq!(resolve(url).unwrap().as_str(), RICK, "{url}");
        }
    }

    #[test]
    fn test_rejections() {
        let inputs = [
            "not a url",
            "https://example.com/watch?v=x",
            "https://example.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=short",
            "https://www.youtube.com/watch",
            "https://www.youtube.com/playlist?list=PL123",
            "https://youtu.be/",
            "https://www.youtube.com/shorts/dQw4w9WgXcQextra",
            "youtube.com/watch?v=dQw4w9WgXcQ",
            "dQw4w9WgXc",
            "dQw4w9WgXcQ!",
        ];
        for input in inputs {
            let err = resolve(input).unwrap_err();
            assert!(matches!(err, AnalyzerError::Resolution(_)), "{input}");
        }
    }

    #[test]
    fn test_watch_url() {
        let id = resolve(RICK).unwrap();
        assert_eq!(id.watch_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(id.to_string(), RICK);
    }
}
