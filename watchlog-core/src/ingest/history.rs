//! Watch history entry formats
//!
//! Two shapes are accepted:
//!
//! 1. **Parsed**: the flat records produced from the Takeout HTML export
//!    (`video_id`, `title`, `channel_url`, `channel_title`, `watched_at`).
//! 2. **Takeout**: the raw JSON export (`title`, `titleUrl`, `subtitles`,
//!    `time`).
//!
//! Entries that cannot be resolved to a video id and a watch time are
//! reported with a reason rather than failing the import.

use crate::types::Video;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use url::Url;

/// Prefix Takeout puts in front of every watched title
const WATCHED_PREFIX: &str = "Watched ";

/// One watch history entry as found in an export file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum HistoryEntry {
    /// Raw Takeout JSON. Tried first: `time` is required here and absent
    /// from the parsed form.
    Takeout(TakeoutEntry),
    Parsed(ParsedEntry),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParsedEntry {
    pub video_id: Option<String>,
    pub title: Option<String>,
    pub channel_url: Option<String>,
    pub channel_title: Option<String>,
    pub watched_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakeoutEntry {
    pub title: Option<String>,
    pub title_url: Option<String>,
    #[serde(default)]
    pub subtitles: Vec<Subtitle>,
    pub time: String,
}

/// Channel reference in a Takeout entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Subtitle {
    pub name: Option<String>,
    pub url: Option<String>,
}

impl HistoryEntry {
    /// Resolve into the video as first seen and the watch time.
    ///
    /// The error is a human-readable reason for skipping the entry.
    pub fn resolve(&self) -> Result<(Video, DateTime<Utc>), String> {
        match self {
            HistoryEntry::Parsed(entry) => {
                let video_id = entry
                    .video_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .ok_or("missing video id")?;
                let watched_at = parse_watch_time(entry.watched_at.as_deref().ok_or("missing watch time")?)?;
                let video = Video::first_sighting(
                    video_id,
                    title_or_id(entry.title.as_deref(), video_id),
                    entry.channel_url.as_deref().and_then(channel_id_from_url),
                    clean(entry.channel_title.as_deref()),
                );
                Ok((video, watched_at))
            }
            HistoryEntry::Takeout(entry) => {
                let url = entry.title_url.as_deref().ok_or("no video link (removed or private video)")?;
                let video_id = video_id_from_url(url).ok_or_else(|| format!("no video id in {}", url))?;
                let watched_at = parse_watch_time(&entry.time)?;

                let title = entry
                    .title
                    .as_deref()
                    .map(|t| t.strip_prefix(WATCHED_PREFIX).unwrap_or(t));
                let channel = entry.subtitles.first();
                let video = Video::first_sighting(
                    video_id.as_str(),
                    title_or_id(title, &video_id),
                    channel.and_then(|c| c.url.as_deref()).and_then(channel_id_from_url),
                    channel.and_then(|c| clean(c.name.as_deref())),
                );
                Ok((video, watched_at))
            }
        }
    }
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|v| !v.is_empty())
}

fn title_or_id(title: Option<&str>, video_id: &str) -> String {
    clean(title).unwrap_or_else(|| video_id.to_string())
}

/// Video id from a watch link.
///
/// Accepts `youtube.com/watch?v=<id>` (desktop, mobile and music hosts) and
/// `youtu.be/<id>`. Any other path on those hosts, such as a playlist, has
/// no single video.
pub fn video_id_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let id = match parsed.host_str()? {
        "www.youtube.com" | "youtube.com" | "m.youtube.com" | "music.youtube.com" => {
            if parsed.path() != "/watch" {
                return None;
            }
            parsed
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned())
        }
        "youtu.be" => parsed
            .path_segments()
            .and_then(|mut segments| segments.next())
            .map(str::to_string),
        _ => None,
    }?;
    (!id.is_empty()).then_some(id)
}

/// Channel id from a `/channel/<id>` link on a YouTube host
pub fn channel_id_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if !matches!(
        parsed.host_str()?,
        "www.youtube.com" | "youtube.com" | "m.youtube.com" | "music.youtube.com"
    ) {
        return None;
    }
    let mut segments = parsed.path_segments()?;
    match (segments.next(), segments.next()) {
        (Some("channel"), Some(id)) if !id.is_empty() => Some(id.to_string()),
        _ => None,
    }
}

/// Parse an export timestamp.
///
/// RFC 3339 with any offset is normalized to UTC; a timestamp without an
/// offset is taken as UTC.
pub fn parse_watch_time(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|_| format!("unparseable watch time '{}'", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entries(json: &str) -> Vec<HistoryEntry> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parsed_entry() {
        let list = entries(
            r#"[{
                "title": "  Intro   to Rust ",
                "url": "https://www.youtube.com/watch?v=abc123",
                "video_id": "abc123",
                "channel_title": "Rustacean",
                "channel_url": "https://www.youtube.com/channel/UC42",
                "watched_at": "2023-05-01T14:03:22-07:00",
                "platform": "youtube"
            }]"#,
        );
        assert!(matches!(list[0], HistoryEntry::Parsed(_)));

        let (video, at) = list[0].resolve().unwrap();
        assert_eq!(video.video_id, "abc123");
        assert_eq!(video.title, "Intro to Rust");
        assert_eq!(video.channel_id.as_deref(), Some("UC42"));
        assert_eq!(video.channel_title.as_deref(), Some("Rustacean"));
        assert_eq!(at, Utc.with_ymd_and_hms(2023, 5, 1, 21, 3, 22).unwrap());
    }

    #[test]
    fn test_takeout_entry() {
        let list = entries(
            r#"[{
                "header": "YouTube",
                "title": "Watched Intro to Rust",
                "titleUrl": "https://www.youtube.com/watch?v=abc123&t=10",
                "subtitles": [{"name": "Rustacean", "url": "https://www.youtube.com/channel/UC42"}],
                "time": "2023-05-01T21:03:22.512Z",
                "products": ["YouTube"]
            }]"#,
        );
        assert!(matches!(list[0], HistoryEntry::Takeout(_)));

        let (video, at) = list[0].resolve().unwrap();
        assert_eq!(video.video_id, "abc123");
        assert_eq!(video.title, "Intro to Rust");
        assert_eq!(video.channel_id.as_deref(), Some("UC42"));
        assert_eq!(at.timestamp(), Utc.with_ymd_and_hms(2023, 5, 1, 21, 3, 22).unwrap().timestamp());
    }

    #[test]
    fn test_unresolvable_entries() {
        let list = entries(
            r#"[
                {"video_id": null, "title": "Gone", "watched_at": "2023-05-01T00:00:00"},
                {"video_id": "x1", "title": "No time"},
                {"video_id": "x2", "watched_at": "yesterday"},
                {"title": "Watched a video that has been removed", "time": "2023-05-01T00:00:00Z"}
            ]"#,
        );
        for entry in &list {
            assert!(entry.resolve().is_err(), "{:?} should not resolve", entry);
        }
    }

    #[test]
    fn test_missing_title_falls_back_to_id() {
        let list = entries(r#"[{"video_id": "x1", "watched_at": "2023-05-01 08:00:00"}]"#);
        let (video, at) = list[0].resolve().unwrap();
        assert_eq!(video.title, "x1");
        assert!(video.channel_id.is_none());
        assert_eq!(at, Utc.with_ymd_and_hms(2023, 5, 1, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_url_helpers() {
        assert_eq!(video_id_from_url("https://youtube.com/watch?v=a_b-1"), Some("a_b-1".into()));
        assert_eq!(video_id_from_url("https://youtube.com/watch?list=L&v=zz#t"), Some("zz".into()));
        assert_eq!(video_id_from_url("https://m.youtube.com/watch?v=mob"), Some("mob".into()));
        assert_eq!(video_id_from_url("https://youtube.com/post/123"), None);
        assert_eq!(video_id_from_url("not a url"), None);
        assert_eq!(channel_id_from_url("https://youtube.com/channel/UC1/videos"), Some("UC1".into()));
        assert_eq!(channel_id_from_url("https://youtube.com/@handle"), None);
    }

    #[test]
    fn test_short_links() {
        assert_eq!(
            video_id_from_url("https://youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".into())
        );
        assert_eq!(
            video_id_from_url("https://youtu.be/dQw4w9WgXcQ?t=42"),
            Some("dQw4w9WgXcQ".into())
        );
        assert_eq!(video_id_from_url("https://youtu.be/"), None);

        let list = entries(
            r#"[{"title": "Watched Short link", "titleUrl": "https://youtu.be/short1",
                 "time": "2023-05-01T00:00:00Z"}]"#,
        );
        let (video, _) = list[0].resolve().unwrap();
        assert_eq!(video.video_id, "short1");
    }

    #[test]
    fn test_playlist_link_has_no_video() {
        assert_eq!(
            video_id_from_url("https://www.youtube.com/playlist?list=x&v=abc"),
            None
        );
    }

    #[test]
    fn test_channel_only_from_youtube_path() {
        assert_eq!(
            channel_id_from_url("https://example.com/redirect?to=/channel/UCx"),
            None
        );
        assert_eq!(
            channel_id_from_url("https://www.youtube.com/watch?v=a&next=/channel/UCx"),
            None
        );
        assert_eq!(channel_id_from_url("https://example.com/channel/UCx"), None);
    }
}
