//! Core domain types for watchlog
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Video** | A catalog entry, unique by its external video id |
//! | **WatchEvent** | One moment a video was watched; repeat views are separate events |
//! | **Catalog** | The deduplicated set of videos, independent of watch counts |
//! | **Watch-scoped** | Restricted to videos with at least one event at/after the cutoff |
//! | **Cutoff** | Lower bound on event time that filters out pre-history noise |
//!
//! Videos are created once, the first time a watch event references them.
//! Later enrichment only touches metadata fields.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Video
// ============================================

/// A video in the catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    /// External catalog identifier (primary key)
    pub video_id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub audio_language: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub channel_id: Option<String>,
    /// Channel display name
    pub channel_title: Option<String>,
    pub category_id: Option<String>,
    /// Unordered tag set, may be empty
    #[serde(default)]
    pub tags: Vec<String>,
    /// Topic category URIs (e.g. `https://en.wikipedia.org/wiki/Music`)
    #[serde(default)]
    pub topic_categories: Vec<String>,
    #[serde(default, with = "string_counter")]
    pub view_count: Option<i64>,
    #[serde(default, with = "string_counter")]
    pub like_count: Option<i64>,
    #[serde(default, with = "string_counter")]
    pub comment_count: Option<i64>,
    /// ISO-8601 duration (`PT4M13S`)
    pub duration: Option<String>,
    pub was_livestream: bool,
    pub licensed_content: Option<bool>,
    pub has_paid_product_placement: Option<bool>,
    pub privacy_status: Option<String>,
    pub metadata_updated_at: Option<DateTime<Utc>>,
}

impl Video {
    /// Minimal video as first seen in a watch history entry.
    pub fn first_sighting(
        video_id: impl Into<String>,
        title: impl Into<String>,
        channel_id: Option<String>,
        channel_title: Option<String>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            title: title.into(),
            channel_id,
            channel_title,
            ..Default::default()
        }
    }
}

// ============================================
// Watch events
// ============================================

/// A single view of a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchEvent {
    pub id: i64,
    pub video_id: String,
    pub watched_at: DateTime<Utc>,
}

// ============================================
// Enrichment
// ============================================

/// Metadata record fetched from the video catalog API.
///
/// Field names follow the processed metadata dump (camelCase). Enrichment
/// overwrites every metadata column with the record's value; a missing title
/// keeps the title recorded at first sighting.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub category_id: Option<String>,
    pub audio_language: Option<String>,
    pub duration: Option<String>,
    pub licensed_content: Option<bool>,
    #[serde(default, with = "string_counter")]
    pub view_count: Option<i64>,
    #[serde(default, with = "string_counter")]
    pub like_count: Option<i64>,
    #[serde(default, with = "string_counter")]
    pub comment_count: Option<i64>,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub privacy_status: Option<String>,
    #[serde(default)]
    pub topic_categories: Vec<String>,
    #[serde(default)]
    pub was_livestream: bool,
    pub has_paid_product_placement: Option<bool>,
}

// ============================================
// Timestamp encoding
// ============================================

/// Encode a timestamp for storage.
///
/// Always UTC, second precision, `Z` suffix, so that text comparison in SQL
/// matches chronological order.
pub fn to_db_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Decode a stored timestamp.
pub fn from_db_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Serde adapter for engagement counters.
///
/// Counters can exceed the 2^53 safe-integer range of JSON consumers, so they
/// are written as strings. Reading accepts either strings or numbers.
pub mod string_counter {
    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;
    use std::fmt;

    pub fn serialize<S>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct CounterVisitor;

        impl<'de> Visitor<'de> for CounterVisitor {
            type Value = Option<i64>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an integer, a numeric string, or null")
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(None)
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(None)
            }

            fn visit_some<D2>(self, d: D2) -> Result<Self::Value, D2::Error>
            where
                D2: Deserializer<'de>,
            {
                d.deserialize_any(self)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(Some(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                i64::try_from(v).map(Some).map_err(E::custom)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                if v.is_empty() {
                    return Ok(None);
                }
                v.parse::<i64>().map(Some).map_err(E::custom)
            }
        }

        deserializer.deserialize_option(CounterVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_counters_serialize_as_strings() {
        let video = Video {
            video_id: "abc".to_string(),
            title: "A".to_string(),
            view_count: Some(9_007_199_254_740_993),
            ..Default::default()
        };
        let json = serde_json::to_value(&video).unwrap();
        assert_eq!(json["viewCount"], "9007199254740993");
        assert!(json["likeCount"].is_null());
        assert_eq!(json["videoId"], "abc");
    }

    #[test]
    fn test_metadata_accepts_numbers_and_strings() {
        let meta: VideoMetadata = serde_json::from_str(
            r#"{"videoId": "x", "viewCount": 12, "likeCount": "34", "commentCount": null}"#,
        )
        .unwrap();
        assert_eq!(meta.view_count, Some(12));
        assert_eq!(meta.like_count, Some(34));
        assert_eq!(meta.comment_count, None);
        assert!(meta.tags.is_empty());
    }

    #[test]
    fn test_db_timestamp_roundtrip_and_ordering() {
        let early = Utc.with_ymd_and_hms(2019, 12, 31, 23, 59, 59).unwrap();
        let late = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let (a, b) = (to_db_timestamp(&early), to_db_timestamp(&late));
        assert_eq!(a, "2019-12-31T23:59:59Z");
        assert!(a < b);
        assert_eq!(from_db_timestamp(&a), Some(early));
        assert_eq!(from_db_timestamp("not a date"), None);
    }
}
