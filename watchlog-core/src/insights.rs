//! Catalog insights
//!
//! - Word maps: how often each tag and topic occurs across the catalog.
//! - Content insights: patterns among the most viewed videos (length vs
//!   views, publishing hour, tag pairs that co-occur on popular videos).

use crate::db::repo::parse_json_list;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::from_db_timestamp;
use chrono::Timelike;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use url::Url;

/// Videos considered by [`content_insights`]
pub const TOP_VIDEOS: usize = 100;
/// Tag pairs returned by [`content_insights`]
pub const TOP_TAG_PAIRS: usize = 20;
/// Example videos kept per tag pair
pub const VIDEOS_PER_PAIR: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicCount {
    pub topic: String,
    pub count: i64,
}

/// Ordered by count DESC, then name ASC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct WordMaps {
    pub tags: Vec<TagCount>,
    pub topics: Vec<TopicCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DurationVsViews {
    pub duration: Option<String>,
    pub views: i64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishingTime {
    /// UTC hour, `None` if the publication time is unknown
    pub hour: Option<u32>,
    pub views: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoViews {
    pub title: String,
    pub views: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagPairPerformance {
    /// Sorted pair
    pub tags: [String; 2],
    /// Videos carrying both tags
    pub count: i64,
    pub avg_views: f64,
    pub total_views: i64,
    /// Most viewed first
    pub top_videos: Vec<VideoViews>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContentInsights {
    pub duration_vs_views: Vec<DurationVsViews>,
    pub publishing_times: Vec<PublishingTime>,
    pub tag_performance: Vec<TagPairPerformance>,
}

/// Async front for the server; each call uses its own reader.
#[derive(Clone)]
pub struct InsightsService {
    db: Arc<Database>,
}

impl InsightsService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn word_maps(&self) -> Result<WordMaps> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || word_maps(&db.reader()?))
            .await
            .map_err(Error::from)?
    }

    pub async fn content_insights(&self) -> Result<ContentInsights> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || content_insights(&db.reader()?))
            .await
            .map_err(Error::from)?
    }
}

/// Tag and topic frequencies over the whole catalog
pub fn word_maps(conn: &Connection) -> Result<WordMaps> {
    let mut tags: HashMap<String, i64> = HashMap::new();
    let mut topics: HashMap<String, i64> = HashMap::new();

    let mut stmt = conn.prepare(
        "SELECT tags, topic_categories FROM videos WHERE tags IS NOT NULL OR topic_categories IS NOT NULL",
    )?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let video_tags: Option<String> = row.get(0)?;
        let video_topics: Option<String> = row.get(1)?;

        for tag in parse_json_list(video_tags.as_deref()) {
            *tags.entry(tag).or_default() += 1;
        }
        for uri in parse_json_list(video_topics.as_deref()) {
            *topics.entry(topic_name(&uri)).or_default() += 1;
        }
    }

    Ok(WordMaps {
        tags: ranked(tags)
            .into_iter()
            .map(|(tag, count)| TagCount { tag, count })
            .collect(),
        topics: ranked(topics)
            .into_iter()
            .map(|(topic, count)| TopicCount { topic, count })
            .collect(),
    })
}

fn ranked(counts: HashMap<String, i64>) -> Vec<(String, i64)> {
    let mut list: Vec<_> = counts.into_iter().collect();
    list.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    list
}

/// Decoded last path segment of a topic URI (`.../wiki/Rock_%26_roll` ->
/// `Rock_&_roll`). Anything that is not a URL with a path is kept as is.
pub fn topic_name(uri: &str) -> String {
    let segment = Url::parse(uri)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|segments| segments.last())
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
        });
    match segment {
        Some(segment) => urlencoding::decode(&segment)
            .map(|decoded| decoded.into_owned())
            .unwrap_or(segment),
        None => uri.to_string(),
    }
}

struct RankedVideo {
    title: String,
    views: i64,
    duration: Option<String>,
    published_hour: Option<u32>,
    tags: Vec<String>,
}

/// Patterns among the [`TOP_VIDEOS`] most viewed videos
pub fn content_insights(conn: &Connection) -> Result<ContentInsights> {
    let mut stmt = conn.prepare(
        r#"
        SELECT title, view_count, duration, published_at, tags
        FROM videos
        ORDER BY view_count DESC NULLS LAST, video_id ASC
        LIMIT ?1
        "#,
    )?;

    let videos = stmt
        .query_map([TOP_VIDEOS as i64], |row| {
            let published_at: Option<String> = row.get(3)?;
            let tags: Option<String> = row.get(4)?;
            Ok(RankedVideo {
                title: row.get(0)?,
                views: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                duration: row.get(2)?,
                published_hour: published_at
                    .as_deref()
                    .and_then(from_db_timestamp)
                    .map(|ts| ts.hour()),
                tags: parse_json_list(tags.as_deref()),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(ContentInsights {
        duration_vs_views: videos
            .iter()
            .map(|v| DurationVsViews {
                duration: v.duration.clone(),
                views: v.views,
                title: v.title.clone(),
            })
            .collect(),
        publishing_times: videos
            .iter()
            .map(|v| PublishingTime {
                hour: v.published_hour,
                views: v.views,
            })
            .collect(),
        tag_performance: tag_pair_performance(&videos),
    })
}

#[derive(Default)]
struct PairAccumulator {
    count: i64,
    total_views: i64,
    videos: Vec<VideoViews>,
}

fn tag_pair_performance(videos: &[RankedVideo]) -> Vec<TagPairPerformance> {
    let mut pairs: HashMap<(String, String), PairAccumulator> = HashMap::new();

    for video in videos {
        let tags: Vec<&String> = video.tags.iter().collect::<BTreeSet<_>>().into_iter().collect();
        for (i, first) in tags.iter().enumerate() {
            for second in &tags[i + 1..] {
                let acc = pairs
                    .entry(((*first).clone(), (*second).clone()))
                    .or_default();
                acc.count += 1;
                acc.total_views = acc.total_views.saturating_add(video.views);
                acc.videos.push(VideoViews {
                    title: video.title.clone(),
                    views: video.views,
                });
            }
        }
    }

    let mut performance: Vec<TagPairPerformance> = pairs
        .into_iter()
        .filter(|(_, acc)| acc.count > 1)
        .map(|((a, b), mut acc)| {
            acc.videos.sort_by(|x, y| y.views.cmp(&x.views));
            acc.videos.truncate(VIDEOS_PER_PAIR);
            TagPairPerformance {
                tags: [a, b],
                count: acc.count,
                avg_views: acc.total_views as f64 / acc.count as f64,
                total_views: acc.total_views,
                top_videos: acc.videos,
            }
        })
        .collect();

    performance.sort_by(|a, b| {
        b.avg_views
            .total_cmp(&a.avg_views)
            .then_with(|| a.tags.cmp(&b.tags))
    });
    performance.truncate(TOP_TAG_PAIRS);
    performance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Video, VideoMetadata};
    use chrono::{TimeZone, Utc};

    fn db_with(videos: &[(&str, Option<i64>, &[&str], &[&str], Option<u32>)]) -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        for (id, views, tags, topics, hour) in videos {
            db.insert_video_if_absent(&Video::first_sighting(*id, format!("Title {}", id), None, None))
                .unwrap();
            db.update_metadata(
                &VideoMetadata {
                    video_id: id.to_string(),
                    view_count: *views,
                    tags: tags.iter().map(|t| t.to_string()).collect(),
                    topic_categories: topics.iter().map(|t| t.to_string()).collect(),
                    published_at: hour.map(|h| Utc.with_ymd_and_hms(2020, 1, 1, h, 30, 0).unwrap()),
                    duration: Some("PT5M".into()),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();
        }
        db
    }

    #[test]
    fn test_topic_name() {
        assert_eq!(topic_name("https://en.wikipedia.org/wiki/Music"), "Music");
        assert_eq!(topic_name("https://en.wikipedia.org/wiki/Rock_music?x=1"), "Rock_music");
        assert_eq!(topic_name("https://example.com/"), "https://example.com/");
        assert_eq!(topic_name("Gaming"), "Gaming");
    }

    #[test]
    fn test_topic_name_is_decoded() {
        assert_eq!(
            topic_name("https://en.wikipedia.org/wiki/Rock_music%28x%29"),
            "Rock_music(x)"
        );
        assert_eq!(
            topic_name("https://en.wikipedia.org/wiki/Caf%C3%A9"),
            "Café"
        );
    }

    #[test]
    fn test_word_maps_counts_and_orders() {
        let music = "https://en.wikipedia.org/wiki/Music";
        let film = "https://en.wikipedia.org/wiki/Film";
        let db = db_with(&[
            ("a", None, &["rust", "sqlite"], &[music], None),
            ("b", None, &["rust"], &[music, film], None),
            ("c", None, &[], &[], None),
        ]);

        let maps = word_maps(&db.reader().unwrap()).unwrap();
        assert_eq!(
            maps.tags,
            vec![
                TagCount { tag: "rust".into(), count: 2 },
                TagCount { tag: "sqlite".into(), count: 1 },
            ]
        );
        assert_eq!(maps.topics[0], TopicCount { topic: "Music".into(), count: 2 });
        assert_eq!(maps.topics[1].topic, "Film");
    }

    #[test]
    fn test_content_insights() {
        let db = db_with(&[
            ("a", Some(1_000), &["rust", "db", "cli"], &[], Some(9)),
            ("b", Some(3_000), &["db", "rust"], &[], Some(17)),
            ("c", Some(10), &["cli", "rust"], &[], None),
            ("d", None, &["db", "rust"], &[], Some(1)),
            ("e", Some(50), &["cli", "misc"], &[], Some(3)),
        ]);

        let insights = content_insights(&db.reader().unwrap()).unwrap();

        let titles: Vec<_> = insights.duration_vs_views.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Title b", "Title a", "Title e", "Title c", "Title d"]);
        assert_eq!(insights.publishing_times[0], PublishingTime { hour: Some(17), views: 3_000 });
        assert_eq!(insights.publishing_times[3].hour, None);

        // db+rust on a, b, d: (1000 + 3000 + 0) / 3
        let top = &insights.tag_performance[0];
        assert_eq!(top.tags, ["db".to_string(), "rust".to_string()]);
        assert_eq!(top.count, 3);
        assert_eq!(top.total_views, 4_000);
        assert!((top.avg_views - 4_000.0 / 3.0).abs() < 1e-9);
        assert_eq!(top.top_videos[0].title, "Title b");

        // cli+rust on a and c; cli+misc only once and dropped
        assert_eq!(insights.tag_performance.len(), 2);
        assert_eq!(insights.tag_performance[1].tags, ["cli".to_string(), "rust".to_string()]);
    }

    #[test]
    fn test_empty_catalog() {
        let db = db_with(&[]);
        let conn = db.reader().unwrap();
        assert_eq!(word_maps(&conn).unwrap(), WordMaps::default());
        assert_eq!(content_insights(&conn).unwrap(), ContentInsights::default());
    }
}
