//! Integration tests for the import, enrichment and query pipeline
//!
//! These tests run against a file database in a temporary directory so the
//! concurrent reader connections go through WAL just like in production.

use std::sync::Arc;
use tempfile::TempDir;
use watchlog_core::config::ReductionMode;
use watchlog_core::ingest::{self, HistoryEntry};
use watchlog_core::types::VideoMetadata;
use watchlog_core::{Database, Explorer, ExplorerParams, InsightsService, StatsService};

const HISTORY: &str = r#"[
    {"video_id": "rust1", "title": "Rust ownership", "channel_url": "https://www.youtube.com/channel/UC_RUST",
     "channel_title": "Rust Weekly", "watched_at": "2021-03-01T10:00:00+00:00"},
    {"video_id": "rust1", "title": "Rust ownership", "channel_url": "https://www.youtube.com/channel/UC_RUST",
     "channel_title": "Rust Weekly", "watched_at": "2022-07-04T18:30:00+00:00"},
    {"video_id": "rust2", "title": "Async Rust", "channel_url": "https://www.youtube.com/channel/UC_RUST",
     "channel_title": "Rust Weekly", "watched_at": "2022-08-01T09:00:00+00:00"},
    {"title": "Watched Live coding marathon", "titleUrl": "https://www.youtube.com/watch?v=live1",
     "subtitles": [{"name": "Stream Team", "url": "https://www.youtube.com/channel/UC_LIVE"}],
     "time": "2022-12-31T23:59:59Z"},
    {"title": "Watched Old favourite", "titleUrl": "https://www.youtube.com/watch?v=old1",
     "subtitles": [{"name": "Retro", "url": "https://www.youtube.com/channel/UC_OLD"}],
     "time": "2015-06-01T12:00:00Z"},
    {"title": "Watched a video that has been removed", "time": "2022-01-01T00:00:00Z"}
]"#;

const METADATA: &str = r#"[
    {"videoId": "rust1", "duration": "PT21M", "categoryId": "27", "viewCount": "150000",
     "tags": ["rust", "ownership"], "privacyStatus": "public", "licensedContent": true,
     "publishedAt": "2021-01-10T15:00:00Z"},
    {"videoId": "rust2", "duration": "PT25M", "categoryId": "28", "viewCount": "90000",
     "tags": ["rust", "async"], "privacyStatus": "public", "licensedContent": false,
     "topicCategories": ["https://en.wikipedia.org/wiki/Technology"]},
    {"videoId": "live1", "duration": "PT2H", "categoryId": "20", "wasLivestream": true,
     "hasPaidProductPlacement": true},
    {"videoId": "never-watched", "duration": "PT1M"}
]"#;

fn setup() -> (TempDir, Arc<Database>) {
    watchlog_core::logging::init_test();
    let dir = TempDir::new().unwrap();
    let db = Database::open(&dir.path().join("watchlog.db")).unwrap();
    db.migrate().unwrap();

    let entries: Vec<HistoryEntry> = serde_json::from_str(HISTORY).unwrap();
    let report = ingest::import_history(&db, &entries).unwrap();
    assert_eq!(report.videos_created, 4);
    assert_eq!(report.events_recorded, 5);
    assert_eq!(report.skipped.len(), 1);

    let records: Vec<VideoMetadata> = serde_json::from_str(METADATA).unwrap();
    let enriched = ingest::enrich_metadata(&db, &records).unwrap();
    assert_eq!(enriched.updated, 3);
    assert_eq!(enriched.skipped, 1);

    (dir, Arc::new(db))
}

fn cutoff() -> chrono::DateTime<chrono::Utc> {
    watchlog_core::config::StatsConfig::default().cutoff().unwrap()
}

// ============================================
// Stats
// ============================================

#[tokio::test]
async fn test_stats_after_import() {
    let (_dir, db) = setup();
    let stats = StatsService::new(db, ReductionMode::Auto)
        .compute(cutoff())
        .await
        .unwrap();

    // old1 was only watched before the cutoff
    assert_eq!(stats.basic_stats.total_videos, 3);
    assert_eq!(stats.basic_stats.unique_channels, 2);

    let rust = &stats.channel_stats.top_by_watches[0];
    assert_eq!(rust.channel_id, "UC_RUST");
    assert_eq!(rust.count, 3);

    // rust1 twice (2 x 21m) + rust2 once (25m)
    let by_duration = &stats.channel_stats.top_by_duration;
    let rust_duration = by_duration.iter().find(|c| c.channel_id == "UC_RUST").unwrap();
    assert_eq!(rust_duration.duration, "PT1H7M");
    assert_eq!(by_duration[0].channel_id, "UC_LIVE");
    assert_eq!(stats.channel_stats.top_livestreams[0].channel_title, "Stream Team");

    let years: Vec<_> = stats
        .time_stats
        .watches_by_year
        .iter()
        .map(|y| (y.year, y.count))
        .collect();
    assert_eq!(years, vec![(2021, 1), (2022, 3)]);

    let distribution: i64 = stats
        .category_stats
        .category_distribution
        .iter()
        .map(|c| c.count)
        .sum();
    assert_eq!(distribution, 3);
    // only rust1 is long-form in a podcast-like category
    assert_eq!(stats.category_stats.podcast_stats.len(), 1);
    assert_eq!(stats.category_stats.podcast_stats[0].category_id, "27");

    assert_eq!(stats.attribute_stats.streaming.livestream, 1);
    assert_eq!(stats.attribute_stats.product_placement.has, 1);
}

#[tokio::test]
async fn test_reduction_modes_agree_on_file_database() {
    let (_dir, db) = setup();
    let sql = StatsService::new(Arc::clone(&db), ReductionMode::Sql)
        .compute(cutoff())
        .await
        .unwrap();
    let rows = StatsService::new(db, ReductionMode::Rows)
        .compute(cutoff())
        .await
        .unwrap();
    assert_eq!(sql, rows);
}

// ============================================
// Explorer
// ============================================

#[tokio::test]
async fn test_explorer_after_import() {
    let (_dir, db) = setup();
    let explorer = Explorer::new(db).unwrap();

    let page = explorer.query(&ExplorerParams::default()).await.unwrap();
    assert_eq!(page.meta.total, 4);
    assert_eq!(page.data[0].video.video_id, "rust1");
    assert_eq!(page.data[0].watch_count, 2);
    assert!(page.data[0].watches[0].watched_at > page.data[0].watches[1].watched_at);

    let params = ExplorerParams {
        search: Some("weekly".into()),
        sort_by: Some(r#"[{"id":"duration","desc":true}]"#.into()),
        ..Default::default()
    };
    let page = explorer.query(&params).await.unwrap();
    let ids: Vec<_> = page.data.iter().map(|r| r.video.video_id.as_str()).collect();
    assert_eq!(ids, vec!["rust2", "rust1"]);

    let json = serde_json::to_value(&page).unwrap();
    assert_eq!(json["data"][0]["viewCount"], "90000");
    assert_eq!(json["meta"]["pageCount"], 1);
}

// ============================================
// Insights
// ============================================

#[tokio::test]
async fn test_insights_after_import() {
    let (_dir, db) = setup();
    let insights = InsightsService::new(db);

    let maps = insights.word_maps().await.unwrap();
    assert_eq!(maps.tags[0].tag, "rust");
    assert_eq!(maps.tags[0].count, 2);
    assert_eq!(maps.topics[0].topic, "Technology");

    let content = insights.content_insights().await.unwrap();
    assert_eq!(content.duration_vs_views[0].title, "Rust ownership");
    assert_eq!(content.publishing_times[0].hour, Some(15));
    // no tag pair appears on more than one video
    assert!(content.tag_performance.is_empty());
}
