//! Searchable, sortable, paginated browser over the video catalog
//!
//! A request goes through three steps:
//! 1. [`ExplorerQuery::parse`] validates page, page size, search and sort.
//! 2. The sort field is resolved through the [`SortTable`], so only vetted
//!    SQL expressions reach the query text.
//! 3. [`Explorer::run`] counts matches and fetches the page concurrently on
//!    two read connections.
//!
//! The explorer covers the whole catalog; it is not scoped by the stats
//! cutoff.

pub mod params;
pub mod sort;

pub use params::{page_count, ExplorerParams, ExplorerQuery, SortSpec, DEFAULT_PAGE_SIZE, PAGE_SIZES};
pub use sort::{Direction, SortColumn, SortTable, SORT_COLUMNS};

use crate::db::{placeholders, Database};
use crate::error::{Error, Result};
use crate::types::{from_db_timestamp, Video};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ToSql};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// JSON keys of an [`ExplorerRow`]; sortable ids must be among them
pub const EXPOSED_FIELDS: &[&str] = &[
    "videoId",
    "title",
    "description",
    "thumbnailUrl",
    "audioLanguage",
    "publishedAt",
    "channelId",
    "channelTitle",
    "categoryId",
    "tags",
    "topicCategories",
    "viewCount",
    "likeCount",
    "commentCount",
    "duration",
    "wasLivestream",
    "licensedContent",
    "hasPaidProductPlacement",
    "privacyStatus",
    "metadataUpdatedAt",
    "watchCount",
    "lastWatchedAt",
    "watches",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchTime {
    pub watched_at: DateTime<Utc>,
}

/// A video with its watch history
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerRow {
    #[serde(flatten)]
    pub video: Video,
    pub watch_count: i64,
    pub last_watched_at: Option<DateTime<Utc>>,
    /// Newest first
    pub watches: Vec<WatchTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub page_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplorerPage {
    pub data: Vec<ExplorerRow>,
    pub meta: PageMeta,
}

/// Explorer over a database, with a validated sort table
#[derive(Clone)]
pub struct Explorer {
    db: Arc<Database>,
    table: Arc<SortTable>,
}

impl Explorer {
    /// Fails if the sort table is inconsistent with the exposed row fields.
    pub fn new(db: Arc<Database>) -> Result<Self> {
        let table = SortTable::new(SORT_COLUMNS, EXPOSED_FIELDS)?;
        Ok(Self {
            db,
            table: Arc::new(table),
        })
    }

    /// Validate raw parameters
    pub fn parse(&self, params: &ExplorerParams) -> Result<ExplorerQuery> {
        ExplorerQuery::parse(params, &self.table)
    }

    /// Parse and run in one step
    pub async fn query(&self, params: &ExplorerParams) -> Result<ExplorerPage> {
        let query = self.parse(params)?;
        self.run(query).await
    }

    /// Count and fetch concurrently; either failure fails the request.
    pub async fn run(&self, query: ExplorerQuery) -> Result<ExplorerPage> {
        let started = Instant::now();

        let count_task = {
            let db = Arc::clone(&self.db);
            let search = query.search.clone();
            tokio::task::spawn_blocking(move || {
                let conn = db.reader()?;
                count_matches(&conn, search.as_deref())
            })
        };
        let fetch_task = {
            let db = Arc::clone(&self.db);
            let query = query.clone();
            tokio::task::spawn_blocking(move || {
                let conn = db.reader()?;
                fetch_page(&conn, &query)
            })
        };

        let (total, data) = tokio::try_join!(joined(count_task), joined(fetch_task))?;

        // Page 0 of an empty result is the only page past the last one allowed
        let page_count = page_count(total, query.page_size);
        if i64::from(query.page) >= page_count.max(1) {
            return Err(Error::InvalidQuery(format!(
                "page {} is out of range ({} page(s) of {})",
                query.page, page_count, query.page_size
            )));
        }

        tracing::debug!(
            page = query.page,
            page_size = query.page_size,
            sort = query.sort.id,
            searched = query.search.is_some(),
            total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Explorer query complete"
        );

        Ok(ExplorerPage {
            data,
            meta: PageMeta {
                total,
                page: query.page,
                page_size: query.page_size,
                page_count,
            },
        })
    }
}

async fn joined<T>(handle: tokio::task::JoinHandle<Result<T>>) -> Result<T> {
    handle.await.map_err(Error::from)?
}

/// Case-insensitive substring match over title and channel name
const SEARCH_PREDICATE: &str = "(instr(fold_case(v.title), fold_case(:search)) > 0 \
     OR instr(fold_case(v.channel_title), fold_case(:search)) > 0)";

fn where_clause(search: Option<&str>) -> String {
    match search {
        Some(_) => format!("WHERE {}", SEARCH_PREDICATE),
        None => String::new(),
    }
}

fn count_matches(conn: &Connection, search: Option<&str>) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM videos v {}", where_clause(search));

    let mut named: Vec<(&str, &dyn ToSql)> = Vec::new();
    if let Some(search) = &search {
        named.push((":search", search as &dyn ToSql));
    }

    let total = conn.query_row(&sql, named.as_slice(), |r| r.get(0))?;
    Ok(total)
}

fn fetch_page(conn: &Connection, query: &ExplorerQuery) -> Result<Vec<ExplorerRow>> {
    let sql = format!(
        r#"
        SELECT v.*,
               COALESCE(w.watch_count, 0) AS watch_count,
               w.last_watched_at AS last_watched_at
        FROM videos v
        LEFT JOIN (
            SELECT video_id, COUNT(*) AS watch_count, MAX(watched_at) AS last_watched_at
            FROM watch_events
            GROUP BY video_id
        ) w ON w.video_id = v.video_id
        {where_clause}
        ORDER BY {order}
        LIMIT :limit OFFSET :offset
        "#,
        where_clause = where_clause(query.search.as_deref()),
        order = sort::order_by(&query.sort, query.direction),
    );

    let limit = i64::from(query.page_size);
    let offset = query.offset();
    let mut named: Vec<(&str, &dyn ToSql)> = vec![
        (":limit", &limit as &dyn ToSql),
        (":offset", &offset as &dyn ToSql),
    ];
    if let Some(search) = &query.search {
        named.push((":search", search as &dyn ToSql));
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt
        .query_map(named.as_slice(), |row| {
            let last_watched_at: Option<String> = row.get("last_watched_at")?;
            Ok(ExplorerRow {
                video: Database::row_to_video(row)?,
                watch_count: row.get("watch_count")?,
                last_watched_at: last_watched_at.as_deref().and_then(from_db_timestamp),
                watches: Vec::new(),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    attach_watches(conn, &mut rows)?;
    Ok(rows)
}

fn attach_watches(conn: &Connection, rows: &mut [ExplorerRow]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let ids: Vec<String> = rows.iter().map(|r| r.video.video_id.clone()).collect();
    let sql = format!(
        "SELECT video_id, watched_at FROM watch_events WHERE video_id IN ({}) ORDER BY watched_at DESC, id DESC",
        placeholders(1, ids.len())
    );

    let mut by_video: HashMap<String, Vec<WatchTime>> = HashMap::new();
    let mut stmt = conn.prepare(&sql)?;
    let mut result = stmt.query(rusqlite::params_from_iter(ids.iter()))?;
    while let Some(row) = result.next()? {
        let video_id: String = row.get(0)?;
        let watched_at: String = row.get(1)?;
        if let Some(watched_at) = from_db_timestamp(&watched_at) {
            by_video
                .entry(video_id)
                .or_default()
                .push(WatchTime { watched_at });
        }
    }

    for row in rows.iter_mut() {
        row.watches = by_video.remove(&row.video.video_id).unwrap_or_default();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Video;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 8, 0, 0).unwrap()
    }

    fn catalog() -> Arc<Database> {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();

        let videos = [
            ("v1", "Learning Rust", Some("Ferris Talks"), Some(500), Some("PT10M")),
            ("v2", "Cooking Pasta", Some("Kitchen"), Some(900), Some("PT1H")),
            ("v3", "rust belt history", None, None, None),
            ("v4", "Zebra facts", Some("RUSTic Nature"), Some(500), Some("PT30S")),
            ("v5", "Alpha", Some("Kitchen"), None, Some("PT2M")),
        ];
        for (id, title, channel, views, duration) in videos {
            db.insert_video_if_absent(&Video {
                view_count: views,
                duration: duration.map(String::from),
                ..Video::first_sighting(id, title, None, channel.map(String::from))
            })
            .unwrap();
        }

        for (id, day) in [("v1", 1), ("v1", 2), ("v1", 3), ("v2", 1), ("v4", 5), ("v4", 6)] {
            db.insert_watch_event(id, at(2021, 3, day)).unwrap();
        }
        Arc::new(db)
    }

    fn params(size: Option<&str>, page: Option<&str>, search: Option<&str>, sort: Option<&str>) -> ExplorerParams {
        ExplorerParams {
            page: page.map(String::from),
            page_size: size.map(String::from),
            search: search.map(String::from),
            sort_by: sort.map(String::from),
        }
    }

    fn ids(page: &ExplorerPage) -> Vec<&str> {
        page.data.iter().map(|r| r.video.video_id.as_str()).collect()
    }

    #[test]
    fn test_exposed_fields_match_row_serialization() {
        let row = ExplorerRow {
            video: Video::default(),
            watch_count: 0,
            last_watched_at: None,
            watches: vec![],
        };
        let json = serde_json::to_value(&row).unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        let mut exposed = EXPOSED_FIELDS.to_vec();
        keys.sort_unstable();
        exposed.sort_unstable();
        assert_eq!(keys, exposed);
    }

    #[tokio::test]
    async fn test_default_order_is_watch_count_desc() {
        let explorer = Explorer::new(catalog()).unwrap();
        let page = explorer.query(&ExplorerParams::default()).await.unwrap();

        assert_eq!(ids(&page), vec!["v1", "v4", "v2", "v3", "v5"]);
        assert_eq!(page.data[0].watch_count, 3);
        assert_eq!(page.data[0].watches.len(), 3);
        assert_eq!(page.data[0].watches[0].watched_at, at(2021, 3, 3));
        assert_eq!(page.data[0].last_watched_at, Some(at(2021, 3, 3)));
        assert!(page.data[3].watches.is_empty());
        assert_eq!(
            page.meta,
            PageMeta {
                total: 5,
                page: 0,
                page_size: 25,
                page_count: 1
            }
        );
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_over_title_and_channel() {
        let explorer = Explorer::new(catalog()).unwrap();
        let page = explorer
            .query(&params(None, None, Some("RUST"), Some(r#"[{"id":"title","desc":false}]"#)))
            .await
            .unwrap();

        assert_eq!(ids(&page), vec!["v1", "v4", "v3"]);
        assert_eq!(page.meta.total, 3);
    }

    #[tokio::test]
    async fn test_empty_search_equals_no_search() {
        let explorer = Explorer::new(catalog()).unwrap();
        let none = explorer.query(&ExplorerParams::default()).await.unwrap();
        let empty = explorer
            .query(&params(None, None, Some(""), None))
            .await
            .unwrap();
        assert_eq!(none, empty);
    }

    #[tokio::test]
    async fn test_nulls_last_in_both_directions() {
        let explorer = Explorer::new(catalog()).unwrap();

        let desc = explorer
            .query(&params(None, None, None, Some(r#"[{"id":"viewCount","desc":true}]"#)))
            .await
            .unwrap();
        // v1/v4 tie at 500 and fall back to title
        assert_eq!(ids(&desc), vec!["v2", "v1", "v4", "v5", "v3"]);

        let asc = explorer
            .query(&params(None, None, None, Some(r#"[{"id":"viewCount","desc":false}]"#)))
            .await
            .unwrap();
        assert_eq!(ids(&asc), vec!["v1", "v4", "v2", "v5", "v3"]);

        let by_channel = explorer
            .query(&params(None, None, None, Some(r#"[{"id":"channelTitle","desc":true}]"#)))
            .await
            .unwrap();
        assert_eq!(by_channel.data.last().unwrap().video.video_id, "v3");
    }

    #[tokio::test]
    async fn test_duration_sorts_by_length_not_text() {
        let explorer = Explorer::new(catalog()).unwrap();
        let page = explorer
            .query(&params(None, None, None, Some(r#"[{"id":"duration","desc":false}]"#)))
            .await
            .unwrap();
        assert_eq!(ids(&page), vec!["v4", "v5", "v1", "v2", "v3"]);
    }

    #[tokio::test]
    async fn test_malformed_duration_sorts_with_missing() {
        let db = catalog();
        db.insert_video_if_absent(&Video {
            duration: Some("about an hour".into()),
            ..Video::first_sighting("v6", "Aardvark", None, None)
        })
        .unwrap();
        let explorer = Explorer::new(db).unwrap();

        for desc in [false, true] {
            let sort = format!(r#"[{{"id":"duration","desc":{}}}]"#, desc);
            let page = explorer
                .query(&params(None, None, None, Some(&sort)))
                .await
                .unwrap();
            // missing and malformed tie; final order is by id
            let tail: Vec<_> = ids(&page)[4..].to_vec();
            assert_eq!(tail, vec!["v3", "v6"], "desc={}", desc);
        }
    }

    #[tokio::test]
    async fn test_pagination() {
        let explorer = Explorer::new(catalog()).unwrap();
        let sort = Some(r#"[{"id":"title","desc":false}]"#);

        let first = explorer.query(&params(Some("10"), Some("0"), None, sort)).await.unwrap();
        assert_eq!(first.meta.page_count, 1);
        assert_eq!(first.data.len(), 5);

        let beyond = explorer.query(&params(Some("10"), Some("1"), None, sort)).await;
        assert!(beyond.unwrap_err().is_client_error());
    }

    #[tokio::test]
    async fn test_page_past_the_end_rejected() {
        let explorer = Explorer::new(catalog()).unwrap();

        for page in ["7", "4000000000"] {
            let err = explorer
                .query(&params(Some("10"), Some(page), None, None))
                .await
                .unwrap_err();
            assert!(err.is_client_error(), "page {}", page);
            assert!(err.to_string().contains("out of range"));
        }
    }

    #[tokio::test]
    async fn test_empty_catalog() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let explorer = Explorer::new(Arc::new(db)).unwrap();

        let page = explorer.query(&ExplorerParams::default()).await.unwrap();
        assert!(page.data.is_empty());
        assert_eq!(page.meta.total, 0);
        assert_eq!(page.meta.page_count, 0);

        let err = explorer
            .query(&params(None, Some("1"), None, None))
            .await
            .unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_counters_serialized_as_strings() {
        let explorer = Explorer::new(catalog()).unwrap();
        let page = explorer
            .query(&params(None, None, Some("pasta"), None))
            .await
            .unwrap();
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["data"][0]["viewCount"], "900");
        assert_eq!(json["data"][0]["watchCount"], 1);
        assert_eq!(json["meta"]["pageSize"], 25);
    }

    #[tokio::test]
    async fn test_invalid_sort_rejected() {
        let explorer = Explorer::new(catalog()).unwrap();
        let err = explorer
            .query(&params(None, None, None, Some(r#"[{"id":"password","desc":true}]"#)))
            .await
            .unwrap_err();
        assert!(err.is_client_error());
    }
}
