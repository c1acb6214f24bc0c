//! Database repository layer
//!
//! One write connection guarded by a mutex serves ingest. Aggregations and
//! explorer queries open short-lived read connections through
//! [`Database::reader`] so they can run concurrently.

use super::functions;
use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Where the database lives, needed to open additional readers
#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    /// Shared-cache URI of a named in-memory database
    Memory(String),
}

/// Outcome of writing one batch of watch history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCounts {
    /// Videos inserted for the first time
    pub videos_created: usize,
    /// Watch events recorded
    pub events_recorded: usize,
}

/// Outcome of applying metadata records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichCounts {
    pub updated: usize,
    /// Records naming a video that is not in the catalog
    pub skipped: usize,
}

/// Database handle: one write connection plus on-demand readers
pub struct Database {
    conn: Mutex<Connection>,
    location: Location,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            ",
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;
        functions::register(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            location: Location::File(path.to_path_buf()),
        })
    }

    /// Open a private in-memory database (for testing)
    ///
    /// The database is named and shared-cache so [`Database::reader`] sees the
    /// same data. It lives as long as this handle.
    pub fn open_in_memory() -> Result<Self> {
        let uri = format!(
            "file:watchlog-{}?mode=memory&cache=shared",
            uuid::Uuid::new_v4()
        );
        let conn = Connection::open_with_flags(
            &uri,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        functions::register(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            location: Location::Memory(uri),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.lock();
        super::schema::run_migrations(&conn)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a new query-only connection to the same database.
    ///
    /// Each reader has the watchlog SQL functions registered and may be moved
    /// to another thread.
    pub fn reader(&self) -> Result<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = match &self.location {
            Location::File(path) => Connection::open_with_flags(path, flags)?,
            Location::Memory(uri) => Connection::open_with_flags(uri, flags)?,
        };
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA query_only = ON")?;
        functions::register(&conn)?;
        Ok(conn)
    }

    // ============================================
    // Video operations
    // ============================================

    /// Insert a video unless one with the same id already exists.
    ///
    /// Returns `true` if the row was created. Existing rows are never touched.
    pub fn insert_video_if_absent(&self, video: &Video) -> Result<bool> {
        let conn = self.lock();
        Self::insert_video_with(&conn, video, Utc::now())
    }

    fn insert_video_with(conn: &Connection, video: &Video, now: DateTime<Utc>) -> Result<bool> {
        let changed = conn.execute(
            r#"
            INSERT INTO videos (video_id, title, description, thumbnail_url, audio_language,
                                published_at, channel_id, channel_title, category_id, tags,
                                topic_categories, view_count, like_count, comment_count, duration,
                                was_livestream, licensed_content, has_paid_product_placement,
                                privacy_status, metadata_updated_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)
            ON CONFLICT(video_id) DO NOTHING
            "#,
            params![
                video.video_id,
                video.title,
                video.description,
                video.thumbnail_url,
                video.audio_language,
                video.published_at.as_ref().map(to_db_timestamp),
                video.channel_id,
                video.channel_title,
                video.category_id,
                optional_json_list(&video.tags)?,
                optional_json_list(&video.topic_categories)?,
                video.view_count,
                video.like_count,
                video.comment_count,
                video.duration,
                video.was_livestream,
                video.licensed_content,
                video.has_paid_product_placement,
                video.privacy_status,
                video.metadata_updated_at.as_ref().map(to_db_timestamp),
                to_db_timestamp(&now),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Get a video by ID
    pub fn get_video(&self, video_id: &str) -> Result<Option<Video>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT * FROM videos WHERE video_id = ?",
            [video_id],
            Self::row_to_video,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Number of videos in the catalog
    pub fn count_videos(&self) -> Result<i64> {
        let conn = self.lock();
        let count = conn.query_row("SELECT COUNT(*) FROM videos", [], |r| r.get(0))?;
        Ok(count)
    }

    /// Overwrite the metadata columns of an existing video.
    ///
    /// Returns `false` if the video is unknown.
    pub fn update_metadata(&self, meta: &VideoMetadata, at: DateTime<Utc>) -> Result<bool> {
        let conn = self.lock();
        Self::update_metadata_with(&conn, meta, at)
    }

    /// Apply many metadata records in one transaction
    pub fn update_metadata_batch(
        &self,
        records: &[VideoMetadata],
        at: DateTime<Utc>,
    ) -> Result<EnrichCounts> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let mut counts = EnrichCounts::default();
        for meta in records {
            if Self::update_metadata_with(&tx, meta, at)? {
                counts.updated += 1;
            } else {
                counts.skipped += 1;
            }
        }

        tx.commit()?;
        Ok(counts)
    }

    fn update_metadata_with(
        conn: &Connection,
        meta: &VideoMetadata,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let changed = conn.execute(
            r#"
            UPDATE videos SET
                title = COALESCE(?2, title),
                description = ?3,
                thumbnail_url = ?4,
                tags = ?5,
                category_id = ?6,
                audio_language = ?7,
                duration = ?8,
                licensed_content = ?9,
                view_count = ?10,
                like_count = ?11,
                comment_count = ?12,
                channel_id = COALESCE(?13, channel_id),
                channel_title = COALESCE(?14, channel_title),
                published_at = ?15,
                privacy_status = ?16,
                topic_categories = ?17,
                was_livestream = ?18,
                has_paid_product_placement = ?19,
                metadata_updated_at = ?20
            WHERE video_id = ?1
            "#,
            params![
                meta.video_id,
                meta.title,
                meta.description,
                meta.thumbnail_url,
                json_list(&meta.tags)?,
                meta.category_id,
                meta.audio_language,
                meta.duration,
                meta.licensed_content,
                meta.view_count,
                meta.like_count,
                meta.comment_count,
                meta.channel_id,
                meta.channel_title,
                meta.published_at.as_ref().map(to_db_timestamp),
                meta.privacy_status,
                json_list(&meta.topic_categories)?,
                meta.was_livestream,
                meta.has_paid_product_placement,
                to_db_timestamp(&at),
            ],
        )?;
        Ok(changed > 0)
    }

    pub(crate) fn row_to_video(row: &Row) -> rusqlite::Result<Video> {
        let published_at: Option<String> = row.get("published_at")?;
        let metadata_updated_at: Option<String> = row.get("metadata_updated_at")?;
        let tags: Option<String> = row.get("tags")?;
        let topics: Option<String> = row.get("topic_categories")?;

        Ok(Video {
            video_id: row.get("video_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            thumbnail_url: row.get("thumbnail_url")?,
            audio_language: row.get("audio_language")?,
            published_at: published_at.as_deref().and_then(from_db_timestamp),
            channel_id: row.get("channel_id")?,
            channel_title: row.get("channel_title")?,
            category_id: row.get("category_id")?,
            tags: parse_json_list(tags.as_deref()),
            topic_categories: parse_json_list(topics.as_deref()),
            view_count: row.get("view_count")?,
            like_count: row.get("like_count")?,
            comment_count: row.get("comment_count")?,
            duration: row.get("duration")?,
            was_livestream: row.get("was_livestream")?,
            licensed_content: row.get("licensed_content")?,
            has_paid_product_placement: row.get("has_paid_product_placement")?,
            privacy_status: row.get("privacy_status")?,
            metadata_updated_at: metadata_updated_at.as_deref().and_then(from_db_timestamp),
        })
    }

    // ============================================
    // Watch event operations
    // ============================================

    /// Record a watch event for an existing video
    pub fn insert_watch_event(&self, video_id: &str, watched_at: DateTime<Utc>) -> Result<i64> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO watch_events (video_id, watched_at) VALUES (?1, ?2)",
            params![video_id, to_db_timestamp(&watched_at)],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Create-once each video and record one watch event per entry, in one
    /// transaction.
    pub fn record_watches(&self, watches: &[(Video, DateTime<Utc>)]) -> Result<BatchCounts> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let now = Utc::now();

        let mut counts = BatchCounts::default();
        for (video, watched_at) in watches {
            if Self::insert_video_with(&tx, video, now)? {
                counts.videos_created += 1;
            }
            tx.execute(
                "INSERT INTO watch_events (video_id, watched_at) VALUES (?1, ?2)",
                params![video.video_id, to_db_timestamp(watched_at)],
            )?;
            counts.events_recorded += 1;
        }

        tx.commit()?;
        Ok(counts)
    }

    /// Watch events for a video, oldest first
    pub fn get_watch_events(&self, video_id: &str) -> Result<Vec<WatchEvent>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, video_id, watched_at FROM watch_events WHERE video_id = ? ORDER BY watched_at ASC, id ASC",
        )?;

        let events = stmt
            .query_map([video_id], Self::row_to_watch_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(events)
    }

    /// Number of recorded watch events
    pub fn count_watch_events(&self) -> Result<i64> {
        let conn = self.lock();
        let count = conn.query_row("SELECT COUNT(*) FROM watch_events", [], |r| r.get(0))?;
        Ok(count)
    }

    fn row_to_watch_event(row: &Row) -> rusqlite::Result<WatchEvent> {
        let watched_at: String = row.get("watched_at")?;
        Ok(WatchEvent {
            id: row.get("id")?,
            video_id: row.get("video_id")?,
            watched_at: parse_stored_timestamp(&watched_at)?,
        })
    }
}

/// Decode a NOT NULL timestamp column, surfacing corrupt values as errors
pub(crate) fn parse_stored_timestamp(value: &str) -> rusqlite::Result<DateTime<Utc>> {
    from_db_timestamp(value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("invalid timestamp: {}", value).into(),
        )
    })
}

/// Encode a list column. Empty lists are stored as `[]`, not NULL.
fn json_list(values: &[String]) -> Result<String> {
    Ok(serde_json::to_string(values)?)
}

/// Encode a list for a first sighting, where empty means "not known yet".
fn optional_json_list(values: &[String]) -> Result<Option<String>> {
    if values.is_empty() {
        return Ok(None);
    }
    json_list(values).map(Some)
}

/// Decode a list column; NULL or malformed JSON reads as empty.
pub(crate) fn parse_json_list(value: Option<&str>) -> Vec<String> {
    value
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}
