//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: catalog and watch history
    r#"
    CREATE TABLE IF NOT EXISTS videos (
        video_id                    TEXT PRIMARY KEY,
        title                       TEXT NOT NULL,
        description                 TEXT,
        thumbnail_url               TEXT,
        audio_language              TEXT,
        published_at                TEXT,
        channel_id                  TEXT,
        channel_title               TEXT,
        category_id                 TEXT,

        -- JSON arrays; NULL until enriched
        tags                        JSON,
        topic_categories            JSON,

        view_count                  INTEGER,
        like_count                  INTEGER,
        comment_count               INTEGER,

        -- ISO-8601 (PT4M13S)
        duration                    TEXT,

        was_livestream              INTEGER NOT NULL DEFAULT 0,
        licensed_content            INTEGER,
        has_paid_product_placement  INTEGER,
        privacy_status              TEXT,

        metadata_updated_at         TEXT,
        created_at                  TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS watch_events (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        video_id    TEXT NOT NULL REFERENCES videos(video_id),
        watched_at  TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_watch_events_video ON watch_events(video_id, watched_at);
    CREATE INDEX IF NOT EXISTS idx_watch_events_time ON watch_events(watched_at);
    CREATE INDEX IF NOT EXISTS idx_videos_channel ON videos(channel_id);
    "#,
    // Version 2: explorer sort columns
    r#"
    CREATE INDEX IF NOT EXISTS idx_videos_view_count ON videos(view_count);
    CREATE INDEX IF NOT EXISTS idx_videos_published ON videos(published_at);
    CREATE INDEX IF NOT EXISTS idx_videos_category ON videos(category_id);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::debug!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute_batch(&format!("PRAGMA user_version = {}", version))?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_schema_version(conn: &Connection) -> i32 {
        conn.query_row("PRAGMA user_version", [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_schema_version(&conn);
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in ["videos", "watch_events"] {
            let exists: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert_eq!(exists, 1, "Table {} should exist", table);
        }
    }

    #[test]
    fn test_watch_events_reference_videos() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON").unwrap();
        run_migrations(&conn).unwrap();

        let orphan = conn.execute(
            "INSERT INTO watch_events (video_id, watched_at) VALUES ('missing', '2020-01-01T00:00:00Z')",
            [],
        );
        assert!(orphan.is_err());
    }
}
