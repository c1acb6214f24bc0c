//! Headline totals

use crate::error::Result;
use crate::types::{from_db_timestamp, to_db_timestamp};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

/// First and last qualifying watch, both `None` for an empty window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct DateRange {
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BasicStats {
    /// Distinct videos with at least one qualifying watch
    pub total_videos: i64,
    /// Distinct non-null channel ids among those videos
    pub unique_channels: i64,
    pub date_range: DateRange,
}

pub fn compute(conn: &Connection, cutoff: DateTime<Utc>) -> Result<BasicStats> {
    let cutoff = to_db_timestamp(&cutoff);

    let (total_videos, unique_channels) = conn.query_row(
        r#"
        SELECT COUNT(*), COUNT(DISTINCT v.channel_id)
        FROM videos v
        WHERE EXISTS (
            SELECT 1 FROM watch_events e
            WHERE e.video_id = v.video_id AND e.watched_at >= ?1
        )
        "#,
        [&cutoff],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let (earliest, latest): (Option<String>, Option<String>) = conn.query_row(
        "SELECT MIN(watched_at), MAX(watched_at) FROM watch_events WHERE watched_at >= ?1",
        [&cutoff],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(BasicStats {
        total_videos,
        unique_channels,
        date_range: DateRange {
            earliest: earliest.as_deref().and_then(from_db_timestamp),
            latest: latest.as_deref().and_then(from_db_timestamp),
        },
    })
}
