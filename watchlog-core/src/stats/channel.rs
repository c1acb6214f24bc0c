//! Per-channel rankings
//!
//! Only watch-scoped videos count. Videos with no channel id or no channel
//! title are left out of every ranking; links that only carry a handle get
//! their id from metadata enrichment. Equal metrics are ordered by channel
//! id so repeated runs return the same lists.

use super::reduction::DurationReduction;
use crate::error::Result;
use crate::types::to_db_timestamp;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;

/// Length of the count, watch and duration rankings
pub const TOP_CHANNELS: usize = 20;
/// Length of the livestream ranking
pub const TOP_LIVESTREAM_CHANNELS: usize = 10;

/// A channel and one integer metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelCount {
    pub channel_id: String,
    pub channel_title: String,
    pub count: i64,
}

/// A channel and its total watched duration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDuration {
    pub channel_id: String,
    pub channel_title: String,
    /// ISO-8601 total
    pub duration: String,
    pub seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    /// Distinct non-livestream videos per channel
    pub top_by_count: Vec<ChannelCount>,
    /// Watch events on non-livestream videos per channel
    pub top_by_watches: Vec<ChannelCount>,
    /// Each video's duration times its watch count, summed per channel
    pub top_by_duration: Vec<ChannelDuration>,
    /// Watch events on livestream videos per channel
    pub top_livestreams: Vec<ChannelCount>,
}

#[derive(Debug, Clone, Copy)]
enum Metric {
    Videos,
    Watches,
}

impl Metric {
    fn column(self) -> &'static str {
        match self {
            Metric::Videos => "videos",
            Metric::Watches => "watches",
        }
    }
}

pub fn compute(
    conn: &Connection,
    cutoff: DateTime<Utc>,
    reduction: &dyn DurationReduction,
) -> Result<ChannelStats> {
    Ok(ChannelStats {
        top_by_count: ranked(conn, cutoff, false, Metric::Videos, TOP_CHANNELS)?,
        top_by_watches: ranked(conn, cutoff, false, Metric::Watches, TOP_CHANNELS)?,
        top_by_duration: reduction.channel_durations(conn, cutoff, TOP_CHANNELS)?,
        top_livestreams: ranked(
            conn,
            cutoff,
            true,
            Metric::Watches,
            TOP_LIVESTREAM_CHANNELS,
        )?,
    })
}

fn ranked(
    conn: &Connection,
    cutoff: DateTime<Utc>,
    livestream: bool,
    metric: Metric,
    limit: usize,
) -> Result<Vec<ChannelCount>> {
    let sql = format!(
        r#"
        WITH qualifying AS (
            SELECT video_id, COUNT(*) AS watches
            FROM watch_events
            WHERE watched_at >= ?1
            GROUP BY video_id
        )
        SELECT v.channel_id,
               MAX(v.channel_title) AS channel_title,
               COUNT(*) AS videos,
               SUM(q.watches) AS watches
        FROM videos v
        JOIN qualifying q ON q.video_id = v.video_id
        WHERE v.channel_id IS NOT NULL
          AND v.channel_title IS NOT NULL
          AND v.was_livestream = ?2
        GROUP BY v.channel_id
        ORDER BY {metric} DESC, v.channel_id ASC
        LIMIT ?3
        "#,
        metric = metric.column()
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![to_db_timestamp(&cutoff), livestream, limit as i64],
            |row| {
                Ok(ChannelCount {
                    channel_id: row.get("channel_id")?,
                    channel_title: row.get("channel_title")?,
                    count: row.get(metric.column())?,
                })
            },
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
