//! Category distribution of watch-scoped videos

use super::reduction::DurationReduction;
use crate::error::Result;
use crate::types::to_db_timestamp;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

/// Videos longer than this count as long-form
pub const LONG_FORM_SECS: i64 = 1200;

/// People & Blogs, Entertainment, Education
pub const PODCAST_CATEGORIES: [&str; 3] = ["22", "24", "27"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category_id: String,
    pub count: i64,
}

/// Both lists are ordered by count DESC, then category id ASC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub category_distribution: Vec<CategoryCount>,
    /// Long-form videos in the podcast-like categories
    pub podcast_stats: Vec<CategoryCount>,
}

pub fn compute(
    conn: &Connection,
    cutoff: DateTime<Utc>,
    reduction: &dyn DurationReduction,
) -> Result<CategoryStats> {
    Ok(CategoryStats {
        category_distribution: distribution(conn, cutoff)?,
        podcast_stats: reduction.long_form_categories(
            conn,
            cutoff,
            LONG_FORM_SECS,
            &PODCAST_CATEGORIES,
        )?,
    })
}

fn distribution(conn: &Connection, cutoff: DateTime<Utc>) -> Result<Vec<CategoryCount>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT v.category_id, COUNT(*) AS cnt
        FROM videos v
        WHERE v.category_id IS NOT NULL
          AND EXISTS (
              SELECT 1 FROM watch_events e
              WHERE e.video_id = v.video_id AND e.watched_at >= ?1
          )
        GROUP BY v.category_id
        ORDER BY cnt DESC, v.category_id ASC
        "#,
    )?;

    let rows = stmt
        .query_map([to_db_timestamp(&cutoff)], |row| {
            Ok(CategoryCount {
                category_id: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
