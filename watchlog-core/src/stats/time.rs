//! Per-year watch activity
//!
//! Years come from the stored UTC timestamp, so an event at
//! `2019-12-31T23:30:00Z` belongs to 2019 wherever the server runs.

use super::reduction::DurationReduction;
use crate::error::Result;
use crate::types::to_db_timestamp;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearCount {
    pub year: i32,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearDuration {
    pub year: i32,
    /// ISO-8601 total
    pub duration: String,
    pub seconds: i64,
}

/// Ascending by year; years without events are absent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TimeStats {
    pub watches_by_year: Vec<YearCount>,
    pub duration_by_year: Vec<YearDuration>,
}

pub fn compute(
    conn: &Connection,
    cutoff: DateTime<Utc>,
    reduction: &dyn DurationReduction,
) -> Result<TimeStats> {
    Ok(TimeStats {
        watches_by_year: watches_by_year(conn, cutoff)?,
        duration_by_year: reduction.yearly_durations(conn, cutoff)?,
    })
}

fn watches_by_year(conn: &Connection, cutoff: DateTime<Utc>) -> Result<Vec<YearCount>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT CAST(substr(watched_at, 1, 4) AS INTEGER) AS year, COUNT(*) AS cnt
        FROM watch_events
        WHERE watched_at >= ?1
        GROUP BY year
        ORDER BY year ASC
        "#,
    )?;

    let rows = stmt
        .query_map([to_db_timestamp(&cutoff)], |row| {
            Ok(YearCount {
                year: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
