//! Duration reductions
//!
//! SQLite has no interval type, so sums over ISO-8601 durations need help.
//! [`SqlReduction`] pushes the work into SQL through the `iso_seconds`
//! function; [`RowReduction`] fetches grouped rows and sums them here. Both
//! must return identical results.

use super::category::CategoryCount;
use super::channel::ChannelDuration;
use super::time::YearDuration;
use crate::config::ReductionMode;
use crate::db::{functions, placeholders};
use crate::duration;
use crate::error::Result;
use crate::types::to_db_timestamp;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::collections::{BTreeMap, HashMap};

/// Aggregations whose arithmetic is over ISO-8601 durations
pub trait DurationReduction: Send + Sync {
    fn name(&self) -> &'static str;

    /// Per channel, the sum over watch-scoped videos of duration times
    /// qualifying watch count. Ordered by seconds DESC, channel id ASC.
    fn channel_durations(
        &self,
        conn: &Connection,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ChannelDuration>>;

    /// Per UTC year, the sum of the watched video's duration over every
    /// qualifying event. Ascending by year.
    fn yearly_durations(&self, conn: &Connection, cutoff: DateTime<Utc>)
        -> Result<Vec<YearDuration>>;

    /// Watch-scoped videos longer than `min_secs` in one of `categories`,
    /// counted per category. Ordered by count DESC, category id ASC.
    fn long_form_categories(
        &self,
        conn: &Connection,
        cutoff: DateTime<Utc>,
        min_secs: i64,
        categories: &[&str],
    ) -> Result<Vec<CategoryCount>>;
}

static SQL: SqlReduction = SqlReduction;
static ROWS: RowReduction = RowReduction;

/// Pick the reduction for `mode`; `Auto` probes `conn` for `iso_seconds`.
pub fn select(mode: ReductionMode, conn: &Connection) -> &'static dyn DurationReduction {
    match mode {
        ReductionMode::Sql => &SQL,
        ReductionMode::Rows => &ROWS,
        ReductionMode::Auto if functions::has_iso_seconds(conn) => &SQL,
        ReductionMode::Auto => {
            tracing::warn!("iso_seconds unavailable, reducing durations in memory");
            &ROWS
        }
    }
}

const QUALIFYING: &str = r#"
    WITH qualifying AS (
        SELECT video_id, COUNT(*) AS watches
        FROM watch_events
        WHERE watched_at >= ?1
        GROUP BY video_id
    )
"#;

// ============================================
// SQL
// ============================================

/// Reduction inside SQLite via `iso_seconds`
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlReduction;

impl DurationReduction for SqlReduction {
    fn name(&self) -> &'static str {
        "sql"
    }

    fn channel_durations(
        &self,
        conn: &Connection,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ChannelDuration>> {
        let sql = format!(
            r#"
            {QUALIFYING}
            SELECT v.channel_id,
                   MAX(v.channel_title) AS channel_title,
                   SUM(COALESCE(iso_seconds(v.duration), 0) * q.watches) AS secs
            FROM videos v
            JOIN qualifying q ON q.video_id = v.video_id
            WHERE v.channel_id IS NOT NULL AND v.channel_title IS NOT NULL
            GROUP BY v.channel_id
            ORDER BY secs DESC, v.channel_id ASC
            LIMIT ?2
            "#
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![to_db_timestamp(&cutoff), limit as i64], |row| {
                let seconds: i64 = row.get("secs")?;
                Ok(ChannelDuration {
                    channel_id: row.get("channel_id")?,
                    channel_title: row.get("channel_title")?,
                    duration: duration::format(seconds),
                    seconds,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn yearly_durations(
        &self,
        conn: &Connection,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<YearDuration>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT CAST(substr(e.watched_at, 1, 4) AS INTEGER) AS year,
                   SUM(COALESCE(iso_seconds(v.duration), 0)) AS secs
            FROM watch_events e
            JOIN videos v ON v.video_id = e.video_id
            WHERE e.watched_at >= ?1
            GROUP BY year
            ORDER BY year ASC
            "#,
        )?;

        let rows = stmt
            .query_map([to_db_timestamp(&cutoff)], |row| {
                let seconds: i64 = row.get("secs")?;
                Ok(YearDuration {
                    year: row.get("year")?,
                    duration: duration::format(seconds),
                    seconds,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn long_form_categories(
        &self,
        conn: &Connection,
        cutoff: DateTime<Utc>,
        min_secs: i64,
        categories: &[&str],
    ) -> Result<Vec<CategoryCount>> {
        if categories.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            {QUALIFYING}
            SELECT v.category_id, COUNT(*) AS cnt
            FROM videos v
            JOIN qualifying q ON q.video_id = v.video_id
            WHERE COALESCE(iso_seconds(v.duration), 0) > ?2
              AND v.category_id IN ({})
            GROUP BY v.category_id
            ORDER BY cnt DESC, v.category_id ASC
            "#,
            placeholders(3, categories.len())
        );

        let cutoff = to_db_timestamp(&cutoff);
        let mut bind: Vec<&dyn rusqlite::ToSql> = vec![&cutoff as &dyn rusqlite::ToSql, &min_secs];
        bind.extend(categories.iter().map(|c| c as &dyn rusqlite::ToSql));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(bind.as_slice(), |row| {
                Ok(CategoryCount {
                    category_id: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

// ============================================
// Rows
// ============================================

/// Reduction in Rust over grouped rows
#[derive(Debug, Clone, Copy, Default)]
pub struct RowReduction;

impl DurationReduction for RowReduction {
    fn name(&self) -> &'static str {
        "rows"
    }

    fn channel_durations(
        &self,
        conn: &Connection,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ChannelDuration>> {
        let sql = format!(
            r#"
            {QUALIFYING}
            SELECT v.channel_id, v.channel_title, v.duration, q.watches
            FROM videos v
            JOIN qualifying q ON q.video_id = v.video_id
            WHERE v.channel_id IS NOT NULL AND v.channel_title IS NOT NULL
            "#
        );

        // channel id -> (greatest title, ISO total)
        let mut totals: HashMap<String, (String, String)> = HashMap::new();

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([to_db_timestamp(&cutoff)])?;
        while let Some(row) = rows.next()? {
            let channel_id: String = row.get(0)?;
            let title: String = row.get(1)?;
            let length = duration::parse_opt(row.get::<_, Option<String>>(2)?.as_deref());
            let watches: i64 = row.get(3)?;

            let contribution = duration::format(length.saturating_mul(watches));
            let entry = totals
                .entry(channel_id)
                .or_insert_with(|| (title.clone(), duration::ZERO.to_string()));
            if title > entry.0 {
                entry.0 = title;
            }
            entry.1 = duration::add(&entry.1, &contribution);
        }

        let mut ranked: Vec<ChannelDuration> = totals
            .into_iter()
            .map(|(channel_id, (channel_title, total))| ChannelDuration {
                channel_id,
                channel_title,
                seconds: duration::parse(&total),
                duration: total,
            })
            .collect();
        ranked.sort_by(|a, b| {
            duration::compare(&b.duration, &a.duration)
                .then_with(|| a.channel_id.cmp(&b.channel_id))
        });
        ranked.truncate(limit);

        Ok(ranked)
    }

    fn yearly_durations(
        &self,
        conn: &Connection,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<YearDuration>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT CAST(substr(e.watched_at, 1, 4) AS INTEGER) AS year,
                   v.duration,
                   COUNT(*) AS watches
            FROM watch_events e
            JOIN videos v ON v.video_id = e.video_id
            WHERE e.watched_at >= ?1
            GROUP BY year, e.video_id
            "#,
        )?;

        let mut years: BTreeMap<i32, String> = BTreeMap::new();
        let mut rows = stmt.query([to_db_timestamp(&cutoff)])?;
        while let Some(row) = rows.next()? {
            let year: i32 = row.get(0)?;
            let length = duration::parse_opt(row.get::<_, Option<String>>(1)?.as_deref());
            let watches: i64 = row.get(2)?;

            let total = years
                .entry(year)
                .or_insert_with(|| duration::ZERO.to_string());
            *total = duration::add(total, &duration::format(length.saturating_mul(watches)));
        }

        Ok(years
            .into_iter()
            .map(|(year, total)| YearDuration {
                year,
                seconds: duration::parse(&total),
                duration: total,
            })
            .collect())
    }

    fn long_form_categories(
        &self,
        conn: &Connection,
        cutoff: DateTime<Utc>,
        min_secs: i64,
        categories: &[&str],
    ) -> Result<Vec<CategoryCount>> {
        let sql = format!(
            r#"
            {QUALIFYING}
            SELECT v.category_id, v.duration
            FROM videos v
            JOIN qualifying q ON q.video_id = v.video_id
            WHERE v.category_id IS NOT NULL
            "#
        );

        let mut counts: HashMap<String, i64> = HashMap::new();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query([to_db_timestamp(&cutoff)])?;
        while let Some(row) = rows.next()? {
            let category: String = row.get(0)?;
            if !categories.contains(&category.as_str()) {
                continue;
            }
            let length = duration::parse_opt(row.get::<_, Option<String>>(1)?.as_deref());
            if length > min_secs {
                *counts.entry(category).or_default() += 1;
            }
        }

        let mut ranked: Vec<CategoryCount> = counts
            .into_iter()
            .map(|(category_id, count)| CategoryCount { category_id, count })
            .collect();
        ranked.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.category_id.cmp(&b.category_id))
        });

        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::testing::*;
    use crate::types::Video;

    #[test]
    fn test_watched_three_times_counts_three_times() {
        let db = seeded_db(&[video("v", "UC1", Some("One"), "PT10M", false)]);
        watch(&db, "v", 2020, 3);
        let conn = db.reader().unwrap();

        for reduction in [&SQL as &dyn DurationReduction, &ROWS] {
            let ranked = reduction.channel_durations(&conn, cutoff(), 20).unwrap();
            assert_eq!(ranked.len(), 1, "{}", reduction.name());
            assert_eq!(ranked[0].duration, "PT30M", "{}", reduction.name());
            assert_eq!(ranked[0].seconds, 1800);
        }
    }

    #[test]
    fn test_reductions_agree() {
        let mut videos = Vec::new();
        for (i, (channel, duration)) in [
            ("UCa", "PT3M20S"),
            ("UCa", "PT1H"),
            ("UCb", "P1DT1S"),
            ("UCb", ""),
            ("UCc", "junk"),
            ("UCd", "PT45M"),
            ("UCe", "PT45M"),
        ]
        .into_iter()
        .enumerate()
        {
            videos.push(Video {
                category_id: Some(["22", "24", "27", "10"][i % 4].to_string()),
                ..video(&format!("v{}", i), channel, Some(channel), duration, false)
            });
        }
        let db = seeded_db(&videos);
        for (i, year) in [2017, 2018, 2018, 2019, 2020, 2020, 2021].into_iter().enumerate() {
            watch(&db, &format!("v{}", i), year, i % 3 + 1);
        }
        watch(&db, "v1", 2016, 4);

        let conn = db.reader().unwrap();
        assert_eq!(
            SQL.channel_durations(&conn, cutoff(), 3).unwrap(),
            ROWS.channel_durations(&conn, cutoff(), 3).unwrap()
        );
        assert_eq!(
            SQL.yearly_durations(&conn, cutoff()).unwrap(),
            ROWS.yearly_durations(&conn, cutoff()).unwrap()
        );
        assert_eq!(
            SQL.long_form_categories(&conn, cutoff(), 1200, &["22", "24", "27"])
                .unwrap(),
            ROWS.long_form_categories(&conn, cutoff(), 1200, &["22", "24", "27"])
                .unwrap()
        );
    }

    #[test]
    fn test_auto_falls_back_without_function() {
        let bare = Connection::open_in_memory().unwrap();
        assert_eq!(select(ReductionMode::Auto, &bare).name(), "rows");
        assert_eq!(select(ReductionMode::Sql, &bare).name(), "sql");

        functions::register(&bare).unwrap();
        assert_eq!(select(ReductionMode::Auto, &bare).name(), "sql");
        assert_eq!(select(ReductionMode::Rows, &bare).name(), "rows");
    }
}
