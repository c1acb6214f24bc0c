//! Watch history statistics
//!
//! Five independent aggregations, each a pure function of the store and the
//! cutoff. [`StatsService::compute`] runs them concurrently on separate read
//! connections and fails as a whole if any one fails.
//!
//! | Aggregation | Scope | Module |
//! |-------------|-------|--------|
//! | Totals and date range | watch-scoped | [`basic`] |
//! | Channel rankings | watch-scoped | [`channel`] |
//! | Per-year counts and durations | watch events | [`time`] |
//! | Category distribution | watch-scoped | [`category`] |
//! | Attribute breakdowns | catalog | [`attribute`] |

pub mod attribute;
pub mod basic;
pub mod category;
pub mod channel;
pub mod reduction;
pub mod time;

pub use attribute::AttributeStats;
pub use basic::BasicStats;
pub use category::CategoryStats;
pub use channel::ChannelStats;
pub use reduction::{DurationReduction, RowReduction, SqlReduction};
pub use time::TimeStats;

use crate::config::ReductionMode;
use crate::db::Database;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Payload of the stats endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub basic_stats: BasicStats,
    pub channel_stats: ChannelStats,
    pub time_stats: TimeStats,
    pub category_stats: CategoryStats,
    pub attribute_stats: AttributeStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Aggregation {
    Basic,
    Channel,
    Time,
    Category,
    Attribute,
}

enum Part {
    Basic(BasicStats),
    Channel(ChannelStats),
    Time(TimeStats),
    Category(CategoryStats),
    Attribute(AttributeStats),
}

impl Aggregation {
    const ALL: [Aggregation; 5] = [
        Aggregation::Basic,
        Aggregation::Channel,
        Aggregation::Time,
        Aggregation::Category,
        Aggregation::Attribute,
    ];

    fn name(self) -> &'static str {
        match self {
            Aggregation::Basic => "basic",
            Aggregation::Channel => "channel",
            Aggregation::Time => "time",
            Aggregation::Category => "category",
            Aggregation::Attribute => "attribute",
        }
    }

    /// Run on a fresh reader. Blocking.
    fn run(self, db: &Database, cutoff: DateTime<Utc>, mode: ReductionMode) -> Result<Part> {
        let started = Instant::now();
        let conn = db.reader()?;
        let reduction = reduction::select(mode, &conn);

        let part = match self {
            Aggregation::Basic => Part::Basic(basic::compute(&conn, cutoff)?),
            Aggregation::Channel => Part::Channel(channel::compute(&conn, cutoff, reduction)?),
            Aggregation::Time => Part::Time(time::compute(&conn, cutoff, reduction)?),
            Aggregation::Category => Part::Category(category::compute(&conn, cutoff, reduction)?),
            Aggregation::Attribute => Part::Attribute(attribute::compute(&conn)?),
        };

        tracing::debug!(
            aggregation = self.name(),
            reduction = reduction.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Aggregation complete"
        );
        Ok(part)
    }
}

/// Computes [`StatsResponse`] on demand. Nothing is cached.
#[derive(Clone)]
pub struct StatsService {
    db: Arc<Database>,
    mode: ReductionMode,
}

impl StatsService {
    pub fn new(db: Arc<Database>, mode: ReductionMode) -> Self {
        Self { db, mode }
    }

    /// Run all aggregations concurrently.
    ///
    /// The first failure is returned and the remaining tasks are aborted;
    /// there is no partial response.
    pub async fn compute(&self, cutoff: DateTime<Utc>) -> Result<StatsResponse> {
        let started = Instant::now();
        let mut tasks: JoinSet<Result<Part>> = JoinSet::new();

        for aggregation in Aggregation::ALL {
            let db = Arc::clone(&self.db);
            let mode = self.mode;
            tasks.spawn_blocking(move || {
                aggregation.run(&db, cutoff, mode).map_err(|e| {
                    tracing::error!(aggregation = aggregation.name(), error = %e, "Aggregation failed");
                    e
                })
            });
        }

        let mut assembly = Assembly::default();
        while let Some(joined) = tasks.join_next().await {
            // Returning drops the set, which aborts whatever is still queued.
            let part = joined.map_err(Error::from).and_then(|r| r)?;
            assembly.insert(part);
        }

        let response = assembly.finish()?;
        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            total_videos = response.basic_stats.total_videos,
            "Stats computed"
        );
        Ok(response)
    }
}

#[derive(Default)]
struct Assembly {
    basic: Option<BasicStats>,
    channel: Option<ChannelStats>,
    time: Option<TimeStats>,
    category: Option<CategoryStats>,
    attribute: Option<AttributeStats>,
}

impl Assembly {
    fn insert(&mut self, part: Part) {
        match part {
            Part::Basic(s) => self.basic = Some(s),
            Part::Channel(s) => self.channel = Some(s),
            Part::Time(s) => self.time = Some(s),
            Part::Category(s) => self.category = Some(s),
            Part::Attribute(s) => self.attribute = Some(s),
        }
    }

    fn finish(self) -> Result<StatsResponse> {
        let missing = |name: &str| Error::Task(format!("{} aggregation produced no result", name));
        Ok(StatsResponse {
            basic_stats: self.basic.ok_or_else(|| missing("basic"))?,
            channel_stats: self.channel.ok_or_else(|| missing("channel"))?,
            time_stats: self.time.ok_or_else(|| missing("time"))?,
            category_stats: self.category.ok_or_else(|| missing("category"))?,
            attribute_stats: self.attribute.ok_or_else(|| missing("attribute"))?,
        })
    }
}
