//! # watchlog-core
//!
//! Core library for watchlog - analytics over a personal video watch history.
//!
//! This library provides:
//! - Domain types for videos and watch events
//! - Database storage layer with SQLite
//! - Aggregate statistics and the paginated video explorer
//! - Import of watch history exports and metadata enrichment
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Data flow
//!
//! - **Ingest:** watch history entries create videos (once) and watch events;
//!   metadata records enrich existing videos.
//! - **Store:** `videos` and `watch_events` tables in SQLite.
//! - **Query:** read-only aggregations scoped to watches at or after the
//!   configured cutoff, plus the explorer over the whole catalog.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use watchlog_core::{Config, Database, StatsService};
//!
//! # async fn run() -> watchlog_core::Result<()> {
//! let config = Config::load()?;
//! let db = Database::open(&config.resolved_database_path())?;
//! db.migrate()?;
//!
//! let stats = StatsService::new(Arc::new(db), config.stats.duration_reduction);
//! let response = stats.compute(config.stats.cutoff()?).await?;
//! println!("{} videos watched", response.basic_stats.total_videos);
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use explorer::{Explorer, ExplorerPage, ExplorerParams};
pub use insights::InsightsService;
pub use stats::{StatsResponse, StatsService};
pub use types::*;

// Public modules
pub mod config;
pub mod db;
pub mod duration;
pub mod error;
pub mod explorer;
pub mod format;
pub mod ingest;
pub mod insights;
pub mod logging;
pub mod stats;
pub mod types;
