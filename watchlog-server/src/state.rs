//! Application state
//!
//! Shared by every handler. Nothing in here is mutable; each request opens
//! its own read connections through the services.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use watchlog_core::config::StatsConfig;
use watchlog_core::{Database, Explorer, InsightsService, StatsService};

#[derive(Clone)]
pub struct AppState {
    pub stats: StatsService,
    pub explorer: Explorer,
    pub insights: InsightsService,
    /// Watch events before this instant are ignored by `/stats`
    pub cutoff: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: Arc<Database>, config: &StatsConfig) -> watchlog_core::Result<Self> {
        Ok(Self {
            stats: StatsService::new(Arc::clone(&db), config.duration_reduction),
            explorer: Explorer::new(Arc::clone(&db))?,
            insights: InsightsService::new(db),
            cutoff: config.cutoff()?,
        })
    }
}
