//! Ingestion of watch history and video metadata
//!
//! ```text
//! ┌──────────────────┐     ┌────────────────┐     ┌──────────────┐
//! │ watch-history    │ ──► │ import_history │ ──► │ videos       │
//! │ (.json export)   │     └────────────────┘     │ watch_events │
//! └──────────────────┘                            └──────────────┘
//! ┌──────────────────┐     ┌────────────────┐            ▲
//! │ metadata dump    │ ──► │ enrich_metadata│ ───────────┘
//! │ (.json records)  │     └────────────────┘
//! └──────────────────┘
//! ```
//!
//! Import only ever creates videos; metadata on an existing video is
//! changed by enrichment alone.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use watchlog_core::ingest;
//!
//! let entries = ingest::read_history(Path::new("watch-history.json"))?;
//! let report = ingest::import_history(&db, &entries)?;
//! println!("{} events, {} skipped", report.events_recorded, report.skipped.len());
//! ```

mod history;

pub use history::{
    channel_id_from_url, parse_watch_time, video_id_from_url, HistoryEntry, ParsedEntry, Subtitle,
    TakeoutEntry,
};

use crate::db::{Database, EnrichCounts};
use crate::error::{Error, Result};
use crate::types::VideoMetadata;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Entry that was not imported
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    /// Position in the input list
    pub index: usize,
    pub reason: String,
}

/// Outcome of [`import_history`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub entries: usize,
    pub videos_created: usize,
    pub events_recorded: usize,
    pub skipped: Vec<SkippedEntry>,
}

/// Outcome of [`enrich_metadata`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichReport {
    pub records: usize,
    pub updated: usize,
    /// Records for videos that were never watched
    pub skipped: usize,
}

/// Record every resolvable entry as a watch event, creating videos on first
/// sighting. All recorded entries commit in one transaction.
pub fn import_history(db: &Database, entries: &[HistoryEntry]) -> Result<ImportReport> {
    let mut watches = Vec::with_capacity(entries.len());
    let mut skipped = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        match entry.resolve() {
            Ok(watch) => watches.push(watch),
            Err(reason) => {
                tracing::warn!(index, reason = %reason, "Skipping history entry");
                skipped.push(SkippedEntry { index, reason });
            }
        }
    }

    let counts = db.record_watches(&watches)?;
    tracing::info!(
        entries = entries.len(),
        videos_created = counts.videos_created,
        events_recorded = counts.events_recorded,
        skipped = skipped.len(),
        "Imported watch history"
    );

    Ok(ImportReport {
        entries: entries.len(),
        videos_created: counts.videos_created,
        events_recorded: counts.events_recorded,
        skipped,
    })
}

/// Apply metadata records to the videos they name.
pub fn enrich_metadata(db: &Database, records: &[VideoMetadata]) -> Result<EnrichReport> {
    if let Some(index) = records.iter().position(|r| r.video_id.trim().is_empty()) {
        return Err(Error::Ingest(format!(
            "metadata record {} has an empty videoId",
            index
        )));
    }

    let EnrichCounts { updated, skipped } = db.update_metadata_batch(records, Utc::now())?;
    tracing::info!(records = records.len(), updated, skipped, "Applied video metadata");

    Ok(EnrichReport {
        records: records.len(),
        updated,
        skipped,
    })
}

/// Read a watch history export (a JSON array of entries)
pub fn read_history(path: &Path) -> Result<Vec<HistoryEntry>> {
    read_json_array(path)
}

/// Read a metadata dump (a JSON array of camelCase records)
pub fn read_metadata(path: &Path) -> Result<Vec<VideoMetadata>> {
    read_json_array(path)
}

fn read_json_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).map_err(|e| {
        Error::Ingest(format!("cannot open {}: {}", path.display(), e))
    })?;
    let items: Vec<T> = serde_json::from_reader(BufReader::new(file))?;
    tracing::debug!(path = %path.display(), count = items.len(), "Read input file");
    Ok(items)
}
