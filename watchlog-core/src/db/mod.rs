//! Database layer for watchlog
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository operations for videos and watch events
//! - Scalar SQL functions shared by every connection

pub mod functions;
pub mod repo;
pub mod schema;

pub use repo::{BatchCounts, Database, EnrichCounts};

/// Placeholder list `?n, ?n+1, ...` for an IN clause
pub(crate) fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}
