//! Scalar SQL functions registered on every connection
//!
//! - `iso_seconds(text)`: ISO-8601 duration to whole seconds, NULL for NULL
//!   input, 0 for unparseable input (same rules as [`crate::duration::parse`]).
//! - `iso_seconds_strict(text)`: like `iso_seconds` but NULL for unparseable
//!   input, for ordering where malformed values belong with the missing ones.
//! - `fold_case(text)`: Unicode lowercase, so `instr(fold_case(a), fold_case(b))`
//!   is a case-insensitive substring test beyond ASCII.

use crate::duration;
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

pub const ISO_SECONDS: &str = "iso_seconds";
pub const ISO_SECONDS_STRICT: &str = "iso_seconds_strict";
pub const FOLD_CASE: &str = "fold_case";

/// Register all watchlog SQL functions on `conn`.
pub fn register(conn: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function(ISO_SECONDS, 1, flags, |ctx| {
        let value: Option<String> = ctx.get(0)?;
        Ok(value.map(|d| duration::parse(&d)))
    })?;

    conn.create_scalar_function(ISO_SECONDS_STRICT, 1, flags, |ctx| {
        let value: Option<String> = ctx.get(0)?;
        Ok(value.and_then(|d| duration::parse_strict(d.trim())))
    })?;

    conn.create_scalar_function(FOLD_CASE, 1, flags, |ctx| {
        let value: Option<String> = ctx.get(0)?;
        Ok(value.map(|s| s.to_lowercase()))
    })?;

    Ok(())
}

/// Whether `iso_seconds` is callable on this connection.
pub fn has_iso_seconds(conn: &Connection) -> bool {
    conn.query_row("SELECT iso_seconds('PT1M1S')", [], |r| r.get::<_, i64>(0))
        .map(|secs| secs == 61)
        .unwrap_or(false)
}
