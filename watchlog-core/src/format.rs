//! Formatting helpers for terminal output.

use chrono::{DateTime, Utc};

/// Format a count with thousands separators (`1234567` -> `1,234,567`).
pub fn format_count(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Format an optional count, `-` if unknown.
pub fn format_count_opt(n: Option<i64>) -> String {
    n.map(format_count).unwrap_or_else(|| "-".to_string())
}

/// Format a timestamp relative to `now` (e.g., "3d ago").
///
/// Anything older than a month is shown as a date.
pub fn format_relative_time(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(ts);

    if elapsed.num_seconds() < 60 {
        "just now".to_string()
    } else if elapsed.num_minutes() < 60 {
        format!("{}m ago", elapsed.num_minutes())
    } else if elapsed.num_hours() < 24 {
        format!("{}h ago", elapsed.num_hours())
    } else if elapsed.num_days() < 30 {
        format!("{}d ago", elapsed.num_days())
    } else {
        ts.format("%Y-%m-%d").to_string()
    }
}

/// Format an optional timestamp, `never` if missing.
pub fn format_relative_time_opt(ts: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match ts {
        Some(ts) => format_relative_time(ts, now),
        None => "never".to_string(),
    }
}
