//! ISO-8601 duration arithmetic
//!
//! Video durations arrive as ISO-8601 strings (`PT1H2M3S`). Aggregations need
//! to sum and compare them, so everything is funneled through whole seconds.
//!
//! Parsing fails soft: a missing or malformed duration counts as zero so that
//! historical rows with incomplete metadata never abort an aggregate.

use std::cmp::Ordering;

/// Canonical form for a zero-length duration.
pub const ZERO: &str = "PT0S";

const SECS_PER_MINUTE: i64 = 60;
const SECS_PER_HOUR: i64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;

/// Parse an ISO-8601 duration into whole seconds.
///
/// Accepts `P[nD][T[nH][nM][nS]]`. Components must appear in order and at
/// most once; fractional seconds are truncated. Anything else yields 0.
pub fn parse(duration: &str) -> i64 {
    parse_strict(duration.trim()).unwrap_or(0)
}

/// Parse an optional duration; `None` counts as zero.
pub fn parse_opt(duration: Option<&str>) -> i64 {
    duration.map(parse).unwrap_or(0)
}

/// Parse a duration, returning `None` if it is not well formed.
pub fn parse_strict(duration: &str) -> Option<i64> {
    let rest = duration.strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };

    let mut total = 0i64;

    // Date section: only days are meaningful for video lengths.
    let mut date_units = Components::new(date_part, &['D']);
    while let Some((value, unit)) = date_units.next_component()? {
        debug_assert_eq!(unit, 'D');
        total = total.checked_add(value.checked_mul(SECS_PER_DAY)?)?;
    }

    if let Some(time) = time_part {
        let mut time_units = Components::new(time, &['H', 'M', 'S']);
        while let Some((value, unit)) = time_units.next_component()? {
            let scale = match unit {
                'H' => SECS_PER_HOUR,
                'M' => SECS_PER_MINUTE,
                _ => 1,
            };
            total = total.checked_add(value.checked_mul(scale)?)?;
        }
    }

    Some(total)
}

/// Serialize seconds as an ISO-8601 duration, omitting zero-valued units.
///
/// Hours are not folded into days. Zero and negative inputs become [`ZERO`].
pub fn format(seconds: i64) -> String {
    if seconds <= 0 {
        return ZERO.to_string();
    }

    let hours = seconds / SECS_PER_HOUR;
    let minutes = (seconds % SECS_PER_HOUR) / SECS_PER_MINUTE;
    let secs = seconds % SECS_PER_MINUTE;

    let mut out = String::from("PT");
    if hours > 0 {
        out.push_str(&format!("{}H", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}M", minutes));
    }
    if secs > 0 {
        out.push_str(&format!("{}S", secs));
    }
    out
}

/// Sum two durations and re-serialize the result.
pub fn add(a: &str, b: &str) -> String {
    format(parse(a).saturating_add(parse(b)))
}

/// Order two durations by length.
pub fn compare(a: &str, b: &str) -> Ordering {
    parse(a).cmp(&parse(b))
}

/// Human readable form (e.g., "1h 2m 3s"), "0s" for empty durations.
pub fn humanize(duration: &str) -> String {
    humanize_secs(parse(duration))
}

/// Human readable form of a number of seconds.
pub fn humanize_secs(seconds: i64) -> String {
    if seconds <= 0 {
        return "0s".to_string();
    }
    let h = seconds / SECS_PER_HOUR;
    let m = (seconds % SECS_PER_HOUR) / SECS_PER_MINUTE;
    let s = seconds % SECS_PER_MINUTE;

    let mut parts = Vec::new();
    if h > 0 {
        parts.push(format!("{}h", h));
    }
    if m > 0 {
        parts.push(format!("{}m", m));
    }
    if s > 0 {
        parts.push(format!("{}s", s));
    }
    parts.join(" ")
}

/// Iterator-like scanner over `<digits><unit>` pairs.
struct Components<'a> {
    input: &'a str,
    allowed: &'static [char],
    next_unit: usize,
}

impl<'a> Components<'a> {
    fn new(input: &'a str, allowed: &'static [char]) -> Self {
        Self {
            input,
            allowed,
            next_unit: 0,
        }
    }

    /// Returns `Some(None)` at end of input and `None` on malformed input.
    fn next_component(&mut self) -> Option<Option<(i64, char)>> {
        if self.input.is_empty() {
            return Some(None);
        }

        let unit_pos = self.input.find(|c: char| c.is_ascii_alphabetic())?;
        let (number, rest) = self.input.split_at(unit_pos);
        let unit = rest.chars().next()?;

        let idx = self.allowed.iter().position(|u| *u == unit)?;
        if idx < self.next_unit {
            // Out of order or repeated
            return None;
        }
        self.next_unit = idx + 1;

        let whole = match number.split_once('.') {
            Some((whole, frac)) if unit == 'S' => {
                if !frac.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                whole
            }
            Some(_) => return None,
            None => number,
        };
        if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        let value = whole.parse::<i64>().ok()?;
        self.input = &rest[unit.len_utf8()..];
        Some(Some((value, unit)))
    }
}
