//! Declarative sort table
//!
//! Every externally sortable field maps to one SQL expression with a fixed
//! null policy and optional tie-break. Field ids are never interpolated into
//! SQL; only the expressions from this table are.

use crate::error::{Error, Result};
use std::collections::HashSet;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn keyword(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// One sortable field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortColumn {
    /// External id, also the JSON key of the row field
    pub id: &'static str,
    /// SQL expression over the explorer select list
    pub expr: &'static str,
    /// Nullable values sort after all non-null values in both directions
    pub nullable: bool,
    /// Secondary ordering, always ascending
    pub tie_break: Option<&'static str>,
}

/// Sortable fields of the explorer
pub const SORT_COLUMNS: &[SortColumn] = &[
    SortColumn {
        id: "title",
        expr: "v.title",
        nullable: false,
        tie_break: None,
    },
    SortColumn {
        id: "channelTitle",
        expr: "v.channel_title",
        nullable: true,
        tie_break: None,
    },
    SortColumn {
        id: "categoryId",
        expr: "v.category_id",
        nullable: true,
        tie_break: None,
    },
    SortColumn {
        id: "viewCount",
        expr: "v.view_count",
        nullable: true,
        tie_break: Some("v.title"),
    },
    SortColumn {
        id: "likeCount",
        expr: "v.like_count",
        nullable: true,
        tie_break: None,
    },
    SortColumn {
        id: "commentCount",
        expr: "v.comment_count",
        nullable: true,
        tie_break: None,
    },
    SortColumn {
        id: "duration",
        expr: "iso_seconds_strict(v.duration)",
        nullable: true,
        tie_break: None,
    },
    SortColumn {
        id: "publishedAt",
        expr: "v.published_at",
        nullable: true,
        tie_break: None,
    },
    SortColumn {
        id: "watchCount",
        expr: "watch_count",
        nullable: false,
        tie_break: None,
    },
    SortColumn {
        id: "lastWatchedAt",
        expr: "last_watched_at",
        nullable: true,
        tie_break: None,
    },
    SortColumn {
        id: "wasLivestream",
        expr: "v.was_livestream",
        nullable: false,
        tie_break: None,
    },
];

/// Ordering used when the request has none
pub const DEFAULT_SORT: (&str, Direction) = ("watchCount", Direction::Desc);

/// Final ordering key, makes every page deterministic
const FINAL_TIE_BREAK: &str = "v.video_id ASC";

/// Validated lookup over [`SortColumn`]s
#[derive(Debug, Clone)]
pub struct SortTable {
    columns: Vec<SortColumn>,
}

impl SortTable {
    /// Build a table, checking that ids are unique, every id is one of
    /// `exposed`, and the default sort field exists.
    pub fn new(columns: &[SortColumn], exposed: &[&str]) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in columns {
            if !seen.insert(column.id) {
                return Err(Error::Config(format!(
                    "duplicate sort field: {}",
                    column.id
                )));
            }
            if !exposed.contains(&column.id) {
                return Err(Error::Config(format!(
                    "sort field {} is not an exposed column",
                    column.id
                )));
            }
        }
        if !seen.contains(DEFAULT_SORT.0) {
            return Err(Error::Config(format!(
                "default sort field {} is not sortable",
                DEFAULT_SORT.0
            )));
        }

        Ok(Self {
            columns: columns.to_vec(),
        })
    }

    /// Look up a field id
    pub fn get(&self, id: &str) -> Option<&SortColumn> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.id)
    }

    /// Resolve a field id, rejecting unknown ones
    pub fn resolve(&self, id: &str) -> Result<SortColumn> {
        self.get(id).copied().ok_or_else(|| {
            Error::InvalidQuery(format!(
                "unknown sort field '{}' (expected one of: {})",
                id,
                self.ids().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    /// The ordering applied when no sort is requested
    pub fn default_order(&self) -> Result<(SortColumn, Direction)> {
        Ok((self.resolve(DEFAULT_SORT.0)?, DEFAULT_SORT.1))
    }
}

/// Render an `ORDER BY` body for `column` in `direction`
pub fn order_by(column: &SortColumn, direction: Direction) -> String {
    let mut terms = Vec::with_capacity(3);

    if column.nullable {
        terms.push(format!("{} {} NULLS LAST", column.expr, direction.keyword()));
    } else {
        terms.push(format!("{} {}", column.expr, direction.keyword()));
    }
    if let Some(tie_break) = column.tie_break {
        terms.push(format!("{} ASC", tie_break));
    }
    terms.push(FINAL_TIE_BREAK.to_string());

    terms.join(", ")
}
