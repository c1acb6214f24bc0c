//! Explorer request parsing
//!
//! Raw query-string values are validated here so malformed input becomes an
//! [`Error::InvalidQuery`] instead of being coerced.

use super::sort::{Direction, SortColumn, SortTable};
use crate::error::{Error, Result};
use serde::Deserialize;

/// Page sizes a client may request
pub const PAGE_SIZES: [u32; 4] = [10, 25, 50, 100];
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Query-string parameters as received
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerParams {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub search: Option<String>,
    /// JSON array with at most one `{"id": .., "desc": ..}` element
    pub sort_by: Option<String>,
}

/// One element of `sortBy`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SortSpec {
    pub id: String,
    #[serde(default)]
    pub desc: bool,
}

/// A validated explorer request
#[derive(Debug, Clone)]
pub struct ExplorerQuery {
    /// Zero-based
    pub page: u32,
    pub page_size: u32,
    /// Trimmed, non-empty search text
    pub search: Option<String>,
    pub sort: SortColumn,
    pub direction: Direction,
}

impl ExplorerQuery {
    pub fn parse(params: &ExplorerParams, table: &SortTable) -> Result<Self> {
        let page = match non_blank(params.page.as_deref()) {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| Error::InvalidQuery(format!("page must be a non-negative integer, got '{}'", raw)))?,
            None => 0,
        };

        let page_size = match non_blank(params.page_size.as_deref()) {
            Some(raw) => {
                let size = raw.parse::<u32>().ok().filter(|s| PAGE_SIZES.contains(s));
                size.ok_or_else(|| {
                    Error::InvalidQuery(format!(
                        "pageSize must be one of {:?}, got '{}'",
                        PAGE_SIZES, raw
                    ))
                })?
            }
            None => DEFAULT_PAGE_SIZE,
        };

        let search = non_blank(params.search.as_deref()).map(str::to_string);

        let (sort, direction) = match non_blank(params.sort_by.as_deref()) {
            Some(raw) => match parse_sort_by(raw)? {
                Some(spec) => {
                    let direction = if spec.desc {
                        Direction::Desc
                    } else {
                        Direction::Asc
                    };
                    (table.resolve(&spec.id)?, direction)
                }
                None => table.default_order()?,
            },
            None => table.default_order()?,
        };

        Ok(Self {
            page,
            page_size,
            search,
            sort,
            direction,
        })
    }

    /// Row offset of the first row on this page
    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.page_size)
    }
}

/// Parse `sortBy`; an empty array means "no sort requested".
pub fn parse_sort_by(raw: &str) -> Result<Option<SortSpec>> {
    let mut specs: Vec<SortSpec> = serde_json::from_str(raw)
        .map_err(|e| Error::InvalidQuery(format!("sortBy is not a valid sort array: {}", e)))?;

    if specs.len() > 1 {
        return Err(Error::InvalidQuery(format!(
            "sortBy accepts a single field, got {}",
            specs.len()
        )));
    }
    Ok(specs.pop())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// `ceil(total / page_size)`, 0 for an empty result
pub fn page_count(total: i64, page_size: u32) -> i64 {
    let size = i64::from(page_size.max(1));
    (total.max(0) + size - 1) / size
}
