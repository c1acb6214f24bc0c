//! Catalog-wide attribute breakdowns
//!
//! Not scoped by the cutoff: every video in the catalog is counted, watched
//! or not. All buckets come from a single pass over `videos`.

use crate::error::Result;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct ProductPlacement {
    pub has: i64,
    pub none: i64,
    pub unknown: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct Licensing {
    pub licensed: i64,
    pub unlicensed: i64,
    pub unknown: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct Privacy {
    pub public: i64,
    pub other: i64,
    pub unknown: i64,
}

/// `was_livestream` is never null, so there is no unknown bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct Streaming {
    pub livestream: i64,
    pub regular: i64,
}

/// "Has" means the list column is present and non-empty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MetadataCompleteness {
    pub has_tags: i64,
    pub no_tags: i64,
    pub has_topics: i64,
    pub no_topics: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AttributeStats {
    pub product_placement: ProductPlacement,
    pub licensing: Licensing,
    pub privacy: Privacy,
    pub streaming: Streaming,
    pub metadata: MetadataCompleteness,
}

pub fn compute(conn: &Connection) -> Result<AttributeStats> {
    let stats = conn.query_row(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE has_paid_product_placement = 1),
            COUNT(*) FILTER (WHERE has_paid_product_placement = 0),
            COUNT(*) FILTER (WHERE has_paid_product_placement IS NULL),

            COUNT(*) FILTER (WHERE licensed_content = 1),
            COUNT(*) FILTER (WHERE licensed_content = 0),
            COUNT(*) FILTER (WHERE licensed_content IS NULL),

            COUNT(*) FILTER (WHERE privacy_status = 'public'),
            COUNT(*) FILTER (WHERE privacy_status IS NOT NULL AND privacy_status != 'public'),
            COUNT(*) FILTER (WHERE privacy_status IS NULL),

            COUNT(*) FILTER (WHERE was_livestream = 1),
            COUNT(*) FILTER (WHERE was_livestream = 0),

            COUNT(*) FILTER (WHERE tags IS NOT NULL AND tags != '[]'),
            COUNT(*) FILTER (WHERE tags IS NULL OR tags = '[]'),
            COUNT(*) FILTER (WHERE topic_categories IS NOT NULL AND topic_categories != '[]'),
            COUNT(*) FILTER (WHERE topic_categories IS NULL OR topic_categories = '[]')
        FROM videos
        "#,
        [],
        |row| {
            Ok(AttributeStats {
                product_placement: ProductPlacement {
                    has: row.get(0)?,
                    none: row.get(1)?,
                    unknown: row.get(2)?,
                },
                licensing: Licensing {
                    licensed: row.get(3)?,
                    unlicensed: row.get(4)?,
                    unknown: row.get(5)?,
                },
                privacy: Privacy {
                    public: row.get(6)?,
                    other: row.get(7)?,
                    unknown: row.get(8)?,
                },
                streaming: Streaming {
                    livestream: row.get(9)?,
                    regular: row.get(10)?,
                },
                metadata: MetadataCompleteness {
                    has_tags: row.get(11)?,
                    no_tags: row.get(12)?,
                    has_topics: row.get(13)?,
                    no_topics: row.get(14)?,
                },
            })
        },
    )?;

    Ok(stats)
}
