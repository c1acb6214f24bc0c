//! # watchlog-server
//!
//! Read-only HTTP API over a watchlog database.
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /api/v1/stats` | `{basicStats, channelStats, timeStats, categoryStats, attributeStats}` |
//! | `GET /api/v1/explorer` | `{data, meta}` |
//! | `GET /api/v1/analytics/word-maps` | `{tags, topics}` |
//! | `GET /api/v1/analytics/content-insights` | `{durationVsViews, publishingTimes, tagPerformance}` |
//! | `GET /health` | `{status, version}` |

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;

use axum::http::{HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// CORS layer allowing GET from the configured origins.
pub fn cors_layer(origins: &[String]) -> watchlog_core::Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|_| {
                watchlog_core::Error::Config(format!("invalid CORS origin: {}", origin))
            })
        })
        .collect::<watchlog_core::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::OPTIONS]))
}
