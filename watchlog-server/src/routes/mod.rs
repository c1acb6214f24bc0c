//! API routes

pub mod analytics;
pub mod explorer;
pub mod ops;
pub mod stats;

use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Build the complete API router
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        // Health (no state)
        .merge(ops::routes())
        .nest("/api/v1/stats", stats::routes())
        .nest("/api/v1/explorer", explorer::routes())
        .nest("/api/v1/analytics", analytics::routes())
        .layer(cors)
        .with_state(state)
}
