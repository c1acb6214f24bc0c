//! Aggregate statistics over watch events at or after the configured cutoff

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use watchlog_core::StatsResponse;

use crate::error::Result;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(get_stats))
}

/// GET /api/v1/stats
async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let stats = state.stats.compute(state.cutoff).await?;
    Ok(Json(stats))
}
