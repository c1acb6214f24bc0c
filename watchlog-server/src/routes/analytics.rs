//! Catalog insights: tag/topic frequencies and top-video patterns

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use watchlog_core::insights::{ContentInsights, WordMaps};

use crate::error::Result;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/word-maps", get(get_word_maps))
        .route("/content-insights", get(get_content_insights))
}

/// GET /api/v1/analytics/word-maps
async fn get_word_maps(State(state): State<AppState>) -> Result<Json<WordMaps>> {
    Ok(Json(state.insights.word_maps().await?))
}

/// GET /api/v1/analytics/content-insights
async fn get_content_insights(State(state): State<AppState>) -> Result<Json<ContentInsights>> {
    Ok(Json(state.insights.content_insights().await?))
}
