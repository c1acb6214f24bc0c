//! Paginated, searchable, sortable video listing

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use watchlog_core::{ExplorerPage, ExplorerParams};

use crate::error::Result;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(get_explorer))
}

/// GET /api/v1/explorer?page&pageSize&search&sortBy
async fn get_explorer(
    State(state): State<AppState>,
    params: std::result::Result<Query<ExplorerParams>, QueryRejection>,
) -> Result<Json<ExplorerPage>> {
    let Query(params) = params?;
    let page = state.explorer.query(&params).await?;
    Ok(Json(page))
}
