//! Route table.

use crate::handlers;
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .route("/ping", get(handlers::ping))
        .route(
            "/f/{rel_path}",
            get(handlers::download).delete(handlers::delete),
        )
        .route("/upload", post(handlers::upload))
        .route("/ft", post(handlers::file_type))
        .route("/stats", get(handlers::stats))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
