use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::server::AppState;

/// Build the axum router with all notewire endpoints.
pub fn build_router(state: AppState) -> Router {
    let static_dir = state.config.static_dir.clone();
    // Form encoding can inflate content roughly threefold; the handler still
    // enforces the exact cap on the decoded content.
    let body_limit = state.config.max_note_size as usize * 3 + 1024;

    Router::new()
        .route("/", get(handler::root))
        .route("/save/:path", post(handler::save_note))
        .route("/ws/:path", get(handler::live_updates))
        .nest_service("/static", ServeDir::new(static_dir))
        .route("/:path", get(handler::note_view))
        .route("/:path/:version", get(handler::note_version))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
