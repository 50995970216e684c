//! Axum router construction for the simulation API.

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router.
///
/// The router includes:
/// - `POST /start` -- start a session
/// - `POST /step` -- advance the session
/// - `GET /status` -- session summary
///
/// When `static_dir` is set, every other path is served from it (so the
/// browser client's `index.html` lands on `/`). Otherwise `GET /` is the
/// built-in status page.
pub fn build_router(state: Arc<AppState>, static_dir: Option<&Path>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/start", post(handlers::start))
        .route("/step", post(handlers::step))
        .route("/status", get(handlers::status));

    let router = match static_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api.route("/", get(handlers::index)),
    };

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
