pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod keepalive;
pub mod models;
pub mod store;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use store::LinkStore;
use tower_http::trace::TraceLayer;

// ── Shared application state ───────────────────────────────────────────────

pub struct AppState {
    pub store: Arc<dyn LinkStore>,
    pub config: config::AppConfig,
}

/// Build the router. Split out of `main` so integration tests can drive the
/// full HTTP surface without binding a socket.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/create", post(handlers::api::create))
        .route("/api/bulk", post(handlers::api::bulk))
        .route("/api/list", get(handlers::api::list))
        .route("/api/delete/:slug", delete(handlers::api::delete))
        .route("/api/delete-by-url", delete(handlers::api::delete_by_url))
        .route("/api/health", get(handlers::api::health))
        // Short-link redirect — must come LAST so /api/* takes priority
        .route("/:slug", get(handlers::redirect::redirect))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
