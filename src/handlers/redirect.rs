use crate::{error::StoreError, AppState};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// GET /:slug
///
/// The visit counter and last-visit timestamp are updated in the same store
/// operation that resolves the destination, so concurrent hits on one slug
/// never lose increments.
pub async fn redirect(State(state): State<Arc<AppState>>, Path(slug): Path<String>) -> Response {
    match state.store.record_visit(&slug).await {
        Ok(url) => (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, url)]).into_response(),
        Err(StoreError::NotFound) => (StatusCode::NOT_FOUND, "not found").into_response(),
        Err(e) => {
            tracing::error!("redirect lookup failed for '{slug}': {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}
