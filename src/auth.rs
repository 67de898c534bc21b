use crate::AppState;
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Extractor that gates a handler behind the shared admin secret. The
/// credential comes from the `x-api-key` header or a `?key=` query
/// parameter and must match the configured value exactly; otherwise the
/// handler never runs and the request gets a 401 JSON error.
pub struct AdminKey;

#[async_trait]
impl<S> FromRequestParts<S> for AdminKey
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = Arc::<AppState>::from_ref(state);

        let supplied = header_key(parts).or_else(|| query_key(parts));
        match supplied {
            Some(key) if key == state.config.admin_key => Ok(AdminKey),
            _ => Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "unauthorized" })),
            )
                .into_response()),
        }
    }
}

fn header_key(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

fn query_key(parts: &Parts) -> Option<String> {
    // Percent-decoded, so a key with reserved characters works the same
    // here as in the header.
    let query = parts.uri.query()?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == "key")
        .map(|(_, value)| value.into_owned())
}
