use crate::{
    auth::AdminKey,
    error::ApiError,
    models::{
        BulkLink, BulkRequest, BulkResponse, CreateRequest, CreateResponse, DeleteByUrlRequest,
        ListLink, ListParams, ListResponse,
    },
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// POST /api/create
pub async fn create(
    _auth: AdminKey,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRequest>,
) -> Result<Json<CreateResponse>, ApiError> {
    let code = req.code.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let url = req.url.as_deref().unwrap_or("");

    let link = state.store.create(code, url).await?;
    tracing::info!(slug = %link.slug, "link created");

    Ok(Json(CreateResponse {
        short: state.config.short_link(&link.slug),
        slug: link.slug,
        url: link.url,
    }))
}

/// POST /api/bulk
pub async fn bulk(
    _auth: AdminKey,
    State(state): State<Arc<AppState>>,
    Json(req): Json<BulkRequest>,
) -> Result<Json<BulkResponse>, ApiError> {
    let url = req.url.as_deref().unwrap_or("");
    let slugs = state
        .store
        .bulk_create(url, req.count, req.prefix.as_deref())
        .await?;
    tracing::info!(requested = req.count, created = slugs.len(), "bulk links created");

    let links: Vec<BulkLink> = slugs
        .into_iter()
        .map(|slug| BulkLink {
            short: state.config.short_link(&slug),
            slug,
        })
        .collect();

    Ok(Json(BulkResponse {
        total: links.len(),
        url: url.to_owned(),
        links,
    }))
}

/// GET /api/list
pub async fn list(
    _auth: AdminKey,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, ApiError> {
    let page = state.store.list(params.page(), params.limit()).await?;

    Ok(Json(ListResponse {
        total: page.total,
        page: page.page,
        pages: page.pages,
        links: page
            .links
            .into_iter()
            .map(|link| ListLink {
                short: state.config.short_link(&link.slug),
                slug: link.slug,
                url: link.url,
                visits: link.visits,
                created: link.created_at,
            })
            .collect(),
    }))
}

/// DELETE /api/delete/:slug
pub async fn delete(
    _auth: AdminKey,
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.store.delete_by_slug(&slug).await?;
    tracing::info!(%slug, "link deleted");
    Ok(Json(json!({ "ok": true })))
}

/// DELETE /api/delete-by-url
pub async fn delete_by_url(
    _auth: AdminKey,
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteByUrlRequest>,
) -> Result<Json<Value>, ApiError> {
    let url = req.url.as_deref().unwrap_or("");
    let deleted = state.store.delete_by_url(url).await?;
    tracing::info!(%url, deleted, "links deleted by url");
    Ok(Json(json!({ "ok": true, "deleted": deleted })))
}

/// GET /api/health — no auth so platform probes can reach it.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let db = match state.store.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!("health probe failed: {e}");
            "disconnected"
        }
    };

    Json(json!({
        "status": "ok",
        "db": db,
        "time": chrono::Utc::now(),
    }))
}
