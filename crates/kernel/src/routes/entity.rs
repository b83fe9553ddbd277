//! Entity API routes.
//!
//! REST endpoints for listing, reading and creating graph entities.

use axum::{
    Router,
    extract::{OriginalUri, Path, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde_json::Value;

use crate::error::AppResult;
use crate::request::ListParams;
use crate::state::AppState;

/// Create the entity router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/{resource}", get(list_entities).post(create_entity))
        .route("/api/{resource}/{id}", get(get_entity))
}

// -------------------------------------------------------------------------
// Request helpers
// -------------------------------------------------------------------------

/// Decode the raw query string into ordered key/value pairs.
fn query_pairs(raw: Option<&str>) -> Vec<(String, String)> {
    raw.map(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .into_owned()
            .collect()
    })
    .unwrap_or_default()
}

// -------------------------------------------------------------------------
// Handlers
// -------------------------------------------------------------------------

async fn list_entities(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    RawQuery(query): RawQuery,
    OriginalUri(uri): OriginalUri,
) -> AppResult<Response> {
    let target = uri
        .path_and_query()
        .map_or_else(|| uri.path(), |pq| pq.as_str());
    let page = state
        .listing()
        .list(&resource, query_pairs(query.as_deref()), target)
        .await?;

    Ok((page.status, page.headers.to_header_map(), Json(page.items)).into_response())
}

async fn get_entity(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> AppResult<Json<Value>> {
    let options = ListParams::options_only(query_pairs(query.as_deref()));
    let entity = state.listing().get(&resource, &id, &options).await?;
    Ok(Json(entity))
}

async fn create_entity(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Json(body): Json<Value>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let entity = state.listing().create(&resource, &body).await?;
    Ok((StatusCode::CREATED, Json(entity)))
}
