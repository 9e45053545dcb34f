use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::{models::listing::ListingKind, AppState};

#[axum::debug_handler]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let remote = state.collections.remote();
    let cached: Vec<ListingKind> = ListingKind::ALL
        .into_iter()
        .filter(|kind| !state.collections.get(*kind).is_local() && remote.is_degraded(*kind))
        .collect();
    let body = json!({
        "status": if cached.is_empty() { "ok" } else { "degraded" },
        "servingCache": cached,
    });
    (StatusCode::OK, Json(body))
}
