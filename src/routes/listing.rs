use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
};
use serde_json::json;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::{
    dto::listing_dto::{ListingListQuery, ListingListResponse, ListingResponse},
    error::{Error, Result},
    models::listing::{Counter, ListingKind},
    utils::time,
    AppState,
};

pub(crate) fn parse_kind(raw: &str) -> Result<ListingKind> {
    raw.parse::<ListingKind>().map_err(Error::BadRequest)
}

/// Token cancelled when the handler future is dropped, so store calls
/// stop once the client has gone away.
pub(crate) fn request_token() -> (CancellationToken, DropGuard) {
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    (token, guard)
}

#[utoipa::path(
    get,
    path = "/api/public/{kind}",
    params(
        ("kind" = String, Path, description = "jobs, drives or exams"),
        ("page" = Option<usize>, Query, description = "Page number, 1-based"),
        ("perPage" = Option<usize>, Query, description = "Items per page"),
        ("organization" = Option<String>, Query, description = "Exact organization"),
        ("category" = Option<String>, Query, description = "Exam level, drive type or job type"),
        ("location" = Option<String>, Query, description = "Exact location"),
        ("search" = Option<String>, Query, description = "Case-insensitive text search"),
        ("status" = Option<String>, Query, description = "open, upcoming, closed or all"),
        ("featured" = Option<bool>, Query, description = "Only featured listings"),
        ("isNew" = Option<bool>, Query, description = "Only listings marked new"),
        ("retry" = Option<bool>, Query, description = "Retry the remote store after a cached response")
    ),
    responses(
        (status = 200, description = "Filtered page of listings", body = ListingListResponse),
        (status = 400, description = "Unknown kind or invalid query"),
        (status = 503, description = "Store unreachable and nothing cached")
    )
)]
#[axum::debug_handler]
pub async fn list_listings(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<ListingListQuery>,
) -> Result<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    let (cancel, _guard) = request_token();
    let request = query.into_request();
    let page = state
        .collections
        .get(kind)
        .list(kind, &request, &cancel)
        .await?;
    Ok(Json(ListingListResponse::from_page(
        page,
        time::now(),
        state.settings.new_badge_window,
    )))
}

#[utoipa::path(
    get,
    path = "/api/public/{kind}/facets",
    params(
        ("kind" = String, Path, description = "jobs, drives or exams")
    ),
    responses(
        (status = 200, description = "Distinct organizations, categories and locations"),
        (status = 400, description = "Unknown kind")
    )
)]
#[axum::debug_handler]
pub async fn list_facets(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    let (cancel, _guard) = request_token();
    let facets = state.collections.get(kind).facets(kind, &cancel).await?;
    Ok(Json(facets))
}

#[utoipa::path(
    get,
    path = "/api/public/listings/{id}",
    params(
        ("id" = String, Path, description = "Listing ID")
    ),
    responses(
        (status = 200, description = "Listing found", body = ListingResponse),
        (status = 404, description = "Listing not found or inactive")
    )
)]
#[axum::debug_handler]
pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let (cancel, _guard) = request_token();
    let listing = state
        .collections
        .for_id(&id)?
        .get_for_view(&id, &cancel)
        .await?;
    Ok(Json(ListingResponse::new(
        listing,
        time::now(),
        state.settings.new_badge_window,
    )))
}

#[utoipa::path(
    post,
    path = "/api/public/listings/{id}/{action}",
    params(
        ("id" = String, Path, description = "Listing ID"),
        ("action" = String, Path, description = "share, apply or save")
    ),
    responses(
        (status = 200, description = "Updated counters"),
        (status = 400, description = "Unknown action"),
        (status = 404, description = "Listing not found or inactive")
    )
)]
#[axum::debug_handler]
pub async fn record_interaction(
    State(state): State<AppState>,
    Path((id, action)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    let counter = Counter::from_action(&action)
        .ok_or_else(|| Error::BadRequest(format!("unknown action '{}'", action)))?;
    let (cancel, _guard) = request_token();
    let counters = state
        .collections
        .for_id(&id)?
        .record_interaction(&id, counter, &cancel)
        .await?;
    Ok(Json(json!({ "id": id, "counters": counters })))
}
