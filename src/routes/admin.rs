use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};

use crate::{
    dto::{
        admin_dto::{AdminListResponse, AffectedResponse, ConfirmQuery, DeletedResponse, ImportQuery},
        listing_dto::{ListingInput, ListingResponse, UpdateListingPayload},
    },
    error::Result,
    routes::listing::{parse_kind, request_token},
    services::import_service::ImportMode,
    utils::time,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/admin/{kind}",
    params(
        ("kind" = String, Path, description = "jobs, drives or exams")
    ),
    responses(
        (status = 200, description = "Cleanup summary and active listings", body = AdminListResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
#[axum::debug_handler]
pub async fn admin_list(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    let (cancel, _guard) = request_token();
    let (cleanup, listings) = state
        .collections
        .get(kind)
        .admin_overview(kind, &cancel)
        .await?;
    let now = time::now();
    let listings: Vec<ListingResponse> = listings
        .into_iter()
        .map(|l| ListingResponse::new(l, now, state.settings.new_badge_window))
        .collect();
    Ok(Json(AdminListResponse {
        cleanup,
        total: listings.len(),
        listings,
    }))
}

#[utoipa::path(
    post,
    path = "/api/admin/{kind}",
    params(
        ("kind" = String, Path, description = "jobs, drives or exams")
    ),
    request_body = ListingInput,
    responses(
        (status = 201, description = "Listing created", body = ListingResponse),
        (status = 400, description = "Missing or invalid fields")
    )
)]
#[axum::debug_handler]
pub async fn create_listing(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(payload): Json<ListingInput>,
) -> Result<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    let (cancel, _guard) = request_token();
    let listing = state
        .collections
        .get(kind)
        .create(kind, payload, &cancel)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ListingResponse::new(
            listing,
            time::now(),
            state.settings.new_badge_window,
        )),
    ))
}

#[utoipa::path(
    post,
    path = "/api/admin/{kind}/bulk",
    params(
        ("kind" = String, Path, description = "jobs, drives or exams")
    ),
    request_body = String,
    responses(
        (status = 200, description = "Per-record outcome of the bulk add"),
        (status = 400, description = "Body is not valid JSON")
    )
)]
#[axum::debug_handler]
pub async fn bulk_create(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    body: String,
) -> Result<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    let (cancel, _guard) = request_token();
    let report = state
        .collections
        .get(kind)
        .bulk_create(kind, &body, &cancel)
        .await?;
    Ok(Json(report))
}

#[utoipa::path(
    post,
    path = "/api/admin/{kind}/import",
    params(
        ("kind" = String, Path, description = "jobs, drives or exams"),
        ("mode" = Option<String>, Query, description = "merge (default) or replace"),
        ("confirm" = Option<bool>, Query, description = "Required for replace")
    ),
    request_body = String,
    responses(
        (status = 200, description = "Import summary"),
        (status = 400, description = "Invalid import file"),
        (status = 428, description = "Replace without confirm=true")
    )
)]
#[axum::debug_handler]
pub async fn import_listings(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<ImportQuery>,
    body: String,
) -> Result<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    if query.mode == ImportMode::Replace {
        query.confirmation().require("Replacing the collection")?;
    }
    let (cancel, _guard) = request_token();
    let report = state
        .collections
        .get(kind)
        .import(kind, &body, query.mode, &cancel)
        .await?;
    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/api/admin/{kind}/export",
    params(
        ("kind" = String, Path, description = "jobs, drives or exams")
    ),
    responses(
        (status = 200, description = "Every record of the kind as an import file")
    )
)]
#[axum::debug_handler]
pub async fn export_listings(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    let (cancel, _guard) = request_token();
    let document = state.collections.get(kind).export(kind, &cancel).await?;
    let disposition = format!(
        "attachment; filename=\"{}_{}.json\"",
        kind,
        time::now().format("%Y-%m-%d")
    );
    Ok(([(header::CONTENT_DISPOSITION, disposition)], Json(document)))
}

#[utoipa::path(
    post,
    path = "/api/admin/{kind}/cleanup",
    params(
        ("kind" = String, Path, description = "jobs, drives or exams"),
        ("confirm" = bool, Query, description = "Must be true")
    ),
    responses(
        (status = 200, description = "Cleanup summary"),
        (status = 428, description = "Missing confirm=true")
    )
)]
#[axum::debug_handler]
pub async fn cleanup_listings(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(confirm): Query<ConfirmQuery>,
) -> Result<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    confirm.require("Cleaning old listings")?;
    let (cancel, _guard) = request_token();
    let summary = state.collections.get(kind).cleanup(kind, &cancel).await?;
    Ok(Json(summary))
}

#[utoipa::path(
    post,
    path = "/api/admin/{kind}/clear",
    params(
        ("kind" = String, Path, description = "jobs, drives or exams"),
        ("confirm" = bool, Query, description = "Must be true")
    ),
    responses(
        (status = 200, description = "Number of listings cleared", body = AffectedResponse),
        (status = 428, description = "Missing confirm=true")
    )
)]
#[axum::debug_handler]
pub async fn clear_listings(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(confirm): Query<ConfirmQuery>,
) -> Result<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    confirm.require("Clearing all listings")?;
    let (cancel, _guard) = request_token();
    let affected = state.collections.get(kind).clear(kind, &cancel).await?;
    Ok(Json(AffectedResponse {
        kind: kind.to_string(),
        affected,
    }))
}

#[utoipa::path(
    post,
    path = "/api/admin/{kind}/purge",
    params(
        ("kind" = String, Path, description = "jobs, drives or exams"),
        ("confirm" = bool, Query, description = "Must be true")
    ),
    responses(
        (status = 200, description = "Number of inactive listings removed", body = AffectedResponse),
        (status = 428, description = "Missing confirm=true")
    )
)]
#[axum::debug_handler]
pub async fn purge_listings(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(confirm): Query<ConfirmQuery>,
) -> Result<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    confirm.require("Purging inactive listings")?;
    let (cancel, _guard) = request_token();
    let affected = state
        .collections
        .get(kind)
        .purge_inactive(kind, &cancel)
        .await?;
    Ok(Json(AffectedResponse {
        kind: kind.to_string(),
        affected,
    }))
}

#[utoipa::path(
    get,
    path = "/api/admin/listings/{id}",
    params(
        ("id" = String, Path, description = "Listing ID")
    ),
    responses(
        (status = 200, description = "Listing found, inactive included", body = ListingResponse),
        (status = 404, description = "Listing not found")
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
        .get_for_edit(&id, &cancel)
        .await?;
    Ok(Json(ListingResponse::new(
        listing,
        time::now(),
        state.settings.new_badge_window,
    )))
}

#[utoipa::path(
    patch,
    path = "/api/admin/listings/{id}",
    params(
        ("id" = String, Path, description = "Listing ID")
    ),
    request_body = UpdateListingPayload,
    responses(
        (status = 200, description = "Listing updated", body = ListingResponse),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Listing not found")
    )
)]
#[axum::debug_handler]
pub async fn update_listing(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateListingPayload>,
) -> Result<impl IntoResponse> {
    let (cancel, _guard) = request_token();
    let listing = state
        .collections
        .for_id(&id)?
        .update(&id, payload, &cancel)
        .await?;
    Ok(Json(ListingResponse::new(
        listing,
        time::now(),
        state.settings.new_badge_window,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/admin/listings/{id}",
    params(
        ("id" = String, Path, description = "Listing ID"),
        ("confirm" = bool, Query, description = "Must be true")
    ),
    responses(
        (status = 200, description = "Listing deleted", body = DeletedResponse),
        (status = 404, description = "Listing not found"),
        (status = 428, description = "Missing confirm=true")
    )
)]
#[axum::debug_handler]
pub async fn delete_listing(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(confirm): Query<ConfirmQuery>,
) -> Result<impl IntoResponse> {
    confirm.require("Deleting a listing")?;
    let (cancel, _guard) = request_token();
    let soft = state.collections.for_id(&id)?.delete(&id, &cancel).await?;
    Ok(Json(DeletedResponse { id, soft }))
}
