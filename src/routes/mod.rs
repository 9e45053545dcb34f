pub mod admin;
pub mod health;
pub mod listing;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::middleware::{
    auth::{require_admin, AdminAuth},
    cors::portal_cors,
    rate_limit::{rps_middleware, RateLimiter},
};
use crate::AppState;

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Per-surface request budgets and the admin token secret.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub public_rps: u32,
    pub admin_rps: u32,
    pub jwt_secret: String,
}

pub fn app(state: AppState, options: RouterOptions) -> Router {
    let base_routes = Router::new().route("/health", get(health::health));

    let public_api = Router::new()
        .route("/api/public/:kind", get(listing::list_listings))
        .route("/api/public/:kind/facets", get(listing::list_facets))
        .route("/api/public/listings/:id", get(listing::get_listing))
        .route(
            "/api/public/listings/:id/:action",
            post(listing::record_interaction),
        )
        .layer(axum::middleware::from_fn_with_state(
            RateLimiter::new("public", options.public_rps),
            rps_middleware,
        ));

    let admin_api = Router::new()
        .route(
            "/api/admin/:kind",
            get(admin::admin_list).post(admin::create_listing),
        )
        .route("/api/admin/:kind/bulk", post(admin::bulk_create))
        .route("/api/admin/:kind/import", post(admin::import_listings))
        .route("/api/admin/:kind/export", get(admin::export_listings))
        .route("/api/admin/:kind/cleanup", post(admin::cleanup_listings))
        .route("/api/admin/:kind/clear", post(admin::clear_listings))
        .route("/api/admin/:kind/purge", post(admin::purge_listings))
        .route(
            "/api/admin/listings/:id",
            get(admin::get_listing)
                .patch(admin::update_listing)
                .delete(admin::delete_listing),
        )
        .layer(axum::middleware::from_fn_with_state(
            AdminAuth::new(options.jwt_secret),
            require_admin,
        ))
        .layer(axum::middleware::from_fn_with_state(
            RateLimiter::new("admin", options.admin_rps),
            rps_middleware,
        ));

    base_routes
        .merge(public_api)
        .merge(admin_api)
        .with_state(state)
        .layer(portal_cors())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
