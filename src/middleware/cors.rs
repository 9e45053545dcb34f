use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};

/// The portal front-end is served from a different origin than this API;
/// reads and the interaction counters are open to any origin.
pub fn portal_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(Any)
}
