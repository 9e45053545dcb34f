use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const ADMIN_ROLES: &[&str] = &["admin", "editor"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: Option<String>,
}

/// Shared secret for the admin router, installed with
/// `from_fn_with_state` so tests can build routers without global config.
#[derive(Clone)]
pub struct AdminAuth {
    secret: Arc<String>,
}

impl AdminAuth {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Arc::new(secret.into()),
        }
    }
}

pub async fn require_admin(State(auth): State<AdminAuth>, mut req: Request, next: Next) -> Response {
    match authorize(&auth, req.headers()) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(err) => err.into_response(),
    }
}

fn authorize(auth: &AdminAuth, headers: &HeaderMap) -> Result<Claims> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| Error::Unauthorized("missing_authorization".to_string()))?;
    let auth_str = auth_header
        .to_str()
        .map_err(|_| Error::Unauthorized("bad_authorization".to_string()))?;
    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| Error::Unauthorized("unsupported_scheme".to_string()))?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.secret.as_bytes()),
        &validation,
    )
    .map_err(|_| Error::Unauthorized("invalid_token".to_string()))?;

    let role = data.claims.role.clone().unwrap_or_default();
    if !ADMIN_ROLES.iter().any(|r| r.eq_ignore_ascii_case(&role)) {
        return Err(Error::Forbidden("forbidden".to_string()));
    }
    tracing::debug!(subject = %data.claims.sub, role = %role, "admin request authorized");
    Ok(data.claims)
}
