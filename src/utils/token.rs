use chrono::Duration;
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::{distributions::Alphanumeric, thread_rng, Rng};

use crate::middleware::auth::Claims;

const ID_SUFFIX_LEN: usize = 9;

pub fn random_suffix(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

/// `<prefix>_<epoch-ms>_<random>`, e.g. `exam_1736035200000_k3j9x0q2m`.
pub fn generate_listing_id(prefix: &str, now_millis: i64) -> String {
    format!("{}_{}_{}", prefix, now_millis, random_suffix(ID_SUFFIX_LEN))
}

/// Signs an HS256 bearer token accepted by the admin routes.
pub fn issue_token(
    secret: &str,
    subject: &str,
    role: &str,
    ttl: Duration,
) -> jsonwebtoken::errors::Result<String> {
    let exp = (chrono::Utc::now() + ttl).timestamp().max(0) as usize;
    let claims = Claims {
        sub: subject.to_string(),
        exp,
        role: Some(role.to_string()),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}
