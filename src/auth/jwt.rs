use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Stateless session claims; the HMAC-SHA256 signature is the only thing the
/// server keeps between requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // username
    pub role: String,
    pub exp: i64, // expiration time
}

pub fn create_token(username: &str, role: &str, secret: &str, expiration_hours: i64) -> Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(expiration_hours))
        .ok_or_else(|| anyhow::anyhow!("Token expiry out of range"))?
        .timestamp();

    let claims = Claims {
        sub: username.to_owned(),
        role: role.to_owned(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| anyhow::anyhow!("Failed to create token: {}", e))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => anyhow::anyhow!("Session expired. Please login again."),
        _ => anyhow::anyhow!("Invalid token"),
    })
}
