use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use reservations::Session;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("authorization header is not a bearer token")]
    MalformedHeader,
    #[error("invalid or expired token")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub fn mint_token(cfg: &AuthConfig, username: &str) -> Result<IssuedToken, AuthError> {
    let now = Utc::now();
    let expires_at = now + Duration::minutes(cfg.token_ttl_minutes);
    let claims = Claims {
        sub: username.to_string(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(cfg.jwt_secret.as_bytes()),
    )?;
    Ok(IssuedToken { token, expires_at })
}

/// Checks signature and expiry and turns the claims into a console session.
pub fn verify_token(cfg: &AuthConfig, token: &str) -> Result<Session, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.jwt_secret.as_bytes()),
        &validation,
    )?;
    let expires_at = DateTime::from_timestamp(data.claims.exp, 0).ok_or_else(|| {
        AuthError::InvalidToken(jsonwebtoken::errors::ErrorKind::InvalidToken.into())
    })?;
    Ok(Session::new(data.claims.sub, expires_at))
}

pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;
    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MalformedHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token.trim())
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
