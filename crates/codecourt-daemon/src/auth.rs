//! HTTP Basic Auth, matching the protocol the executor speaks against
//! `get-writ`/`submit-writ`/`return-without-run` and reused for the
//! browser-facing endpoints too, since login identity is `username`
//! either way.

use crate::error::ApiError;
use crate::state::AppState;
use crate::token;
use axum::http::HeaderMap;
use base64::Engine;
use codecourt_schemas::{Role, User};
use sqlx::PgPool;

/// Decode the `Authorization: Basic base64(username:password)` header.
pub fn decode_basic_auth(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Authenticate the caller against `users`. Fails closed: any missing
/// header, malformed encoding, unknown username, or wrong password is
/// `Unauthorized` — the taxonomy never distinguishes which, so a caller
/// can't enumerate valid usernames by timing or message content.
pub async fn authenticate(pool: &PgPool, headers: &HeaderMap) -> Result<User, ApiError> {
    let (username, password) = decode_basic_auth(headers).ok_or(ApiError::Unauthorized)?;

    let user = codecourt_db::fetch_user_by_username(pool, &username)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let ok = codecourt_db::verify_password(&password, &user.hashed_password)?;
    if !ok {
        return Err(ApiError::Unauthorized);
    }

    Ok(user)
}

/// Authenticate, then require the caller to hold `role`.
pub async fn authenticate_with_role(pool: &PgPool, headers: &HeaderMap, role: Role) -> Result<User, ApiError> {
    let user = authenticate(pool, headers).await?;
    if !user.has_role(role) {
        return Err(ApiError::Forbidden(format!("requires the {} role", role.as_str())));
    }
    Ok(user)
}

/// Decode the `Authorization: Bearer <token>` header.
fn decode_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ")
}

/// Authenticate a contestant-facing request via the short-lived bearer
/// token `login` issues. Distinct credential path from `authenticate`:
/// no password check here, the token itself is the proof.
pub async fn authenticate_token(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let raw = decode_bearer(headers).ok_or(ApiError::Unauthorized)?;
    let user_id = token::verify(&state.token_secret, raw, chrono::Utc::now()).ok_or(ApiError::Unauthorized)?;
    codecourt_db::fetch_user(&state.pool, user_id)
        .await?
        .ok_or(ApiError::Unauthorized)
}

pub async fn authenticate_token_with_role(state: &AppState, headers: &HeaderMap, role: Role) -> Result<User, ApiError> {
    let user = authenticate_token(state, headers).await?;
    if !user.has_role(role) {
        return Err(ApiError::Forbidden(format!("requires the {} role", role.as_str())));
    }
    Ok(user)
}
