//! Bearer tokens for contestant-facing endpoints. Stateless: a
//! token is `base64url(payload_json).hex(hmac_sha256(secret, payload_json))`
//! so verification never touches the Store. Executor endpoints use HTTP
//! Basic against the `users` table instead (see `auth.rs`); these are two
//! distinct credential kinds for two distinct caller populations.

use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Tokens are valid for this long after issue.
pub const TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Serialize, Deserialize)]
struct Payload {
    user_id: i64,
    exp: i64,
}

fn mac(secret: &str, payload_b64: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload_b64.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

pub fn issue(secret: &str, user_id: i64, now: chrono::DateTime<chrono::Utc>) -> String {
    let payload = Payload {
        user_id,
        exp: now.timestamp() + TOKEN_TTL_SECS,
    };
    let payload_json = serde_json::to_vec(&payload).expect("Payload always serializes");
    let payload_b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(payload_json);
    let tag = mac(secret, &payload_b64);
    format!("{payload_b64}.{tag}")
}

/// Returns the authenticated `user_id`, or `None` if the signature is
/// invalid, the payload is malformed, or the token has expired.
pub fn verify(secret: &str, token: &str, now: chrono::DateTime<chrono::Utc>) -> Option<i64> {
    let (payload_b64, tag) = token.split_once('.')?;
    let expected = mac(secret, payload_b64);
    if !constant_time_eq(expected.as_bytes(), tag.as_bytes()) {
        return None;
    }
    let payload_json = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .ok()?;
    let payload: Payload = serde_json::from_slice(&payload_json).ok()?;
    if payload.exp < now.timestamp() {
        return None;
    }
    Some(payload.user_id)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
