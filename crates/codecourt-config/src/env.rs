//! Environment-level bootstrap config: the store DSN and the
//! dev-seeding toggle, neither of which lives in the `configuration` table
//! because both are needed before a Store connection exists.

use anyhow::{Context, Result};

pub const ENV_DB_URI: &str = "CODE_COURT_DB_URI";
pub const ENV_PRODUCTION: &str = "CODE_COURT_PRODUCTION";
pub const ENV_TOKEN_SECRET: &str = "CODE_COURT_TOKEN_SECRET";
pub const ENV_INSECURE_HOST_EXEC: &str = "CODE_COURT_INSECURE_HOST_EXEC";

pub fn db_uri() -> Result<String> {
    std::env::var(ENV_DB_URI).with_context(|| format!("{ENV_DB_URI} is not set"))
}

/// HMAC key signing bearer tokens. Falls back to a fixed dev value
/// so local runs don't need to set it, but that fallback is never suitable
/// for production — callers should log loudly when `is_production()` is
/// true and this env var is unset.
pub fn token_secret() -> String {
    std::env::var(ENV_TOKEN_SECRET).unwrap_or_else(|_| "insecure-dev-secret-do-not-use-in-prod".to_string())
}

/// Dev seed data (sample contest/problems/users) is loaded unless
/// `CODE_COURT_PRODUCTION` is set to a truthy value.
pub fn is_production() -> bool {
    matches!(
        std::env::var(ENV_PRODUCTION).as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE")
    )
}

/// Runs writs as a plain host subprocess instead of inside a Docker
/// container. Off unless explicitly set — only for tests run where a
/// Docker daemon isn't reachable.
pub fn insecure_host_exec() -> bool {
    matches!(
        std::env::var(ENV_INSECURE_HOST_EXEC).as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE")
    )
}
