//! Shared runtime state for codecourt-daemon. Handlers receive
//! `State<Arc<AppState>>`; this module owns nothing async itself beyond
//! the connection pool.

use sqlx::PgPool;
use std::time::Instant;

#[derive(Clone)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub build: BuildInfo,
    pub token_secret: String,
    started_at: Instant,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            build: BuildInfo {
                service: "codecourt-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            token_secret: codecourt_config::env::token_secret(),
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
