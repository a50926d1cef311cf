//! codecourt-daemon entry point.
//!
//! Thin by design: load env, init tracing, connect the Store, build the
//! router, attach middleware, serve. All handlers live in `routes.rs`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::Method;
use codecourt_daemon::{routes, state::AppState};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let pool = codecourt_db::connect_from_env().await?;
    codecourt_db::migrate(&pool).await?;

    let shared = Arc::new(AppState::new(pool));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 9191)));
    info!("codecourt-daemon listening on http://{addr}");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("CODE_COURT_DAEMON_ADDR").ok()?.parse().ok()
}

/// Permissive CORS: the defendant front-end and executor workers are
/// separate deployables from this daemon and neither is known ahead of
/// time, unlike the localhost-only dev tooling this pattern is borrowed
/// from.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
