#![forbid(unsafe_code)]

//! Rate-limited API endpoint for the folio site.
//!
//! Two routes, `GET /api/message` and `GET /api/reset`, behind a per-IP
//! fixed-window limiter (reset is exempt) and an origin allow-list.

pub mod config;
pub mod cors;
pub mod error;
pub mod rate_limit;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub use config::ServerConfig;
pub use cors::CorsLayer;
pub use error::ServerError;
pub use rate_limit::{FixedWindowLimiter, RateLimitLayer};

/// The full application: routes, rate limiting, CORS outermost.
pub fn app(config: &ServerConfig) -> Router {
    let limiter = Arc::new(FixedWindowLimiter::new(
        config.rate_limit_max,
        config.window(),
    ));
    routes::router()
        .layer(RateLimitLayer::new(limiter))
        .layer(CorsLayer::new(config.allowed_origins()))
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    config.validate()?;
    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(
        %addr,
        max = config.rate_limit_max,
        window_secs = config.rate_limit_window_secs,
        origins = config.allowed_origins().len(),
        "folio API listening"
    );
    axum::serve(
        listener,
        app(&config).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "cannot listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
