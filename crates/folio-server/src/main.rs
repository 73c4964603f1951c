#![forbid(unsafe_code)]

use anyhow::Context as _;
use clap::Parser;
use folio_server::ServerConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    folio_server::serve(config)
        .await
        .context("folio-server stopped with an error")
}
