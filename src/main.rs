pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod telemetry;

use clap::Parser;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    telemetry::init(config.log_filter())?;

    tracing::info!("Starting formauth...");

    api::server::start_server(&config).await
}
