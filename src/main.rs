// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Parser;
use flow_exchange_node::{
    api::start_server,
    config::{FlowNodeConfig, ServeArgs},
    crypto::KeyUnwrapper,
    FlowExchange,
};
use std::{env, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    tracing::info!("🚀 Starting Flow Exchange Node...");

    let args = ServeArgs::parse();
    let config = FlowNodeConfig::from_env()?;

    // Key material is loaded exactly once; a bad key is fatal here, never
    // during a request
    let unwrapper = Arc::new(KeyUnwrapper::load_from_env()?);

    tracing::info!(
        "media pipeline: {} concurrent item(s), {}s download timeout",
        config.media.max_concurrent_items,
        config.media.download_timeout_secs
    );

    let exchange = Arc::new(FlowExchange::with_logging_sinks(&config, unwrapper));

    start_server(exchange, &args.bind, args.port)
        .await
        .map_err(|e| anyhow::anyhow!("server error: {}", e))?;

    Ok(())
}
