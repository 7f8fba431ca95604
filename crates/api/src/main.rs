//! Baby Monitor - Main Entry Point
//!
//! Usage: `baby-monitor [CONFIG_FILE]`

use anyhow::Context;
use api::{init_logging, run, settings};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1);
    let config = settings::load(config_path.as_deref()).context("loading configuration")?;

    init_logging(&config.logging).map_err(|e| anyhow::anyhow!(e))?;

    info!("=== Baby Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        debounce_threshold_ms = config.engine.debounce_threshold_ms,
        mqtt = config.mqtt.is_some(),
        "configuration loaded"
    );

    run(config).await
}
