//! Relay daemon main entry point
//! 中继守护进程主入口点

use clap::Parser;
use prompt_relay::config::init_tracing;
use prompt_relay::relay::config::{AppConfig, CliArgs, RelayConfig};
use prompt_relay::relay::http_gateway::HttpGateway;
use prompt_relay::relay::providers::{build_adapter, ProviderAdapter};
use prompt_relay::relay::race::RaceDispatcher;

use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = CliArgs::parse();
    let log_args = format!("{:?}", args);

    let app_cfg = AppConfig::load_with_cli(&args)?;
    let relay_cfg = app_cfg.relay;

    init_tracing(&relay_cfg.logging.to_logging_config())?;

    relay_cfg.validate()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(log_args, relay_cfg))
}

async fn run(
    log_args: String,
    relay_cfg: RelayConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Arc::new(relay_cfg);

    tracing::info!("Starting relayd with args: {}", log_args);

    let mut adapters: Vec<Arc<dyn ProviderAdapter>> = Vec::new();
    for provider_cfg in &config.providers {
        adapters.push(build_adapter(provider_cfg)?);
    }

    let dispatcher = Arc::new(RaceDispatcher::new(
        adapters,
        Duration::from_millis(config.request_timeout_ms),
    ));

    tracing::info!("relayd starting with:");
    tracing::info!("  - HTTP gateway on: {}", config.http.server.addr);
    tracing::info!("  - Providers: {}", dispatcher.provider_names().join(", "));
    tracing::info!("  - Per-provider timeout: {}ms", config.request_timeout_ms);

    let gateway = HttpGateway::new(config, dispatcher);
    gateway
        .start_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received, stopping HTTP gateway");
        })
        .await
}
