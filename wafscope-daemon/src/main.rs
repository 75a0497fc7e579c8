use anyhow::Result;
use clap::Parser;

use wafscope_core::config::WafscopeConfig;
use wafscope_daemon::cli::DaemonCli;
use wafscope_daemon::logging;
use wafscope_daemon::orchestrator::Orchestrator;

/// Load configuration with priority: CLI > env > file > defaults.
async fn load_config(cli: &DaemonCli) -> Result<WafscopeConfig> {
    let mut config = match &cli.config {
        Some(path) => WafscopeConfig::from_file(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?,
        None => WafscopeConfig::default(),
    };
    config.apply_env_overrides();

    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();
    let config = load_config(&cli).await?;

    if cli.validate {
        println!("configuration is valid");
        return Ok(());
    }

    logging::init_tracing(&config.general)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "wafscope-daemon starting");

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    orchestrator.run().await?;

    Ok(())
}
