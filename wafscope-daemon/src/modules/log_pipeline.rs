//! Log pipeline module initialization.
//!
//! Converts `WafscopeConfig.ingest` into a `PipelineConfig`, builds the
//! `LogPipeline` over the shared event store, and wraps it in a `ModuleHandle`.
//!
//! # Wiring
//!
//! ```text
//! LogSource --> LogPipeline --> EventStore (shared)
//!                    |
//!                    +--EventNotifier--> HubHandle (live-feed) or NoopNotifier
//! ```

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use wafscope_core::config::WafscopeConfig;
use wafscope_core::pipeline::EventNotifier;
use wafscope_log_pipeline::{EventStore, LogPipelineBuilder, PipelineConfig};

use super::ModuleHandle;

/// Module name used in logs and health reports.
pub const MODULE_NAME: &str = "log-pipeline";

/// Initialize the log pipeline module.
///
/// # Returns
///
/// * `Ok(Some(ModuleHandle))` - Pipeline initialized and ready to start
/// * `Ok(None)` - Module disabled in configuration
/// * `Err(_)` - Initialization failed
pub fn init(
    config: &WafscopeConfig,
    store: Arc<EventStore>,
    notifier: Arc<dyn EventNotifier>,
    cancel: CancellationToken,
) -> Result<Option<ModuleHandle>> {
    if !config.ingest.enabled {
        tracing::info!("log pipeline disabled in configuration");
        return Ok(None);
    }

    tracing::info!(source = %config.ingest.source, "initializing log pipeline");

    let pipeline_config = PipelineConfig::from_core(&config.ingest)
        .map_err(|e| anyhow::anyhow!("invalid log pipeline config: {}", e))?;

    let pipeline = LogPipelineBuilder::new()
        .config(pipeline_config)
        .store(store)
        .notifier(notifier)
        .cancel_token(cancel)
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build log pipeline: {}", e))?;

    Ok(Some(ModuleHandle::new(MODULE_NAME, true, Box::new(pipeline))))
}
