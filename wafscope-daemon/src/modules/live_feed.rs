//! Live feed module initialization.
//!
//! Converts `WafscopeConfig.hub` into a `LiveFeedConfig`, builds the
//! `LiveFeed` over the shared event store, and wraps it in a `ModuleHandle`.
//! The returned `HubHandle` is handed to the log pipeline as its notifier.

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use wafscope_core::config::WafscopeConfig;
use wafscope_live_feed::{HubHandle, LiveFeed, LiveFeedConfig};
use wafscope_log_pipeline::EventStore;

use super::ModuleHandle;

/// Module name used in logs and health reports.
pub const MODULE_NAME: &str = "live-feed";

/// Initialize the live feed module.
///
/// # Returns
///
/// * `Ok(Some((handle, hub)))` - Feed built and ready to start
/// * `Ok(None)` - Module disabled in configuration
/// * `Err(_)` - Invalid hub configuration
pub fn init(
    config: &WafscopeConfig,
    store: Arc<EventStore>,
    cancel: CancellationToken,
) -> Result<Option<(ModuleHandle, HubHandle)>> {
    if !config.hub.enabled {
        tracing::info!("live feed disabled in configuration");
        return Ok(None);
    }

    tracing::info!(bind_addr = %config.hub.bind_addr, "initializing live feed");

    let feed_config = LiveFeedConfig::from_core(&config.hub)
        .map_err(|e| anyhow::anyhow!("invalid live feed config: {}", e))?;

    let feed = LiveFeed::new(feed_config, store, cancel);
    let hub = feed.handle();

    Ok(Some((ModuleHandle::new(MODULE_NAME, true, Box::new(feed)), hub)))
}
