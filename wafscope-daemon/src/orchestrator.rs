//! Module orchestration -- assembly, wiring, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `wafscope-daemon`.
//! It validates configuration, creates the shared event store, builds
//! enabled modules, manages startup/shutdown ordering, and runs the
//! main loop until a shutdown signal arrives.
//!
//! # Startup Order
//!
//! 1. Live Feed (subscriber hub is ready before events are produced)
//! 2. Log Pipeline (produces events, notifies the hub)
//!
//! # Shutdown Order (reverse)
//!
//! 1. Log Pipeline (stop producing events)
//! 2. Live Feed (close subscriber queues, stop listener)

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use wafscope_core::config::WafscopeConfig;
use wafscope_core::metrics as m;
use wafscope_core::pipeline::{EventNotifier, NoopNotifier};
use wafscope_live_feed::HubHandle;
use wafscope_log_pipeline::EventStore;

use crate::health::{self, DaemonHealth, aggregate_status};
use crate::metrics_server;
use crate::modules::{self, ModuleRegistry};

/// Interval between periodic health reports.
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Interval between uptime metric updates.
const UPTIME_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: WafscopeConfig,
    /// Registry of all modules (ordered for start/stop).
    modules: ModuleRegistry,
    /// Event store shared by ingestion and the live feed.
    store: Arc<EventStore>,
    /// Hub handle when the live feed is enabled.
    hub: Option<HubHandle>,
    /// Root cancellation token (cancels every background task).
    cancel: CancellationToken,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be read, parsed or
    /// validated, or if any enabled module fails to initialize.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = WafscopeConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: WafscopeConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        // Install metrics recorder before module initialization
        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let cancel = CancellationToken::new();
        let store = Arc::new(EventStore::new(config.ingest.store_capacity));
        let mut registry = ModuleRegistry::new();

        let hub = match modules::live_feed::init(&config, Arc::clone(&store), cancel.clone())? {
            Some((handle, hub)) => {
                registry.register(handle);
                Some(hub)
            }
            None => None,
        };

        let notifier: Arc<dyn EventNotifier> = match &hub {
            Some(hub) => Arc::new(hub.clone()),
            None => Arc::new(NoopNotifier),
        };

        if let Some(handle) =
            modules::log_pipeline::init(&config, Arc::clone(&store), notifier, cancel.clone())?
        {
            registry.register(handle);
        }

        tracing::info!(
            modules = ?registry.names(),
            store_capacity = store.capacity(),
            "orchestrator initialized"
        );

        if config.metrics.enabled {
            record_daemon_metrics();
        }

        Ok(Self {
            config,
            modules: registry,
            store,
            hub,
            cancel,
            start_time: Instant::now(),
        })
    }

    /// Start all enabled modules and run until SIGTERM or SIGINT.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(async {
            match wait_for_shutdown_signal().await {
                Ok(signal) => tracing::info!(signal, "shutdown signal received"),
                Err(e) => tracing::error!(error = %e, "signal handling failed, shutting down"),
            }
        })
        .await
    }

    /// Start all enabled modules and run until `shutdown` completes.
    ///
    /// Health is logged every 30 seconds while running. On return every
    /// background task has been cancelled and every module stopped.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        tracing::info!("starting all modules");
        if let Err(e) = self.modules.start_all().await {
            tracing::warn!("startup failed, rolling back already-started modules");
            if let Err(stop_err) = self.modules.stop_all().await {
                tracing::error!(
                    startup_error = %e,
                    rollback_error = %stop_err,
                    "rollback also failed during startup failure cleanup"
                );
            }
            self.cancel.cancel();
            return Err(e);
        }

        let uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, self.cancel.clone()));

        tracing::info!("wafscope-daemon running");

        let mut health_ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + HEALTH_CHECK_INTERVAL,
            HEALTH_CHECK_INTERVAL,
        );
        health_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = health_ticker.tick() => {
                    let report = self.health().await;
                    health::log_health(&report);
                }
            }
        }

        let result = self.shutdown().await;

        // Cancels sessions and anything a module left behind
        self.cancel.cancel();
        if let Some(task) = uptime_task {
            let _ = task.await;
        }

        result
    }

    /// Perform graceful shutdown of all modules (reverse registration order).
    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("stopping all modules");
        self.modules.stop_all().await?;
        tracing::info!(events = self.store.len(), "wafscope-daemon shut down");
        Ok(())
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let modules = self.modules.health_statuses().await;
        let status = aggregate_status(&modules);
        DaemonHealth {
            status,
            uptime_secs: self.start_time.elapsed().as_secs(),
            modules,
        }
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &WafscopeConfig {
        &self.config
    }

    /// Shared event store.
    pub fn store(&self) -> Arc<EventStore> {
        Arc::clone(&self.store)
    }

    /// Live feed hub handle, if the live feed is enabled.
    pub fn hub(&self) -> Option<HubHandle> {
        self.hub.clone()
    }

    /// Module registry (for inspection).
    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for a shutdown signal (Ctrl+C).
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to install Ctrl+C handler: {}", e))?;
    Ok("CTRL_C")
}

/// Record daemon-level metrics (build info).
fn record_daemon_metrics() {
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "daemon metrics recorded");
}

/// Spawn a background task that periodically updates the uptime metric.
fn spawn_uptime_updater(start_time: Instant, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPTIME_UPDATE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let uptime_secs = start_time.elapsed().as_secs();
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
                }
                () = cancel.cancelled() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_uptime_updater_stops_on_cancel() {
        // Given: A running uptime updater
        let cancel = CancellationToken::new();
        let task = spawn_uptime_updater(Instant::now(), cancel.clone());

        // When: Cancelling the root token
        cancel.cancel();

        // Then: Task should complete quickly
        let result = tokio::time::timeout(Duration::from_millis(500), task).await;
        assert!(result.is_ok(), "uptime updater should shut down within timeout");
    }
}
