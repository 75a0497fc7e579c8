//! Module registry and module init tests.
//!
//! Uses a recording mock pipeline to verify start/stop ordering, error
//! collection, and disabled-module handling.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use wafscope_core::config::WafscopeConfig;
use wafscope_core::error::{PipelineError, WafscopeError};
use wafscope_core::pipeline::{HealthStatus, NoopNotifier, Pipeline};
use wafscope_daemon::modules::{ModuleHandle, ModuleRegistry, live_feed, log_pipeline};
use wafscope_log_pipeline::EventStore;

type Journal = Arc<Mutex<Vec<String>>>;

struct MockPipeline {
    name: &'static str,
    journal: Journal,
    running: bool,
    fail_start: bool,
}

impl MockPipeline {
    fn new(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            journal: Arc::clone(journal),
            running: false,
            fail_start: false,
        }
    }

    fn failing(mut self) -> Self {
        self.fail_start = true;
        self
    }
}

impl Pipeline for MockPipeline {
    async fn start(&mut self) -> Result<(), WafscopeError> {
        if self.fail_start {
            return Err(PipelineError::InitFailed("boom".to_owned()).into());
        }
        self.running = true;
        self.journal.lock().unwrap().push(format!("start:{}", self.name));
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), WafscopeError> {
        if !self.running {
            return Err(PipelineError::NotRunning.into());
        }
        self.running = false;
        self.journal.lock().unwrap().push(format!("stop:{}", self.name));
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        if self.running {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy("stopped".to_owned())
        }
    }
}

#[tokio::test]
async fn test_start_in_order_stop_in_reverse() {
    // Given: Two enabled modules and one disabled module
    let journal = Journal::default();
    let mut registry = ModuleRegistry::new();
    registry.register(ModuleHandle::new(
        "hub",
        true,
        Box::new(MockPipeline::new("hub", &journal)),
    ));
    registry.register(ModuleHandle::new(
        "disabled",
        false,
        Box::new(MockPipeline::new("disabled", &journal)),
    ));
    registry.register(ModuleHandle::new(
        "ingest",
        true,
        Box::new(MockPipeline::new("ingest", &journal)),
    ));

    // When: Starting and stopping
    registry.start_all().await.unwrap();
    registry.stop_all().await.unwrap();

    // Then: Order is preserved and the disabled module is never touched
    assert_eq!(
        *journal.lock().unwrap(),
        vec!["start:hub", "start:ingest", "stop:ingest", "stop:hub"]
    );
    assert_eq!(registry.count(), 3);
    assert_eq!(registry.enabled_count(), 2);
}

#[tokio::test]
async fn test_start_failure_then_rollback_ignores_not_running() {
    // Given: The second module fails to start
    let journal = Journal::default();
    let mut registry = ModuleRegistry::new();
    registry.register(ModuleHandle::new(
        "hub",
        true,
        Box::new(MockPipeline::new("hub", &journal)),
    ));
    registry.register(ModuleHandle::new(
        "ingest",
        true,
        Box::new(MockPipeline::new("ingest", &journal).failing()),
    ));

    // When: Starting
    let err = registry.start_all().await.unwrap_err();
    assert!(err.to_string().contains("ingest"));

    // Then: Rollback stops the started module without reporting the other
    registry.stop_all().await.unwrap();
    assert_eq!(*journal.lock().unwrap(), vec!["start:hub", "stop:hub"]);
}

#[tokio::test]
async fn test_health_statuses_report_every_module() {
    let journal = Journal::default();
    let mut registry = ModuleRegistry::new();
    registry.register(ModuleHandle::new(
        "hub",
        true,
        Box::new(MockPipeline::new("hub", &journal)),
    ));
    registry.register(ModuleHandle::new(
        "disabled",
        false,
        Box::new(MockPipeline::new("disabled", &journal)),
    ));

    let statuses = registry.health_statuses().await;
    assert_eq!(statuses.len(), 2);
    assert!(statuses[0].status.is_unhealthy());
    // disabled modules always report healthy
    assert!(statuses[1].status.is_healthy());
}

#[test]
fn test_module_init_respects_enabled_flags() {
    let mut config = WafscopeConfig::default();
    config.ingest.enabled = false;
    config.hub.enabled = false;
    let store = Arc::new(EventStore::new(10));

    assert!(
        live_feed::init(&config, Arc::clone(&store), CancellationToken::new())
            .unwrap()
            .is_none()
    );
    assert!(
        log_pipeline::init(
            &config,
            store,
            Arc::new(NoopNotifier),
            CancellationToken::new()
        )
        .unwrap()
        .is_none()
    );
}

#[test]
fn test_live_feed_init_rejects_bad_bind_addr() {
    let mut config = WafscopeConfig::default();
    config.hub.bind_addr = "localhost-ish".to_owned();

    let result = live_feed::init(&config, Arc::new(EventStore::new(10)), CancellationToken::new());
    let err = result.err().expect("bad address should be rejected");
    assert!(err.to_string().contains("bind_addr"));
}

#[test]
fn test_log_pipeline_init_rejects_unknown_source() {
    let mut config = WafscopeConfig::default();
    config.ingest.source = "syslog".to_owned();

    let result = log_pipeline::init(
        &config,
        Arc::new(EventStore::new(10)),
        Arc::new(NoopNotifier),
        CancellationToken::new(),
    );
    assert!(result.is_err());
}
