//! 파이프라인 오케스트레이션 -- 수집 루프의 생명주기를 관리합니다.
//!
//! [`LogPipeline`]은 core의 [`Pipeline`](wafscope_core::pipeline::Pipeline) trait을 구현하여
//! `wafscope-daemon`에서 다른 모듈과 동일한 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! LogSource -> IngestionLoop(Parser -> Classifier) -> EventStore -> EventNotifier -> downstream
//!                                                          |
//!                                                          +-> EventQueries / StatsAggregator
//! ```

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use wafscope_core::error::{PipelineError, WafscopeError};
use wafscope_core::pipeline::{EventNotifier, EventParser, HealthStatus, NoopNotifier, Pipeline};

use crate::classifier::AttackClassifier;
use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::ingest::{IngestStatus, IngestionLoop};
use crate::parser::ModSecurityParser;
use crate::query::EventQueries;
use crate::source::{self, LogSource};
use crate::stats::StatsAggregator;
use crate::store::EventStore;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 로그 파이프라인 -- 소스 폴링/파싱/분류/저장/알림의 전체 흐름을 관리합니다.
///
/// # 사용 예시
/// ```ignore
/// use wafscope_log_pipeline::LogPipelineBuilder;
///
/// let mut pipeline = LogPipelineBuilder::new()
///     .config(config)
///     .notifier(hub_handle)  // from live-feed
///     .build()?;
///
/// pipeline.start().await?;
/// let recent = pipeline.queries().recent_events(50);
/// ```
pub struct LogPipeline {
    /// 파이프라인 설정
    config: PipelineConfig,
    /// 현재 상태
    state: PipelineState,
    /// 이벤트 저장소
    store: Arc<EventStore>,
    /// 로그 파서
    parser: Arc<dyn EventParser>,
    /// 공격 분류기
    classifier: Arc<AttackClassifier>,
    /// 새 이벤트 알림 대상
    notifier: Arc<dyn EventNotifier>,
    /// 다음 시작 시 사용할 소스 (없으면 설정으로 생성)
    pending_source: Option<Box<dyn LogSource>>,
    /// 상위 취소 토큰 (데몬 종료 시 전체 취소)
    parent_cancel: CancellationToken,
    /// 실행 중인 루프의 취소 토큰
    cancel: Option<CancellationToken>,
    /// 수집 루프 상태
    status: Option<Arc<IngestStatus>>,
    /// 백그라운드 태스크 핸들
    task: Option<JoinHandle<()>>,
}

impl LogPipeline {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 공유 이벤트 저장소를 반환합니다.
    pub fn store(&self) -> Arc<EventStore> {
        Arc::clone(&self.store)
    }

    /// 통계 집계기를 반환합니다.
    pub fn stats(&self) -> StatsAggregator {
        StatsAggregator::new(Arc::clone(&self.store))
    }

    /// REST 계층용 조회 파사드를 반환합니다.
    pub fn queries(&self) -> EventQueries {
        EventQueries::new(Arc::clone(&self.store), Arc::clone(&self.notifier))
    }

    /// 파이프라인 설정을 반환합니다.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn take_source(&mut self) -> Result<Box<dyn LogSource>, LogPipelineError> {
        match self.pending_source.take() {
            Some(source) => Ok(source),
            None => source::build_source(&self.config),
        }
    }
}

impl Pipeline for LogPipeline {
    async fn start(&mut self) -> Result<(), WafscopeError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        tracing::info!(source = %self.config.source, "starting log pipeline");

        let source = self.take_source()?;
        let ingest = IngestionLoop::new(
            source,
            Arc::clone(&self.parser),
            Arc::clone(&self.classifier),
            Arc::clone(&self.store),
            Arc::clone(&self.notifier),
            self.config.poll_interval(),
        );

        let cancel = self.parent_cancel.child_token();
        self.status = Some(ingest.status());
        self.task = Some(tokio::spawn(ingest.run(cancel.clone())));
        self.cancel = Some(cancel);

        self.state = PipelineState::Running;
        tracing::info!("log pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), WafscopeError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping log pipeline");

        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::warn!(error = %e, "ingestion task ended abnormally");
        }

        self.state = PipelineState::Stopped;
        tracing::info!(stored = self.store.len(), "log pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if self.task.as_ref().is_some_and(JoinHandle::is_finished) {
                    return HealthStatus::Unhealthy("ingestion task exited".to_owned());
                }
                match &self.status {
                    Some(status) if status.consecutive_source_errors() > 0 => {
                        HealthStatus::Degraded(format!(
                            "log source unavailable: {}",
                            status.last_source_error().unwrap_or_default()
                        ))
                    }
                    _ => HealthStatus::Healthy,
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 로그 파이프라인 빌더
pub struct LogPipelineBuilder {
    config: PipelineConfig,
    store: Option<Arc<EventStore>>,
    notifier: Option<Arc<dyn EventNotifier>>,
    source: Option<Box<dyn LogSource>>,
    cancel: Option<CancellationToken>,
}

impl LogPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            store: None,
            notifier: None,
            source: None,
            cancel: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 외부에서 만든 저장소를 공유합니다.
    ///
    /// 설정하지 않으면 `store_capacity`로 새 저장소를 생성합니다.
    pub fn store(mut self, store: Arc<EventStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 새 이벤트 알림 대상을 설정합니다 (live-feed 허브 핸들 등).
    pub fn notifier(mut self, notifier: Arc<dyn EventNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// 설정 대신 사용할 로그 소스를 지정합니다 (테스트, 커스텀 소스).
    pub fn source(mut self, source: Box<dyn LogSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// 상위 취소 토큰을 설정합니다.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// 파이프라인을 빌드합니다.
    pub fn build(self) -> Result<LogPipeline, LogPipelineError> {
        self.config.validate()?;

        let parser = ModSecurityParser::new()?.with_max_line_length(self.config.max_line_length);
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(EventStore::new(self.config.store_capacity)));

        Ok(LogPipeline {
            state: PipelineState::Initialized,
            store,
            parser: Arc::new(parser),
            classifier: Arc::new(AttackClassifier::new()?),
            notifier: self.notifier.unwrap_or_else(|| Arc::new(NoopNotifier)),
            pending_source: self.source,
            parent_cancel: self.cancel.unwrap_or_default(),
            cancel: None,
            status: None,
            task: None,
            config: self.config,
        })
    }
}

impl Default for LogPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
