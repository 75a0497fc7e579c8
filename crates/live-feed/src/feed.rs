//! 실시간 피드 오케스트레이션 -- 허브, 통계 ticker, WebSocket 서버의 생명주기
//!
//! [`LiveFeed`]는 core의 [`Pipeline`] trait을 구현합니다.
//! [`HubHandle`]은 생성 시점부터 유효하므로 수집 파이프라인의 notifier로
//! 먼저 연결한 뒤 시작할 수 있습니다.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use wafscope_core::error::{PipelineError, WafscopeError};
use wafscope_core::pipeline::{HealthStatus, Pipeline};
use wafscope_log_pipeline::{EventStore, StatsAggregator};

use crate::config::LiveFeedConfig;
use crate::error::LiveFeedError;
use crate::hub::{BroadcastHub, HubHandle, spawn_stats_ticker};
use crate::ws;

#[derive(Debug, Clone, PartialEq, Eq)]
enum FeedState {
    Initialized,
    Running,
    Stopped,
}

/// 실시간 피드 모듈
///
/// # 사용 예시
/// ```ignore
/// let store = Arc::new(EventStore::new(1000));
/// let mut feed = LiveFeed::new(config, Arc::clone(&store), cancel.clone());
/// let pipeline = LogPipelineBuilder::new()
///     .store(store)
///     .notifier(Arc::new(feed.handle()))
///     .build()?;
/// feed.start().await?;
/// ```
pub struct LiveFeed {
    config: LiveFeedConfig,
    state: FeedState,
    store: Arc<EventStore>,
    handle: HubHandle,
    /// 정지 상태의 허브 (실행 중에는 허브 태스크가 소유)
    hub: Option<BroadcastHub>,
    parent_cancel: CancellationToken,
    cancel: Option<CancellationToken>,
    local_addr: Option<SocketAddr>,
    hub_task: Option<JoinHandle<BroadcastHub>>,
    ticker_task: Option<JoinHandle<()>>,
    server_task: Option<JoinHandle<()>>,
}

impl LiveFeed {
    /// 새 실시간 피드를 생성합니다. `start` 전까지 연결을 받지 않습니다.
    pub fn new(
        config: LiveFeedConfig,
        store: Arc<EventStore>,
        parent_cancel: CancellationToken,
    ) -> Self {
        let (hub, handle) = BroadcastHub::new(&config, Arc::clone(&store));
        Self {
            config,
            state: FeedState::Initialized,
            store,
            handle,
            hub: Some(hub),
            parent_cancel,
            cancel: None,
            local_addr: None,
            hub_task: None,
            ticker_task: None,
            server_task: None,
        }
    }

    /// 허브 핸들을 반환합니다.
    pub fn handle(&self) -> HubHandle {
        self.handle.clone()
    }

    /// 실제 바인드된 주소 (실행 중일 때만)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            FeedState::Initialized => "initialized",
            FeedState::Running => "running",
            FeedState::Stopped => "stopped",
        }
    }

    /// 설정을 반환합니다.
    pub fn config(&self) -> &LiveFeedConfig {
        &self.config
    }
}

impl Pipeline for LiveFeed {
    async fn start(&mut self) -> Result<(), WafscopeError> {
        if self.state == FeedState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }
        let Some(mut hub) = self.hub.take() else {
            return Err(PipelineError::InitFailed("broadcast hub unavailable".to_owned()).into());
        };

        let listener = match TcpListener::bind(self.config.bind_addr).await {
            Ok(listener) => listener,
            Err(source) => {
                self.hub = Some(hub);
                return Err(LiveFeedError::Bind {
                    addr: self.config.bind_addr.to_string(),
                    source,
                }
                .into());
            }
        };
        self.local_addr = listener.local_addr().ok();

        tracing::info!(
            addr = %self.config.bind_addr,
            max_connections = self.config.max_connections,
            "starting live feed"
        );

        let cancel = self.parent_cancel.child_token();

        let hub_token = cancel.clone();
        self.hub_task = Some(tokio::spawn(async move {
            hub.run(hub_token).await;
            hub
        }));
        self.ticker_task = Some(spawn_stats_ticker(
            self.handle.clone(),
            StatsAggregator::new(Arc::clone(&self.store)),
            self.config.stats_interval,
            cancel.clone(),
        ));
        self.server_task = Some(tokio::spawn(ws::serve(
            listener,
            self.handle.clone(),
            self.config.clone(),
            cancel.clone(),
        )));
        self.cancel = Some(cancel);

        self.state = FeedState::Running;
        tracing::info!("live feed started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), WafscopeError> {
        if self.state != FeedState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping live feed");

        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        for task in [self.server_task.take(), self.ticker_task.take()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "live feed task ended abnormally");
            }
        }
        if let Some(task) = self.hub_task.take() {
            match task.await {
                Ok(hub) => self.hub = Some(hub),
                Err(e) => tracing::warn!(error = %e, "broadcast hub ended abnormally"),
            }
        }

        self.local_addr = None;
        self.state = FeedState::Stopped;
        tracing::info!("live feed stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            FeedState::Running => {
                let finished = |task: &Option<JoinHandle<_>>| {
                    task.as_ref().is_some_and(JoinHandle::is_finished)
                };
                if self.hub_task.as_ref().is_some_and(JoinHandle::is_finished) {
                    HealthStatus::Unhealthy("broadcast hub exited".to_owned())
                } else if finished(&self.server_task) {
                    HealthStatus::Unhealthy("websocket listener exited".to_owned())
                } else if finished(&self.ticker_task) {
                    HealthStatus::Degraded("stats ticker exited".to_owned())
                } else {
                    HealthStatus::Healthy
                }
            }
            FeedState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            FeedState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::SubscriberIdentity;

    fn local_config() -> LiveFeedConfig {
        LiveFeedConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            ..Default::default()
        }
    }

    fn feed() -> LiveFeed {
        LiveFeed::new(
            local_config(),
            Arc::new(EventStore::new(100)),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn lifecycle_start_stop() {
        let mut feed = feed();
        assert_eq!(feed.state_name(), "initialized");
        assert!(feed.health_check().await.is_unhealthy());

        feed.start().await.unwrap();
        assert_eq!(feed.state_name(), "running");
        assert!(feed.local_addr().is_some());
        assert!(feed.health_check().await.is_healthy());

        feed.stop().await.unwrap();
        assert_eq!(feed.state_name(), "stopped");
        assert!(feed.local_addr().is_none());
    }

    #[tokio::test]
    async fn double_start_and_stop_fail() {
        let mut feed = feed();
        assert!(feed.stop().await.is_err());
        feed.start().await.unwrap();
        assert!(feed.start().await.is_err());
        feed.stop().await.unwrap();
    }

    #[tokio::test]
    async fn restart_reuses_hub_and_handle() {
        let mut feed = feed();
        let handle = feed.handle();

        feed.start().await.unwrap();
        let _conn = handle.register(SubscriberIdentity::anonymous()).await.unwrap();
        assert_eq!(handle.connected_clients().await.unwrap(), 1);
        feed.stop().await.unwrap();

        // 정지 시 구독자는 모두 정리됨
        feed.start().await.unwrap();
        assert_eq!(handle.connected_clients().await.unwrap(), 0);
        feed.stop().await.unwrap();
    }

    #[tokio::test]
    async fn bind_failure_keeps_feed_startable() {
        let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = LiveFeedConfig {
            bind_addr: occupied.local_addr().unwrap(),
            ..Default::default()
        };
        let mut feed = LiveFeed::new(config, Arc::new(EventStore::new(10)), CancellationToken::new());

        let err = feed.start().await.unwrap_err();
        assert!(err.to_string().contains("bind"));
        assert_eq!(feed.state_name(), "initialized");

        drop(occupied);
        feed.start().await.unwrap();
        feed.stop().await.unwrap();
    }

    #[tokio::test]
    async fn parent_cancel_stops_tasks() {
        let parent = CancellationToken::new();
        let mut feed = LiveFeed::new(local_config(), Arc::new(EventStore::new(10)), parent.clone());
        feed.start().await.unwrap();

        parent.cancel();
        feed.stop().await.unwrap();
        assert!(feed.hub.is_some());
    }
}
