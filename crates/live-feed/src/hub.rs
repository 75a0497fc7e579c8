//! 브로드캐스트 허브 -- 구독자 집합을 단독 소유하는 actor
//!
//! 구독자 집합의 모든 변경은 [`BroadcastHub`] 태스크 하나에서만 일어나며,
//! 다른 태스크는 복제 가능한 [`HubHandle`]로 명령을 보냅니다.
//!
//! # 구독자 상태
//! ```text
//! connecting -> registered(welcome + stats 적재) -> active -> unregistering -> closed
//! ```
//!
//! # 역압(backpressure)
//! 구독자 큐 적재는 `try_send`로만 합니다. 큐가 가득 찬 구독자는 즉시 제거되고
//! 송신 측이 버려져 해당 세션의 큐가 닫힙니다. 다른 구독자와 수집 루프는 기다리지 않습니다.
//! 단, 개별 요청에 대한 응답은 큐가 가득 차면 응답만 버리고 구독자는 유지합니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use wafscope_core::metrics as m;
use wafscope_core::pipeline::EventNotifier;
use wafscope_core::types::SecurityEvent;
use wafscope_log_pipeline::{EventStore, StatsAggregator};

use crate::config::LiveFeedConfig;
use crate::error::LiveFeedError;
use crate::message::{ClientRequest, ServerMessage};
use crate::subscriber::{SubscriberConnection, SubscriberId, SubscriberIdentity};

/// 허브 메일박스 용량
const MAILBOX_CAPACITY: usize = 1024;

enum HubCommand {
    Register {
        identity: SubscriberIdentity,
        reply: oneshot::Sender<SubscriberConnection>,
    },
    Unregister {
        id: SubscriberId,
    },
    Broadcast {
        kind: &'static str,
        payload: Bytes,
    },
    Request {
        id: SubscriberId,
        request: ClientRequest,
    },
    Reject {
        id: SubscriberId,
        reason: String,
    },
    ClientCount {
        reply: oneshot::Sender<usize>,
    },
}

struct Subscriber {
    identity: SubscriberIdentity,
    tx: mpsc::Sender<Bytes>,
}

/// 브로드캐스트 허브 actor
///
/// # 사용 예시
/// ```ignore
/// let (mut hub, handle) = BroadcastHub::new(&config, store);
/// let task = tokio::spawn(async move {
///     hub.run(cancel).await;
///     hub
/// });
/// let conn = handle.register(SubscriberIdentity::anonymous()).await?;
/// ```
pub struct BroadcastHub {
    store: Arc<EventStore>,
    stats: StatsAggregator,
    subscribers: HashMap<SubscriberId, Subscriber>,
    next_id: u64,
    queue_capacity: usize,
    default_log_limit: i64,
    rx: mpsc::Receiver<HubCommand>,
}

impl BroadcastHub {
    /// 허브와 연결된 핸들을 생성합니다. 허브는 `run`을 호출해야 동작합니다.
    pub fn new(config: &LiveFeedConfig, store: Arc<EventStore>) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let hub = Self {
            stats: StatsAggregator::new(Arc::clone(&store)),
            store,
            subscribers: HashMap::new(),
            next_id: 0,
            queue_capacity: config.queue_capacity.max(2),
            default_log_limit: config.default_log_limit,
            rx,
        };
        (hub, HubHandle { tx })
    }

    /// 현재 등록된 구독자 수를 반환합니다.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// 취소될 때까지 명령을 처리합니다.
    ///
    /// 종료 시 모든 구독자 큐를 닫습니다. 허브는 다시 `run`할 수 있습니다.
    pub async fn run(&mut self, cancel: CancellationToken) {
        tracing::info!(queue_capacity = self.queue_capacity, "broadcast hub started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
            }
        }

        let remaining = self.subscribers.len();
        self.subscribers.clear();
        self.update_gauge();
        tracing::info!(closed = remaining, "broadcast hub stopped");
    }

    fn handle_command(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Register { identity, reply } => {
                let conn = self.register(identity);
                // 요청자가 이미 사라졌으면 되돌림
                if let Err(conn) = reply.send(conn) {
                    self.unregister(conn.id, "registration abandoned");
                }
            }
            HubCommand::Unregister { id } => self.unregister(id, "unregistered"),
            HubCommand::Broadcast { kind, payload } => self.broadcast(kind, &payload),
            HubCommand::Request { id, request } => self.answer(id, &request),
            HubCommand::Reject { id, reason } => {
                metrics::counter!(m::HUB_REQUESTS_REJECTED_TOTAL).increment(1);
                self.reply(id, &ServerMessage::Error { message: reason });
            }
            HubCommand::ClientCount { reply } => {
                let _ = reply.send(self.subscribers.len());
            }
        }
    }

    fn update_gauge(&self) {
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::HUB_SUBSCRIBERS).set(self.subscribers.len() as f64);
    }

    fn register(&mut self, identity: SubscriberIdentity) -> SubscriberConnection {
        self.next_id += 1;
        let id = SubscriberId(self.next_id);
        let (tx, rx) = mpsc::channel(self.queue_capacity);

        // 등록 직후 이 구독자에게만 welcome, stats 순서로 적재
        for message in [
            ServerMessage::welcome(),
            ServerMessage::Stats(self.stats.snapshot()),
        ] {
            match message.encode() {
                Ok(payload) => {
                    if tx.try_send(payload).is_err() {
                        tracing::warn!(subscriber = %id, kind = message.kind(), "initial message not queued");
                    }
                }
                Err(e) => tracing::error!(error = %e, kind = message.kind(), "failed to encode message"),
            }
        }

        tracing::info!(
            subscriber = %id,
            user_id = %identity.user_id,
            email = %identity.email,
            "subscriber registered"
        );

        self.subscribers.insert(
            id,
            Subscriber {
                identity: identity.clone(),
                tx,
            },
        );
        self.update_gauge();

        SubscriberConnection { id, identity, rx }
    }

    /// 구독자를 제거합니다. 이미 없으면 아무 것도 하지 않습니다.
    fn unregister(&mut self, id: SubscriberId, reason: &str) {
        if let Some(sub) = self.subscribers.remove(&id) {
            tracing::info!(
                subscriber = %id,
                user_id = %sub.identity.user_id,
                reason,
                "subscriber removed"
            );
            self.update_gauge();
        }
    }

    fn broadcast(&mut self, kind: &'static str, payload: &Bytes) {
        let mut evicted = Vec::new();

        for (id, sub) in &self.subscribers {
            match sub.tx.try_send(payload.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(subscriber = %id, kind, "subscriber queue full, evicting slow consumer");
                    metrics::counter!(m::HUB_SUBSCRIBERS_EVICTED_TOTAL, m::LABEL_REASON => "queue_full")
                        .increment(1);
                    evicted.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    metrics::counter!(m::HUB_SUBSCRIBERS_EVICTED_TOTAL, m::LABEL_REASON => "closed")
                        .increment(1);
                    evicted.push(*id);
                }
            }
        }

        metrics::counter!(m::HUB_MESSAGES_BROADCAST_TOTAL).increment(1);

        for id in evicted {
            self.unregister(id, "evicted");
        }
    }

    fn answer(&mut self, id: SubscriberId, request: &ClientRequest) {
        tracing::debug!(subscriber = %id, request = request.kind(), "subscriber request");

        let message = match request {
            ClientRequest::GetLogs { limit } => {
                // 명시한 값은 그대로 사용 (0 이하는 전체)
                ServerMessage::Logs(self.store.recent(limit.unwrap_or(self.default_log_limit)))
            }
            ClientRequest::GetStats => ServerMessage::Stats(self.stats.snapshot()),
        };
        self.reply(id, &message);
    }

    /// 한 구독자에게만 보내는 응답. 큐가 가득 차면 응답만 버립니다.
    fn reply(&mut self, id: SubscriberId, message: &ServerMessage) {
        let Some(sub) = self.subscribers.get(&id) else {
            tracing::debug!(subscriber = %id, kind = message.kind(), "reply to unknown subscriber dropped");
            return;
        };

        let payload = match message.encode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, kind = message.kind(), "failed to encode reply");
                return;
            }
        };

        match sub.tx.try_send(payload) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(subscriber = %id, kind = message.kind(), "subscriber queue full, reply dropped");
                metrics::counter!(m::HUB_REPLIES_DROPPED_TOTAL).increment(1);
            }
            Err(TrySendError::Closed(_)) => self.unregister(id, "queue closed"),
        }
    }
}

/// 허브 핸들 -- 허브 actor에 명령을 보내는 복제 가능한 주소
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// 구독자를 등록합니다.
    ///
    /// 반환된 연결의 큐에는 이미 `welcome`, `stats`가 순서대로 들어 있습니다.
    pub async fn register(
        &self,
        identity: SubscriberIdentity,
    ) -> Result<SubscriberConnection, LiveFeedError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HubCommand::Register { identity, reply })
            .await
            .map_err(|_| LiveFeedError::HubClosed)?;
        rx.await.map_err(|_| LiveFeedError::HubClosed)
    }

    /// 구독자를 제거합니다. 여러 번 호출해도 됩니다.
    pub async fn unregister(&self, id: SubscriberId) {
        // 허브가 이미 종료되었으면 제거할 것도 없음
        let _ = self.tx.send(HubCommand::Unregister { id }).await;
    }

    /// 모든 구독자에게 메시지를 보냅니다. 호출자를 기다리게 하지 않습니다.
    pub fn broadcast(&self, message: &ServerMessage) -> Result<(), LiveFeedError> {
        let payload = message.encode()?;
        self.tx
            .try_send(HubCommand::Broadcast {
                kind: message.kind(),
                payload,
            })
            .map_err(|e| match e {
                TrySendError::Full(_) => LiveFeedError::MailboxFull,
                TrySendError::Closed(_) => LiveFeedError::HubClosed,
            })
    }

    /// 새 이벤트를 `new_log`로 브로드캐스트합니다.
    pub fn broadcast_new_log(&self, event: &SecurityEvent) -> Result<(), LiveFeedError> {
        self.broadcast(&ServerMessage::NewLog(event.clone()))
    }

    /// 구독자 요청을 허브에 전달합니다. 응답은 해당 구독자 큐로만 갑니다.
    pub async fn request(
        &self,
        id: SubscriberId,
        request: ClientRequest,
    ) -> Result<(), LiveFeedError> {
        self.tx
            .send(HubCommand::Request { id, request })
            .await
            .map_err(|_| LiveFeedError::HubClosed)
    }

    /// 잘못된 요청을 거부하고 `error` 메시지를 해당 구독자에게 보냅니다.
    pub async fn reject(
        &self,
        id: SubscriberId,
        reason: impl Into<String>,
    ) -> Result<(), LiveFeedError> {
        self.tx
            .send(HubCommand::Reject {
                id,
                reason: reason.into(),
            })
            .await
            .map_err(|_| LiveFeedError::HubClosed)
    }

    /// 현재 연결된 구독자 수를 조회합니다.
    pub async fn connected_clients(&self) -> Result<usize, LiveFeedError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HubCommand::ClientCount { reply })
            .await
            .map_err(|_| LiveFeedError::HubClosed)?;
        rx.await.map_err(|_| LiveFeedError::HubClosed)
    }
}

impl EventNotifier for HubHandle {
    fn on_new_event(&self, event: &SecurityEvent) {
        if let Err(e) = self.broadcast_new_log(event) {
            tracing::warn!(error = %e, event_id = %event.id, "new_log broadcast dropped");
        }
    }
}

/// 주기적으로 `stats_update`를 브로드캐스트하는 태스크를 시작합니다.
///
/// 새 이벤트 유무와 관계없이 `interval`마다 보냅니다. 첫 전송은 `interval` 후입니다.
pub fn spawn_stats_ticker(
    handle: HubHandle,
    stats: StatsAggregator,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = handle.broadcast(&ServerMessage::StatsUpdate(stats.snapshot())) {
                        tracing::debug!(error = %e, "stats_update broadcast dropped");
                    }
                }
            }
        }

        tracing::debug!("stats ticker stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Running {
        handle: HubHandle,
        store: Arc<EventStore>,
        cancel: CancellationToken,
        task: JoinHandle<BroadcastHub>,
    }

    fn start(queue_capacity: usize) -> Running {
        start_with_store(queue_capacity, 100)
    }

    fn start_with_store(queue_capacity: usize, store_capacity: usize) -> Running {
        let config = LiveFeedConfig {
            queue_capacity,
            ..Default::default()
        };
        let store = Arc::new(EventStore::new(store_capacity));
        let (mut hub, handle) = BroadcastHub::new(&config, Arc::clone(&store));
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            hub.run(token).await;
            hub
        });
        Running {
            handle,
            store,
            cancel,
            task,
        }
    }

    fn decode(payload: &Bytes) -> serde_json::Value {
        serde_json::from_slice(payload).unwrap()
    }

    async fn next_kind(conn: &mut SubscriberConnection) -> String {
        let payload = tokio::time::timeout(Duration::from_secs(1), conn.rx.recv())
            .await
            .unwrap()
            .unwrap();
        decode(&payload)["type"].as_str().unwrap().to_owned()
    }

    /// 허브가 앞선 명령을 모두 처리했음을 보장 (메일박스는 FIFO)
    async fn sync(handle: &HubHandle) -> usize {
        handle.connected_clients().await.unwrap()
    }

    #[tokio::test]
    async fn register_queues_welcome_then_stats() {
        let hub = start(8);
        let mut conn = hub
            .handle
            .register(SubscriberIdentity::new("u1", "u1@example.com"))
            .await
            .unwrap();

        assert_eq!(conn.identity.user_id, "u1");
        assert_eq!(next_kind(&mut conn).await, "welcome");
        assert_eq!(next_kind(&mut conn).await, "stats");
        assert_eq!(sync(&hub.handle).await, 1);
    }

    #[tokio::test]
    async fn new_event_follows_initial_messages() {
        let hub = start(8);
        let mut conn = hub
            .handle
            .register(SubscriberIdentity::anonymous())
            .await
            .unwrap();

        let mut event = SecurityEvent::new("raw").with_attack_type("SQL Injection");
        event.blocked = true;
        hub.store.append(event.clone());
        hub.handle.on_new_event(&event);

        assert_eq!(next_kind(&mut conn).await, "welcome");
        assert_eq!(next_kind(&mut conn).await, "stats");
        let payload = conn.rx.recv().await.unwrap();
        let json = decode(&payload);
        assert_eq!(json["type"], "new_log");
        assert_eq!(json["data"]["id"], event.id.as_str());
    }

    #[tokio::test]
    async fn full_queue_evicts_only_slow_subscriber() {
        // 용량 2: 등록 직후 welcome + stats로 가득 참
        let hub = start(2);
        let mut slow = hub
            .handle
            .register(SubscriberIdentity::new("slow", ""))
            .await
            .unwrap();
        let mut healthy = hub
            .handle
            .register(SubscriberIdentity::new("healthy", ""))
            .await
            .unwrap();
        next_kind(&mut healthy).await;
        next_kind(&mut healthy).await;

        hub.handle
            .broadcast(&ServerMessage::StatsUpdate(wafscope_core::types::StatsSnapshot::empty()))
            .unwrap();

        assert_eq!(next_kind(&mut healthy).await, "stats_update");
        assert_eq!(sync(&hub.handle).await, 1);

        // 느린 구독자는 기존 메시지 뒤에 큐가 닫힘
        assert_eq!(next_kind(&mut slow).await, "welcome");
        assert_eq!(next_kind(&mut slow).await, "stats");
        assert!(slow.rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let hub = start(8);
        let mut conn = hub
            .handle
            .register(SubscriberIdentity::anonymous())
            .await
            .unwrap();

        hub.handle.unregister(conn.id).await;
        hub.handle.unregister(conn.id).await;
        hub.handle.unregister(SubscriberId(999)).await;
        assert_eq!(sync(&hub.handle).await, 0);

        // 남은 메시지 후 닫힘
        conn.rx.recv().await.unwrap();
        conn.rx.recv().await.unwrap();
        assert!(conn.rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn get_logs_reply_goes_only_to_requester() {
        let hub = start(8);
        for i in 0..80 {
            hub.store.append(SecurityEvent::new(format!("line-{i}")));
        }
        let mut a = hub.handle.register(SubscriberIdentity::new("a", "")).await.unwrap();
        let mut b = hub.handle.register(SubscriberIdentity::new("b", "")).await.unwrap();
        for conn in [&mut a, &mut b] {
            next_kind(conn).await;
            next_kind(conn).await;
        }

        hub.handle
            .request(a.id, ClientRequest::GetLogs { limit: None })
            .await
            .unwrap();
        hub.handle
            .request(a.id, ClientRequest::GetLogs { limit: Some(5) })
            .await
            .unwrap();
        sync(&hub.handle).await;

        let first = decode(&a.rx.recv().await.unwrap());
        assert_eq!(first["type"], "logs");
        assert_eq!(first["data"].as_array().unwrap().len(), 50);
        let second = decode(&a.rx.recv().await.unwrap());
        assert_eq!(second["data"].as_array().unwrap().len(), 5);
        assert!(b.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn get_logs_passes_explicit_limit_to_store() {
        let hub = start_with_store(8, 1000);
        for i in 0..900 {
            hub.store.append(SecurityEvent::new(format!("line-{i}")));
        }
        let mut conn = hub.handle.register(SubscriberIdentity::anonymous()).await.unwrap();
        next_kind(&mut conn).await;
        next_kind(&mut conn).await;

        for limit in [0, -1, 800] {
            hub.handle
                .request(conn.id, ClientRequest::GetLogs { limit: Some(limit) })
                .await
                .unwrap();
        }
        sync(&hub.handle).await;

        // 0 이하는 전체, 큰 값은 상한 없이 그대로
        let lens: Vec<usize> = (0..3)
            .map(|_| decode(&conn.rx.try_recv().unwrap())["data"].as_array().unwrap().len())
            .collect();
        assert_eq!(lens, vec![900, 900, 800]);
    }

    #[tokio::test]
    async fn get_stats_reply() {
        let hub = start(8);
        hub.store.append(SecurityEvent::new("x"));
        let mut conn = hub.handle.register(SubscriberIdentity::anonymous()).await.unwrap();
        next_kind(&mut conn).await;
        next_kind(&mut conn).await;

        hub.handle.request(conn.id, ClientRequest::GetStats).await.unwrap();
        let json = decode(&conn.rx.recv().await.unwrap());
        assert_eq!(json["type"], "stats");
        assert_eq!(json["data"]["total_requests"], 1);
    }

    #[tokio::test]
    async fn reject_sends_error_message() {
        let hub = start(8);
        let mut conn = hub.handle.register(SubscriberIdentity::anonymous()).await.unwrap();
        next_kind(&mut conn).await;
        next_kind(&mut conn).await;

        hub.handle.reject(conn.id, "unknown message type").await.unwrap();
        let json = decode(&conn.rx.recv().await.unwrap());
        assert_eq!(json["type"], "error");
        assert_eq!(json["data"]["message"], "unknown message type");
    }

    #[tokio::test]
    async fn full_queue_drops_reply_but_keeps_subscriber() {
        let hub = start(2);
        let conn = hub.handle.register(SubscriberIdentity::anonymous()).await.unwrap();

        hub.handle.request(conn.id, ClientRequest::GetStats).await.unwrap();
        assert_eq!(sync(&hub.handle).await, 1);
    }

    #[tokio::test]
    async fn cancel_closes_all_queues_and_hub_can_rerun() {
        let hub = start(8);
        let mut conn = hub.handle.register(SubscriberIdentity::anonymous()).await.unwrap();

        hub.cancel.cancel();
        let mut stopped = hub.task.await.unwrap();
        assert_eq!(stopped.subscriber_count(), 0);

        conn.rx.recv().await.unwrap();
        conn.rx.recv().await.unwrap();
        assert!(conn.rx.recv().await.is_none());

        // 같은 허브를 다시 실행
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            stopped.run(token).await;
        });
        assert_eq!(hub.handle.connected_clients().await.unwrap(), 0);
        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn handle_errors_after_hub_dropped() {
        let config = LiveFeedConfig::default();
        let (hub, handle) = BroadcastHub::new(&config, Arc::new(EventStore::new(10)));
        drop(hub);

        assert!(matches!(
            handle.register(SubscriberIdentity::anonymous()).await,
            Err(LiveFeedError::HubClosed)
        ));
        assert!(matches!(
            handle.broadcast(&ServerMessage::welcome()),
            Err(LiveFeedError::HubClosed)
        ));
        // 알림 경로는 실패해도 패닉하지 않음
        handle.on_new_event(&SecurityEvent::new("x"));
    }

    #[tokio::test(start_paused = true)]
    async fn stats_ticker_broadcasts_periodically() {
        let hub = start(8);
        let mut conn = hub.handle.register(SubscriberIdentity::anonymous()).await.unwrap();
        next_kind(&mut conn).await;
        next_kind(&mut conn).await;

        let cancel = CancellationToken::new();
        let ticker = spawn_stats_ticker(
            hub.handle.clone(),
            StatsAggregator::new(Arc::clone(&hub.store)),
            Duration::from_secs(10),
            cancel.clone(),
        );

        // 시간이 자동으로 진행됨
        assert_eq!(
            decode(&conn.rx.recv().await.unwrap())["type"],
            "stats_update"
        );
        assert_eq!(
            decode(&conn.rx.recv().await.unwrap())["type"],
            "stats_update"
        );

        cancel.cancel();
        ticker.await.unwrap();
    }
}
