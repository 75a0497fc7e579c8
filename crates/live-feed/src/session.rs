//! 구독자 세션 -- 연결 하나당 reader/writer 펌프
//!
//! - writer: 허브가 채운 송신 큐를 비우고, `ping_interval`마다 ping을 보냅니다.
//!   전송마다 `write_timeout`을 적용하며 실패하면 세션을 끝냅니다.
//!   큐가 닫히면(제거됨) close 프레임을 보내고 종료합니다.
//! - reader: `read_timeout` 데드라인 안에 프레임을 받아야 하며 데드라인은 pong에서만 갱신됩니다.
//!   텍스트 프레임은 [`ClientRequest`]로 해석해 허브에 전달합니다.
//!
//! 전송 계층은 [`TransportSink`]/[`TransportStream`] trait 뒤에 있어
//! WebSocket 없이도 세션 동작을 테스트할 수 있습니다.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use wafscope_core::pipeline::BoxFuture;

use crate::config::LiveFeedConfig;
use crate::error::LiveFeedError;
use crate::hub::HubHandle;
use crate::message::ClientRequest;
use crate::subscriber::{SubscriberConnection, SubscriberId};

/// 세션이 구분하는 수신 프레임
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// 텍스트 프레임 (요청)
    Text(String),
    /// pong (읽기 데드라인 갱신)
    Pong,
    /// 상대가 연결을 닫음
    Close,
    /// 그 외 (바이너리, ping 등)
    Other,
}

/// 송신 측 전송 계층
pub trait TransportSink: Send {
    /// 인코딩된 메시지를 텍스트 프레임으로 보냅니다.
    fn send_text(&mut self, payload: Bytes) -> BoxFuture<'_, Result<(), LiveFeedError>>;

    /// keepalive ping을 보냅니다.
    fn send_ping(&mut self) -> BoxFuture<'_, Result<(), LiveFeedError>>;

    /// close 프레임을 보냅니다.
    fn close(&mut self) -> BoxFuture<'_, Result<(), LiveFeedError>>;
}

/// 수신 측 전송 계층
pub trait TransportStream: Send {
    /// 다음 프레임을 기다립니다. 연결이 끝나면 `None`입니다.
    fn next_frame(&mut self) -> BoxFuture<'_, Option<Result<InboundFrame, LiveFeedError>>>;
}

/// 세션 시간/크기 제한
#[derive(Debug, Clone, Copy)]
pub struct SessionTimeouts {
    /// 읽기 데드라인
    pub read_timeout: Duration,
    /// 전송 1회 데드라인
    pub write_timeout: Duration,
    /// ping 주기
    pub ping_interval: Duration,
    /// 수신 텍스트 최대 크기 (바이트)
    pub max_message_size: usize,
}

impl From<&LiveFeedConfig> for SessionTimeouts {
    fn from(config: &LiveFeedConfig) -> Self {
        Self {
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            ping_interval: config.ping_interval,
            max_message_size: config.max_message_size,
        }
    }
}

/// 등록된 구독자의 세션을 끝날 때까지 실행합니다.
///
/// reader가 끝나면 구독자를 제거하고 writer가 close를 보낼 때까지 기다립니다.
/// writer가 먼저 끝나면(쓰기 실패, 제거) reader도 함께 끝납니다.
pub async fn run_session<W, R>(
    hub: HubHandle,
    conn: SubscriberConnection,
    sink: W,
    stream: R,
    timeouts: SessionTimeouts,
    cancel: CancellationToken,
) where
    W: TransportSink + 'static,
    R: TransportStream,
{
    let SubscriberConnection { id, identity, rx } = conn;
    let session = cancel.child_token();

    tracing::debug!(subscriber = %id, user_id = %identity.user_id, "session started");

    let mut writer = tokio::spawn(write_pump(id, rx, sink, timeouts, session.clone()));
    let reason = read_pump(id, &hub, stream, timeouts, &session).await;

    hub.unregister(id).await;

    // 큐가 닫히면 writer가 close를 보내고 끝남
    let grace = timeouts.write_timeout.saturating_mul(2);
    if tokio::time::timeout(grace, &mut writer).await.is_err() {
        session.cancel();
        let _ = writer.await;
    }

    tracing::info!(subscriber = %id, user_id = %identity.user_id, reason, "session closed");
}

async fn with_deadline<F>(deadline: Duration, what: &str, fut: F) -> Result<(), LiveFeedError>
where
    F: std::future::Future<Output = Result<(), LiveFeedError>>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| LiveFeedError::Transport(format!("{what} deadline exceeded")))?
}

async fn write_pump<W: TransportSink>(
    id: SubscriberId,
    mut rx: mpsc::Receiver<Bytes>,
    mut sink: W,
    timeouts: SessionTimeouts,
    session: CancellationToken,
) {
    let mut ping = tokio::time::interval_at(
        Instant::now() + timeouts.ping_interval,
        timeouts.ping_interval,
    );
    ping.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = session.cancelled() => break,
            payload = rx.recv() => match payload {
                Some(payload) => {
                    if let Err(e) = with_deadline(timeouts.write_timeout, "write", sink.send_text(payload)).await {
                        tracing::debug!(subscriber = %id, error = %e, "write failed");
                        break;
                    }
                }
                None => {
                    let _ = with_deadline(timeouts.write_timeout, "close", sink.close()).await;
                    break;
                }
            },
            _ = ping.tick() => {
                if let Err(e) = with_deadline(timeouts.write_timeout, "ping", sink.send_ping()).await {
                    tracing::debug!(subscriber = %id, error = %e, "ping failed");
                    break;
                }
            }
        }
    }

    session.cancel();
}

async fn read_pump<R: TransportStream>(
    id: SubscriberId,
    hub: &HubHandle,
    mut stream: R,
    timeouts: SessionTimeouts,
    session: &CancellationToken,
) -> &'static str {
    let deadline = tokio::time::sleep(timeouts.read_timeout);
    tokio::pin!(deadline);

    loop {
        let frame = tokio::select! {
            () = session.cancelled() => return "session cancelled",
            () = &mut deadline => return "read deadline exceeded",
            frame = stream.next_frame() => frame,
        };

        match frame {
            None => return "connection closed",
            Some(Err(e)) => {
                tracing::debug!(subscriber = %id, error = %e, "read failed");
                return "read error";
            }
            Some(Ok(InboundFrame::Close)) => return "client closed",
            Some(Ok(InboundFrame::Other)) => {}
            Some(Ok(InboundFrame::Pong)) => {
                deadline
                    .as_mut()
                    .reset(Instant::now() + timeouts.read_timeout);
            }
            Some(Ok(InboundFrame::Text(text))) => {
                if text.len() > timeouts.max_message_size {
                    tracing::warn!(
                        subscriber = %id,
                        size = text.len(),
                        limit = timeouts.max_message_size,
                        "inbound message too large"
                    );
                    return "message too large";
                }

                let sent = match ClientRequest::parse(&text) {
                    Ok(request) => hub.request(id, request).await,
                    Err(e) => {
                        tracing::debug!(subscriber = %id, error = %e, "rejected inbound message");
                        hub.reject(id, format!("invalid request: {e}")).await
                    }
                };
                if sent.is_err() {
                    return "hub closed";
                }
            }
        }
    }
}
