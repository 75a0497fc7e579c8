//! WebSocket 전송 계층 (`tokio-tungstenite`)
//!
//! [`serve`]는 TCP 연결을 받아 핸드셰이크 후 허브에 등록하고 세션을 실행합니다.
//! 구독자 신원은 상위 인증 프록시가 설정한 `X-User-Id` / `X-User-Email` 헤더에서 가져옵니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderMap;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_util::sync::CancellationToken;

use wafscope_core::pipeline::BoxFuture;

use crate::config::LiveFeedConfig;
use crate::error::LiveFeedError;
use crate::hub::HubHandle;
use crate::session::{InboundFrame, SessionTimeouts, TransportSink, TransportStream, run_session};
use crate::subscriber::SubscriberIdentity;

/// 핸드셰이크 제한 시간
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// accept 실패 후 재시도 대기 (fd 고갈 등)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// 사용자 ID 헤더
pub const USER_ID_HEADER: &str = "x-user-id";

/// 이메일 헤더
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// WebSocket 송신 측 어댑터
pub struct WsSink {
    inner: SplitSink<WebSocketStream<TcpStream>, Message>,
}

impl TransportSink for WsSink {
    fn send_text(&mut self, payload: Bytes) -> BoxFuture<'_, Result<(), LiveFeedError>> {
        Box::pin(async move {
            let text = String::from_utf8(payload.to_vec())
                .map_err(|e| LiveFeedError::Transport(format!("payload is not utf-8: {e}")))?;
            self.inner
                .send(Message::Text(text))
                .await
                .map_err(|e| LiveFeedError::Transport(e.to_string()))
        })
    }

    fn send_ping(&mut self) -> BoxFuture<'_, Result<(), LiveFeedError>> {
        Box::pin(async move {
            self.inner
                .send(Message::Ping(Vec::new()))
                .await
                .map_err(|e| LiveFeedError::Transport(e.to_string()))
        })
    }

    fn close(&mut self) -> BoxFuture<'_, Result<(), LiveFeedError>> {
        Box::pin(async move {
            self.inner
                .send(Message::Close(None))
                .await
                .map_err(|e| LiveFeedError::Transport(e.to_string()))
        })
    }
}

/// WebSocket 수신 측 어댑터
pub struct WsStream {
    inner: SplitStream<WebSocketStream<TcpStream>>,
}

impl TransportStream for WsStream {
    fn next_frame(&mut self) -> BoxFuture<'_, Option<Result<InboundFrame, LiveFeedError>>> {
        Box::pin(async move {
            let message = self.inner.next().await?;
            Some(match message {
                Ok(Message::Text(text)) => Ok(InboundFrame::Text(text)),
                Ok(Message::Pong(_)) => Ok(InboundFrame::Pong),
                Ok(Message::Close(_)) => Ok(InboundFrame::Close),
                Ok(_) => Ok(InboundFrame::Other),
                Err(e) => Err(LiveFeedError::Transport(e.to_string())),
            })
        })
    }
}

/// 핸드셰이크 헤더에서 구독자 신원을 추출합니다. 헤더가 없으면 익명입니다.
pub fn identity_from_headers(headers: &HeaderMap) -> SubscriberIdentity {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    };

    match header(USER_ID_HEADER) {
        Some(user_id) => SubscriberIdentity::new(user_id, header(USER_EMAIL_HEADER).unwrap_or_default()),
        None => SubscriberIdentity::anonymous(),
    }
}

/// 연결을 받아 세션을 실행합니다. 취소될 때까지 반환하지 않습니다.
///
/// 동시 연결이 `max_connections`에 도달하면 새 연결은 핸드셰이크 전에 닫습니다.
pub async fn serve(
    listener: TcpListener,
    hub: HubHandle,
    config: LiveFeedConfig,
    cancel: CancellationToken,
) {
    let limiter = Arc::new(Semaphore::new(config.max_connections));

    if let Ok(addr) = listener.local_addr() {
        tracing::info!(addr = %addr, "live feed listening");
    }

    loop {
        let (stream, peer) = tokio::select! {
            () = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            },
        };

        let Ok(permit) = Arc::clone(&limiter).try_acquire_owned() else {
            tracing::warn!(
                peer = %peer,
                max_connections = config.max_connections,
                "connection limit reached, rejecting"
            );
            drop(stream);
            continue;
        };

        let hub = hub.clone();
        let config = config.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = handle_connection(stream, peer, hub, &config, cancel).await {
                tracing::debug!(peer = %peer, error = %e, "connection ended with error");
            }
        });
    }

    tracing::info!("live feed listener stopped");
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    hub: HubHandle,
    config: &LiveFeedConfig,
    cancel: CancellationToken,
) -> Result<(), LiveFeedError> {
    let mut identity = SubscriberIdentity::anonymous();
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        identity = identity_from_headers(req.headers());
        Ok(resp)
    };

    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(config.max_message_size);
    ws_config.max_frame_size = Some(config.max_message_size);

    let ws = tokio::time::timeout(
        HANDSHAKE_TIMEOUT,
        tokio_tungstenite::accept_hdr_async_with_config(stream, callback, Some(ws_config)),
    )
    .await
    .map_err(|_| LiveFeedError::Transport("handshake timed out".to_owned()))?
    .map_err(|e| LiveFeedError::Transport(format!("handshake failed: {e}")))?;

    tracing::debug!(peer = %peer, user_id = %identity.user_id, "websocket handshake completed");

    let conn = hub.register(identity).await?;
    let (sink, stream) = ws.split();

    run_session(
        hub,
        conn,
        WsSink { inner: sink },
        WsStream { inner: stream },
        SessionTimeouts::from(config),
        cancel,
    )
    .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::http::HeaderValue;

    #[test]
    fn identity_from_proxy_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("42"));
        headers.insert(USER_EMAIL_HEADER, HeaderValue::from_static("ops@example.com"));

        let identity = identity_from_headers(&headers);
        assert_eq!(identity.user_id, "42");
        assert_eq!(identity.email, "ops@example.com");
    }

    #[test]
    fn missing_headers_give_anonymous() {
        assert_eq!(
            identity_from_headers(&HeaderMap::new()),
            SubscriberIdentity::anonymous()
        );

        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("  "));
        assert_eq!(identity_from_headers(&headers).user_id, "anonymous");
    }

    #[test]
    fn email_without_user_id_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_EMAIL_HEADER, HeaderValue::from_static("x@example.com"));
        assert_eq!(identity_from_headers(&headers), SubscriberIdentity::anonymous());
    }
}
