#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`hub`]: 구독자 집합을 소유하는 브로드캐스트 허브 actor
//! - [`message`]: 송신 봉투와 수신 요청 타입
//! - [`session`]: 구독자별 reader/writer 펌프와 전송 계층 trait
//! - [`ws`]: WebSocket 어댑터와 accept 루프
//! - [`feed`]: 허브/ticker/서버 생명주기 관리 (Pipeline trait 구현)
//! - [`subscriber`]: 구독자 ID, 신원, 연결 타입
//! - [`config`]: 실시간 피드 설정
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! IngestionLoop --(EventNotifier)--> HubHandle --mpsc--> BroadcastHub
//!                                                          |  try_send
//!                                     subscriber queue <---+
//!                                          |
//!                                 writer pump -> WebSocket -> reader pump --> HubHandle
//! ```

pub mod config;
pub mod error;
pub mod feed;
pub mod hub;
pub mod message;
pub mod session;
pub mod subscriber;
pub mod ws;

// --- 주요 타입 re-export ---

// 모듈
pub use feed::LiveFeed;

// 설정
pub use config::LiveFeedConfig;

// 에러
pub use error::LiveFeedError;

// 허브
pub use hub::{BroadcastHub, HubHandle, spawn_stats_ticker};

// 메시지
pub use message::{ClientRequest, ServerMessage, WELCOME_MESSAGE};

// 세션/전송
pub use session::{InboundFrame, SessionTimeouts, TransportSink, TransportStream, run_session};
pub use subscriber::{SubscriberConnection, SubscriberId, SubscriberIdentity};
pub use ws::{identity_from_headers, serve};
