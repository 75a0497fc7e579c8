//! 실시간 피드 에러 타입
//!
//! [`LiveFeedError`]는 허브, 세션, 전송 계층에서 발생하는 에러를 표현합니다.
//! 구독자 하나의 전송 실패는 그 구독자의 제거로 끝나며 상위로 전파되지 않습니다.

use wafscope_core::error::WafscopeError;

/// 실시간 피드 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LiveFeedError {
    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 수신 주소 바인드 실패
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// 수신 주소
        addr: String,
        /// 원인 에러
        source: std::io::Error,
    },

    /// 허브 actor가 종료됨
    #[error("broadcast hub is not running")]
    HubClosed,

    /// 허브 메일박스가 가득 참 (브로드캐스트 드롭)
    #[error("broadcast hub mailbox is full")]
    MailboxFull,

    /// 전송 계층 에러 (쓰기 실패, 핸드셰이크 실패 등)
    #[error("transport error: {0}")]
    Transport(String),

    /// 메시지 인코딩 에러
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LiveFeedError> for WafscopeError {
    fn from(err: LiveFeedError) -> Self {
        match err {
            LiveFeedError::Io(e) => WafscopeError::Io(e),
            other => WafscopeError::LiveFeed(other.to_string()),
        }
    }
}
