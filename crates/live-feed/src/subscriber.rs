//! 구독자 식별 타입

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// 구독자 ID (허브가 단조 증가로 부여)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// 구독자 신원
///
/// 상위 인증 프록시가 등록 시점에 제공한 값을 그대로 보관하며 다시 검증하지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberIdentity {
    /// 사용자 ID
    pub user_id: String,
    /// 이메일
    pub email: String,
}

impl SubscriberIdentity {
    /// 새 신원을 생성합니다.
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }

    /// 익명 신원 (인증 헤더가 없을 때)
    pub fn anonymous() -> Self {
        Self::new("anonymous", "")
    }
}

/// 등록된 구독자 연결 -- 세션이 소유하는 수신 측
///
/// 허브가 송신 측을 버리면(`unregister`, 느린 구독자 제거) `rx`가 닫힙니다.
#[derive(Debug)]
pub struct SubscriberConnection {
    /// 구독자 ID
    pub id: SubscriberId,
    /// 구독자 신원
    pub identity: SubscriberIdentity,
    /// 송신 큐 수신 측 (인코딩된 메시지)
    pub rx: mpsc::Receiver<Bytes>,
}
