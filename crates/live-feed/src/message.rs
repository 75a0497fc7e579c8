//! 와이어 메시지 -- 송신 봉투와 수신 요청
//!
//! # 송신 (서버 → 구독자)
//! 모든 메시지는 `{"type": ..., "data": ..., "timestamp": ...}` 봉투로 감쌉니다.
//!
//! | type | data |
//! |------|------|
//! | `welcome` | `{"message": "..."}` |
//! | `stats` | `StatsSnapshot` (등록 직후, `get_stats` 응답) |
//! | `stats_update` | `StatsSnapshot` (주기 브로드캐스트) |
//! | `new_log` | `SecurityEvent` |
//! | `logs` | `SecurityEvent` 배열 (`get_logs` 응답) |
//! | `error` | `{"message": "..."}` (잘못된 요청 거부) |
//!
//! # 수신 (구독자 → 서버)
//! `{"type": "get_logs", "limit": 20}`, `{"type": "get_stats"}`.
//! 알 수 없는 `type`은 무시하지 않고 `error` 메시지로 거부합니다.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wafscope_core::types::{SecurityEvent, StatsSnapshot};

use crate::error::LiveFeedError;

/// 등록 직후 보내는 환영 문구
pub const WELCOME_MESSAGE: &str = "Connected to WAF Real-time Dashboard";

/// 서버 → 구독자 메시지
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// 등록 환영
    Welcome {
        /// 환영 문구
        message: String,
    },
    /// 통계 스냅샷 (등록 직후, 요청 응답)
    Stats(StatsSnapshot),
    /// 주기 통계 브로드캐스트
    StatsUpdate(StatsSnapshot),
    /// 새 이벤트
    NewLog(SecurityEvent),
    /// 최근 이벤트 목록 (요청 응답)
    Logs(Vec<SecurityEvent>),
    /// 요청 거부
    Error {
        /// 거부 사유
        message: String,
    },
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    data: &'a ServerMessage,
    timestamp: DateTime<Utc>,
}

impl ServerMessage {
    /// 기본 환영 메시지를 생성합니다.
    pub fn welcome() -> Self {
        Self::Welcome {
            message: WELCOME_MESSAGE.to_owned(),
        }
    }

    /// 봉투의 `type` 값
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::Stats(_) => "stats",
            Self::StatsUpdate(_) => "stats_update",
            Self::NewLog(_) => "new_log",
            Self::Logs(_) => "logs",
            Self::Error { .. } => "error",
        }
    }

    /// 봉투로 감싼 JSON 바이트로 인코딩합니다.
    pub fn encode(&self) -> Result<Bytes, LiveFeedError> {
        let envelope = Envelope {
            kind: self.kind(),
            data: self,
            timestamp: Utc::now(),
        };
        Ok(Bytes::from(serde_json::to_vec(&envelope)?))
    }
}

/// 구독자 → 서버 요청
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    /// 최근 이벤트 요청
    GetLogs {
        /// 요청 개수 (없으면 설정 기본값, 0 이하는 전체)
        #[serde(default)]
        limit: Option<i64>,
    },
    /// 현재 통계 요청
    GetStats,
}

impl ClientRequest {
    /// 텍스트 프레임을 요청으로 파싱합니다.
    ///
    /// JSON이 아니거나 `type`이 없거나 알 수 없는 값이면 에러입니다.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// 로그/메트릭용 요청 이름
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GetLogs { .. } => "get_logs",
            Self::GetStats => "get_stats",
        }
    }
}
