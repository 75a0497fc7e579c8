//! 조회 파사드 -- REST 계층에 노출되는 읽기/테스트 쓰기 표면
//!
//! HTTP 라우팅은 이 크레이트의 범위 밖이며, 라우터는 [`EventQueries`]만 사용합니다.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use wafscope_core::pipeline::EventNotifier;
use wafscope_core::types::{SecurityEvent, Severity, StatsSnapshot};

use crate::stats::StatsAggregator;
use crate::store::EventStore;

/// `limit`이 없거나 0 이하일 때의 기본 조회 개수
pub const DEFAULT_QUERY_LIMIT: i64 = 50;

/// 조회 개수 상한
pub const MAX_QUERY_LIMIT: i64 = 500;

/// 합성 테스트 이벤트 입력
///
/// 파싱/분류를 거치지 않고 필드를 그대로 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestEvent {
    /// 클라이언트 주소
    pub client_ip: String,
    /// HTTP 메서드
    pub method: String,
    /// 요청 경로
    pub url: String,
    /// User-Agent
    pub user_agent: String,
    /// 공격 유형 라벨
    pub attack_type: String,
    /// 룰 ID
    pub rule_id: String,
    /// 룰 메시지
    pub message: String,
    /// 심각도
    pub severity: Severity,
    /// 차단 여부
    pub blocked: bool,
    /// 원본 라인 (중복 제거 키). 없으면 이벤트마다 고유한 라인을 합성합니다.
    pub raw_log: Option<String>,
}

impl TestEvent {
    fn into_event(self) -> SecurityEvent {
        let mut event =
            SecurityEvent::new(self.raw_log.unwrap_or_default()).with_attack_type(self.attack_type);
        if event.raw_log.is_empty() {
            // 원본 라인이 없으면 이벤트 ID로 고유 키를 만들어 매번 저장되게 함
            event.raw_log = format!(
                "[test {}] {} {} {} rule={} msg={}",
                event.id, self.client_ip, self.method, self.url, self.rule_id, self.message
            );
        }
        event.client_ip = self.client_ip;
        event.method = self.method;
        event.url = self.url;
        event.user_agent = self.user_agent;
        event.rule_id = self.rule_id;
        event.message = self.message;
        event.severity = self.severity;
        event.blocked = self.blocked;
        event
    }
}

/// 이벤트 조회 파사드
#[derive(Clone)]
pub struct EventQueries {
    store: Arc<EventStore>,
    stats: StatsAggregator,
    notifier: Arc<dyn EventNotifier>,
}

impl EventQueries {
    /// 새 조회 파사드를 생성합니다.
    pub fn new(store: Arc<EventStore>, notifier: Arc<dyn EventNotifier>) -> Self {
        Self {
            stats: StatsAggregator::new(Arc::clone(&store)),
            store,
            notifier,
        }
    }

    /// 조회 개수를 정규화합니다. 0 이하는 기본값, 상한 초과는 상한으로 보정합니다.
    pub fn clamp_limit(limit: i64) -> i64 {
        if limit <= 0 {
            DEFAULT_QUERY_LIMIT
        } else {
            limit.min(MAX_QUERY_LIMIT)
        }
    }

    /// 최근 이벤트를 최신순으로 반환합니다.
    pub fn recent_events(&self, limit: i64) -> Vec<SecurityEvent> {
        self.store.recent(Self::clamp_limit(limit))
    }

    /// 현재 통계 스냅샷을 반환합니다.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// 합성 이벤트를 저장하고 알립니다.
    ///
    /// `raw_log`를 명시했고 같은 원본 라인의 이벤트가 이미 있으면 저장하지 않고
    /// `None`을 반환합니다.
    pub fn record_test_event(&self, input: TestEvent) -> Option<SecurityEvent> {
        let event = input.into_event();
        if !self.store.append_if_absent(event.clone()) {
            tracing::debug!(raw = %event.raw_log, "duplicate test event ignored");
            return None;
        }
        tracing::info!(
            client_ip = %event.client_ip,
            attack_type = %event.attack_type,
            "recorded test event"
        );
        self.notifier.on_new_event(&event);
        Some(event)
    }
}
