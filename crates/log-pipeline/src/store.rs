//! 이벤트 저장소 -- 최근 보안 이벤트의 용량 제한 인메모리 저장소
//!
//! [`EventStore`]는 최대 `capacity`개의 이벤트를 추가 순서대로 보관합니다.
//!
//! # 오버플로우 정책
//! 용량을 넘으면 가장 오래된 이벤트 하나를 버리고 새 이벤트를 추가합니다 (FIFO).
//! `append`는 실패하지 않습니다.
//!
//! # 동시성
//! 다수의 reader(통계, 조회)와 하나의 writer(수집 루프)가 `RwLock`으로 공유합니다.
//! 추가는 쓰기 락 안에서 한 번에 이루어지므로 reader가 중간 상태를 볼 수 없습니다.
//!
//! # 중복 제거
//! [`append_if_absent`](EventStore::append_if_absent)는 원본 로그 라인이 같은 이벤트가
//! 이미 있으면 추가하지 않습니다. 저장소 전체를 선형 탐색하므로 라인당 O(n)이며,
//! 기본 용량(1000)에서는 문제가 없지만 용량을 크게 늘리면 수집 비용이 비례해서 커집니다.

use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use wafscope_core::metrics as m;
use wafscope_core::types::SecurityEvent;

/// 기본 저장소 용량
pub const DEFAULT_STORE_CAPACITY: usize = 1000;

struct Inner {
    events: VecDeque<SecurityEvent>,
    /// 용량 초과로 버려진 이벤트 수
    evicted: u64,
    /// 총 추가된 이벤트 수
    total_appended: u64,
}

/// 용량 제한 이벤트 저장소
pub struct EventStore {
    inner: RwLock<Inner>,
    capacity: usize,
}

impl EventStore {
    /// 지정한 용량으로 빈 저장소를 생성합니다.
    ///
    /// 용량 0은 1로 보정됩니다.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: RwLock::new(Inner {
                events: VecDeque::with_capacity(capacity.min(10_000)),
                evicted: 0,
                total_appended: 0,
            }),
            capacity,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_locked(&self, inner: &mut Inner, event: SecurityEvent) {
        inner.total_appended += 1;

        if inner.events.len() >= self.capacity {
            inner.events.pop_front();
            inner.evicted += 1;
            metrics::counter!(m::INGEST_EVENTS_EVICTED_TOTAL).increment(1);
            tracing::debug!(
                evicted = inner.evicted,
                capacity = self.capacity,
                "store full, evicted oldest event"
            );
        }

        inner.events.push_back(event);

        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::INGEST_STORE_SIZE).set(inner.events.len() as f64);
    }

    /// 이벤트를 추가합니다. 가득 차 있으면 가장 오래된 이벤트를 버립니다.
    pub fn append(&self, event: SecurityEvent) {
        let mut inner = self.write();
        self.push_locked(&mut inner, event);
    }

    /// 같은 원본 라인의 이벤트가 없을 때만 추가합니다.
    ///
    /// 검사와 추가가 하나의 쓰기 락 안에서 이루어집니다.
    /// 추가했으면 `true`, 중복이면 `false`를 반환합니다.
    pub fn append_if_absent(&self, event: SecurityEvent) -> bool {
        let mut inner = self.write();
        if inner.events.iter().any(|e| e.raw_log == event.raw_log) {
            return false;
        }
        self.push_locked(&mut inner, event);
        true
    }

    /// 같은 원본 라인의 이벤트가 저장되어 있는지 확인합니다.
    pub fn contains_raw(&self, raw_log: &str) -> bool {
        self.read().events.iter().any(|e| e.raw_log == raw_log)
    }

    /// 최근 이벤트를 최신순으로 반환합니다.
    ///
    /// - `limit <= 0` 또는 `limit >= len`: 전체
    /// - 그 외: 가장 최근에 추가된 `limit`개
    ///
    /// 결과는 타임스탬프 내림차순이며, 같은 시각이면 나중에 추가된 이벤트가 앞에 옵니다.
    pub fn recent(&self, limit: i64) -> Vec<SecurityEvent> {
        self.with_events(|events| recent_of(events, limit))
    }

    /// 읽기 락을 잡은 상태로 전체 이벤트(추가 순서)에 접근합니다.
    pub(crate) fn with_events<R>(&self, f: impl FnOnce(&VecDeque<SecurityEvent>) -> R) -> R {
        let inner = self.read();
        f(&inner.events)
    }

    /// 현재 저장된 이벤트 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.read().events.len()
    }

    /// 저장소가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.read().events.is_empty()
    }

    /// 최대 용량을 반환합니다.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 지금까지 버려진 이벤트 수를 반환합니다.
    pub fn evicted_count(&self) -> u64 {
        self.read().evicted
    }

    /// 지금까지 추가된 이벤트 수를 반환합니다.
    pub fn total_appended(&self) -> u64 {
        self.read().total_appended
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_CAPACITY)
    }
}

/// 추가 순서의 이벤트 목록에서 [`EventStore::recent`] 규칙으로 최근 이벤트를 고릅니다.
pub(crate) fn recent_of(events: &VecDeque<SecurityEvent>, limit: i64) -> Vec<SecurityEvent> {
    let len = events.len();
    let take = match usize::try_from(limit) {
        Ok(n) if n > 0 && n < len => n,
        _ => len,
    };

    let mut out: Vec<SecurityEvent> = events.iter().rev().take(take).cloned().collect();
    out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    out
}
