//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `wafscope_`
//! - 모듈명: `ingest_`, `hub_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(wafscope_core::metrics::INGEST_EVENTS_STORED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 공격 유형 레이블 키
pub const LABEL_ATTACK_TYPE: &str = "attack_type";

/// 구독자 퇴출 사유 레이블 키 (queue_full, closed)
pub const LABEL_REASON: &str = "reason";

// ─── Ingestion 메트릭 ───────────────────────────────────────────────

/// Ingest: 소스에서 읽은 원시 라인 수 (counter)
pub const INGEST_LINES_READ_TOTAL: &str = "wafscope_ingest_lines_read_total";

/// Ingest: 이벤트로 파싱된 라인 수 (counter)
pub const INGEST_EVENTS_PARSED_TOTAL: &str = "wafscope_ingest_events_parsed_total";

/// Ingest: 저장소에 추가된 이벤트 수 (counter, label: attack_type)
pub const INGEST_EVENTS_STORED_TOTAL: &str = "wafscope_ingest_events_stored_total";

/// Ingest: 중복으로 건너뛴 이벤트 수 (counter)
pub const INGEST_DUPLICATES_TOTAL: &str = "wafscope_ingest_duplicates_total";

/// Ingest: 소스 사용 불가로 실패한 tick 수 (counter)
pub const INGEST_SOURCE_ERRORS_TOTAL: &str = "wafscope_ingest_source_errors_total";

/// Ingest: 용량 초과로 밀려난 이벤트 수 (counter)
pub const INGEST_EVENTS_EVICTED_TOTAL: &str = "wafscope_ingest_events_evicted_total";

/// Ingest: 현재 저장소 크기 (gauge)
pub const INGEST_STORE_SIZE: &str = "wafscope_ingest_store_size";

/// Ingest: tick 처리 시간 (histogram, 초)
pub const INGEST_TICK_DURATION_SECONDS: &str = "wafscope_ingest_tick_duration_seconds";

// ─── Hub 메트릭 ─────────────────────────────────────────────────────

/// Hub: 현재 연결된 구독자 수 (gauge)
pub const HUB_SUBSCRIBERS: &str = "wafscope_hub_subscribers";

/// Hub: 브로드캐스트된 메시지 수 (counter)
pub const HUB_MESSAGES_BROADCAST_TOTAL: &str = "wafscope_hub_messages_broadcast_total";

/// Hub: 느린 소비자 퇴출 수 (counter, label: reason)
pub const HUB_SUBSCRIBERS_EVICTED_TOTAL: &str = "wafscope_hub_subscribers_evicted_total";

/// Hub: 큐가 가득 차 버려진 개별 응답 수 (counter)
pub const HUB_REPLIES_DROPPED_TOTAL: &str = "wafscope_hub_replies_dropped_total";

/// Hub: 거부된 수신 메시지 수 (counter)
pub const HUB_REQUESTS_REJECTED_TOTAL: &str = "wafscope_hub_requests_rejected_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "wafscope_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "wafscope_daemon_build_info";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `wafscope-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Ingestion
    describe_counter!(
        INGEST_LINES_READ_TOTAL,
        "Total number of raw lines read from the log source"
    );
    describe_counter!(
        INGEST_EVENTS_PARSED_TOTAL,
        "Total number of lines recognized as WAF security events"
    );
    describe_counter!(
        INGEST_EVENTS_STORED_TOTAL,
        "Total number of events appended to the event store"
    );
    describe_counter!(
        INGEST_DUPLICATES_TOTAL,
        "Total number of events skipped because the raw line was already stored"
    );
    describe_counter!(
        INGEST_SOURCE_ERRORS_TOTAL,
        "Total number of ticks where the log source was unavailable"
    );
    describe_counter!(
        INGEST_EVENTS_EVICTED_TOTAL,
        "Total number of events evicted from the store by capacity"
    );
    describe_gauge!(
        INGEST_STORE_SIZE,
        "Current number of events held in the event store"
    );
    describe_histogram!(
        INGEST_TICK_DURATION_SECONDS,
        "Time to process a single ingestion tick in seconds"
    );

    // Hub
    describe_gauge!(HUB_SUBSCRIBERS, "Number of connected live subscribers");
    describe_counter!(
        HUB_MESSAGES_BROADCAST_TOTAL,
        "Total number of messages broadcast to subscribers"
    );
    describe_counter!(
        HUB_SUBSCRIBERS_EVICTED_TOTAL,
        "Total number of subscribers evicted for a full or closed queue"
    );
    describe_counter!(
        HUB_REPLIES_DROPPED_TOTAL,
        "Total number of directed replies dropped because the queue was full"
    );
    describe_counter!(
        HUB_REQUESTS_REJECTED_TOTAL,
        "Total number of inbound subscriber messages rejected as malformed"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "wafscope daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
