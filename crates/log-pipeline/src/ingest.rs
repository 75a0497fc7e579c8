//! 수집 루프 -- 주기적으로 소스를 폴링하여 이벤트를 저장하고 알림
//!
//! # 처리 흐름 (tick 당)
//! ```text
//! LogSource::poll -> EventParser -> AttackClassifier -> EventStore::append_if_absent -> EventNotifier
//! ```
//!
//! 소스가 불가하면 경고를 남기고 해당 tick은 아무 것도 하지 않습니다.
//! 원본 라인이 이미 저장된 이벤트는 건너뜁니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use wafscope_core::metrics as m;
use wafscope_core::pipeline::{EventNotifier, EventParser};

use crate::classifier::AttackClassifier;
use crate::source::LogSource;
use crate::store::EventStore;

/// 한 tick의 처리 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// 소스에서 읽은 라인 수
    pub lines_read: usize,
    /// 이벤트로 파싱된 라인 수
    pub parsed: usize,
    /// 새로 저장된 이벤트 수
    pub stored: usize,
    /// 중복으로 건너뛴 이벤트 수
    pub duplicates: usize,
    /// 소스 에러 (있으면 이번 tick은 no-op)
    pub source_error: Option<String>,
}

/// 수집 루프 상태 (health check용, 루프와 파이프라인이 공유)
#[derive(Debug, Default)]
pub struct IngestStatus {
    ticks: AtomicU64,
    consecutive_source_errors: AtomicU64,
    last_source_error: Mutex<Option<String>>,
}

impl IngestStatus {
    /// 완료된 tick 수를 반환합니다.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// 연속된 소스 에러 횟수를 반환합니다.
    pub fn consecutive_source_errors(&self) -> u64 {
        self.consecutive_source_errors.load(Ordering::Relaxed)
    }

    /// 마지막 소스 에러 메시지를 반환합니다.
    pub fn last_source_error(&self) -> Option<String> {
        self.last_source_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, report: &TickReport) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let mut last = self
            .last_source_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match &report.source_error {
            Some(err) => {
                self.consecutive_source_errors
                    .fetch_add(1, Ordering::Relaxed);
                *last = Some(err.clone());
            }
            None => {
                self.consecutive_source_errors.store(0, Ordering::Relaxed);
                *last = None;
            }
        }
    }
}

fn as_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

/// 수집 루프
pub struct IngestionLoop {
    source: Box<dyn LogSource>,
    parser: Arc<dyn EventParser>,
    classifier: Arc<AttackClassifier>,
    store: Arc<EventStore>,
    notifier: Arc<dyn EventNotifier>,
    interval: Duration,
    status: Arc<IngestStatus>,
}

impl IngestionLoop {
    /// 새 수집 루프를 생성합니다.
    pub fn new(
        source: Box<dyn LogSource>,
        parser: Arc<dyn EventParser>,
        classifier: Arc<AttackClassifier>,
        store: Arc<EventStore>,
        notifier: Arc<dyn EventNotifier>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            parser,
            classifier,
            store,
            notifier,
            interval,
            status: Arc::new(IngestStatus::default()),
        }
    }

    /// 공유 상태 핸들을 반환합니다.
    pub fn status(&self) -> Arc<IngestStatus> {
        Arc::clone(&self.status)
    }

    /// 한 번 폴링하여 새 라인을 처리합니다.
    pub async fn tick(&mut self) -> TickReport {
        let started = Instant::now();
        let mut report = TickReport::default();

        let lines = match self.source.poll().await {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!(
                    source = self.source.name(),
                    error = %e,
                    "log source unavailable, skipping tick"
                );
                metrics::counter!(m::INGEST_SOURCE_ERRORS_TOTAL).increment(1);
                report.source_error = Some(e.to_string());
                self.status.record(&report);
                return report;
            }
        };

        report.lines_read = lines.len();

        for line in &lines {
            let Some(event) = self.parser.parse(line) else {
                continue;
            };
            report.parsed += 1;

            // URL이 없으면 룰 메시지로 휴리스틱을 돌림
            let target = if event.url.is_empty() {
                event.message.as_str()
            } else {
                event.url.as_str()
            };
            let category = self.classifier.classify(&event.rule_id, target);
            let event = event.with_attack_type(category.label());

            if self.store.append_if_absent(event.clone()) {
                report.stored += 1;
                metrics::counter!(m::INGEST_EVENTS_STORED_TOTAL, m::LABEL_ATTACK_TYPE => category.label())
                    .increment(1);
                tracing::debug!(
                    client_ip = %event.client_ip,
                    rule_id = %event.rule_id,
                    attack_type = category.label(),
                    "stored security event"
                );
                self.notifier.on_new_event(&event);
            } else {
                report.duplicates += 1;
            }
        }

        metrics::counter!(m::INGEST_LINES_READ_TOTAL).increment(as_u64(report.lines_read));
        metrics::counter!(m::INGEST_EVENTS_PARSED_TOTAL).increment(as_u64(report.parsed));
        metrics::counter!(m::INGEST_DUPLICATES_TOTAL).increment(as_u64(report.duplicates));
        metrics::histogram!(m::INGEST_TICK_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());

        if report.stored > 0 {
            tracing::info!(
                source = self.source.name(),
                lines = report.lines_read,
                stored = report.stored,
                duplicates = report.duplicates,
                "ingested new security events"
            );
        }

        self.status.record(&report);
        report
    }

    /// 취소될 때까지 주기적으로 tick을 실행합니다.
    ///
    /// 첫 tick은 즉시 실행되므로 기존 파일 내용이 시작 시점에 바로 반영됩니다.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            source = self.source.name(),
            parser = self.parser.format_name(),
            interval_secs = self.interval.as_secs(),
            "ingestion loop started"
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        _ = self.tick() => {}
                    }
                }
            }
        }

        tracing::info!(source = self.source.name(), "ingestion loop stopped");
    }
}
