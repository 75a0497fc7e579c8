#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`parser`]: ModSecurity 감사 로그 라인 파서
//! - [`classifier`]: 룰 ID 범위 + 요청 대상 휴리스틱 2단계 공격 분류
//! - [`store`]: 용량 제한 이벤트 저장소 (FIFO 제거, 원본 라인 중복 제거)
//! - [`stats`]: 저장소 기반 통계 스냅샷
//! - [`source`]: 로그 소스 (파일 tail, 외부 명령, 데모, 대체 소스)
//! - [`ingest`]: 주기적 수집 루프
//! - [`query`]: REST 계층용 조회 파사드
//! - [`pipeline`]: 수집 루프 생명주기 관리 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! LogSource -> ModSecurityParser -> AttackClassifier -> EventStore -> EventNotifier
//!     |                                                     |
//!  File/Command/Demo                            StatsAggregator / EventQueries
//! ```

pub mod classifier;
pub mod config;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod query;
pub mod stats;
pub mod store;

pub mod parser;
pub mod source;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{LogPipeline, LogPipelineBuilder};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder, SourceKind};

// 에러
pub use error::LogPipelineError;

// 파서
pub use parser::ModSecurityParser;

// 분류기
pub use classifier::{AttackCategory, AttackClassifier};

// 저장소/통계/조회
pub use query::{EventQueries, TestEvent};
pub use stats::StatsAggregator;
pub use store::EventStore;

// 수집
pub use ingest::{IngestionLoop, TickReport};
pub use source::{CommandTailSource, DemoSource, FallbackSource, FileTailSource, LogSource};
