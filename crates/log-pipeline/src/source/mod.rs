//! 로그 소스 -- "마지막 읽은 위치 이후의 새 라인"을 제공하는 수집 경계
//!
//! # 소스 종류
//! - [`FileTailSource`]: 로컬 파일 tail (truncation/로테이션 감지)
//! - [`CommandTailSource`]: 외부 명령(예: `kubectl logs --since=10s`) 출력 폴링
//! - [`DemoSource`]: 고정 데모 데이터 (한 번만 반환)
//! - [`FallbackSource`]: 주 소스가 불가하면 대체 소스를 폴링
//!
//! # 반환값 규약
//! - `Ok(vec![])`: 새 라인 없음
//! - `Ok(lines)`: 읽은 순서대로의 새 라인
//! - `Err(_)`: 소스 사용 불가 (수집 루프는 이번 tick을 건너뜀)

pub mod command;
pub mod demo;
pub mod fallback;
pub mod file;

pub use command::CommandTailSource;
pub use demo::DemoSource;
pub use fallback::FallbackSource;
pub use file::FileTailSource;

use wafscope_core::pipeline::BoxFuture;

use crate::config::{PipelineConfig, SourceKind};
use crate::error::LogPipelineError;

/// 로그 소스 trait
///
/// `Box<dyn LogSource>`로 다룰 수 있도록 boxed future를 반환합니다.
/// 폴링은 수집 태스크 하나에서만 호출되므로 `&mut self`를 받습니다.
pub trait LogSource: Send + Sync {
    /// 로그/메트릭에 표시할 소스 이름
    fn name(&self) -> &str;

    /// 마지막 폴링 이후의 새 라인을 반환합니다.
    fn poll(&mut self) -> BoxFuture<'_, Result<Vec<String>, LogPipelineError>>;
}

/// 설정에 맞는 로그 소스를 생성합니다.
///
/// `demo_fallback`이 켜져 있고 주 소스가 데모가 아니면 [`FallbackSource`]로 감쌉니다.
pub fn build_source(config: &PipelineConfig) -> Result<Box<dyn LogSource>, LogPipelineError> {
    let primary: Box<dyn LogSource> = match config.source {
        SourceKind::File => Box::new(FileTailSource::new(
            config.log_file.clone(),
            config.max_line_length,
        )),
        SourceKind::Command => Box::new(CommandTailSource::new(
            &config.command,
            config.command_timeout(),
        )?),
        SourceKind::Demo => return Ok(Box::new(DemoSource::new())),
    };

    if config.demo_fallback {
        tracing::info!(
            primary = primary.name(),
            "demo fallback enabled for log source"
        );
        return Ok(Box::new(FallbackSource::new(
            primary,
            Box::new(DemoSource::new()),
        )));
    }

    Ok(primary)
}
