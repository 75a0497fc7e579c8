//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 로그 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for WafscopeError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 파싱 실패와 분류 실패는 에러가 아닙니다. 이벤트가 아닌 라인은 `None`으로,
//! 분류 불가는 `Unknown` 카테고리로 표현됩니다.

use wafscope_core::error::{PipelineError, WafscopeError};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 로그 소스 사용 불가 (파일 없음, 명령 실패 등)
    #[error("source unavailable: {source_type}: {reason}")]
    SourceUnavailable {
        /// 소스 유형 (file, command, demo)
        source_type: String,
        /// 에러 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl LogPipelineError {
    /// 소스 사용 불가 에러를 생성합니다.
    pub fn unavailable(source_type: &str, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_type: source_type.to_owned(),
            reason: reason.into(),
        }
    }
}

impl From<LogPipelineError> for WafscopeError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Io(e) => WafscopeError::Io(e),
            other => WafscopeError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
