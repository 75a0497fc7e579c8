//! 로그 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`IngestConfig`](wafscope_core::config::IngestConfig)를
//! 기반으로 수집 파이프라인 전용 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use wafscope_core::config::WafscopeConfig;
//! use wafscope_log_pipeline::config::PipelineConfig;
//!
//! let core_config = WafscopeConfig::default();
//! let config = PipelineConfig::from_core(&core_config.ingest)?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LogPipelineError;

/// 로그 소스 종류
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// 로컬 파일 tail (기본값)
    #[default]
    File,
    /// 외부 명령 출력 폴링 (예: `kubectl logs`)
    Command,
    /// 고정 데모 데이터
    Demo,
}

impl FromStr for SourceKind {
    type Err = LogPipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "command" => Ok(Self::Command),
            "demo" => Ok(Self::Demo),
            other => Err(LogPipelineError::Config {
                field: "source".to_owned(),
                reason: format!("unknown source '{other}', expected file, command or demo"),
            }),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Command => write!(f, "command"),
            Self::Demo => write!(f, "demo"),
        }
    }
}

/// 로그 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 로그 소스 종류
    pub source: SourceKind,
    /// 감시할 로그 파일 경로
    pub log_file: PathBuf,
    /// 원격 로그 tail 명령 (프로그램 + 인자)
    pub command: Vec<String>,
    /// 명령 실행 제한 시간 (초)
    pub command_timeout_secs: u64,
    /// 폴링 주기 (초)
    pub poll_interval_secs: u64,
    /// 이벤트 저장소 최대 용량
    pub store_capacity: usize,
    /// 주 소스가 불가할 때 데모 데이터로 대체할지 여부
    pub demo_fallback: bool,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let core = wafscope_core::config::IngestConfig::default();
        Self {
            enabled: core.enabled,
            source: SourceKind::File,
            log_file: PathBuf::from(core.log_file),
            command: core.command,
            command_timeout_secs: core.command_timeout_secs,
            poll_interval_secs: core.poll_interval_secs,
            store_capacity: core.store_capacity,
            demo_fallback: core.demo_fallback,
            max_line_length: core.max_line_length,
        }
    }
}

impl PipelineConfig {
    /// core의 `IngestConfig`에서 파이프라인 설정을 생성합니다.
    pub fn from_core(
        core: &wafscope_core::config::IngestConfig,
    ) -> Result<Self, LogPipelineError> {
        Ok(Self {
            enabled: core.enabled,
            source: core.source.parse()?,
            log_file: PathBuf::from(&core.log_file),
            command: core.command.clone(),
            command_timeout_secs: core.command_timeout_secs,
            poll_interval_secs: core.poll_interval_secs,
            store_capacity: core.store_capacity,
            demo_fallback: core.demo_fallback,
            max_line_length: core.max_line_length,
        })
    }

    /// 폴링 주기를 `Duration`으로 반환합니다.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// 명령 실행 제한 시간을 `Duration`으로 반환합니다.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// 로그 파일 경로가 안전한지 검증합니다.
    ///
    /// 절대 경로여야 하며 `..` 컴포넌트를 포함할 수 없습니다.
    fn validate_log_file(path: &Path) -> Result<(), LogPipelineError> {
        if path.as_os_str().is_empty() {
            return Err(LogPipelineError::Config {
                field: "log_file".to_owned(),
                reason: "log file path must not be empty".to_owned(),
            });
        }

        if path
            .components()
            .any(|c| c == std::path::Component::ParentDir)
        {
            return Err(LogPipelineError::Config {
                field: "log_file".to_owned(),
                reason: format!(
                    "log file path '{}' contains path traversal pattern '..'",
                    path.display()
                ),
            });
        }

        if !path.is_absolute() {
            return Err(LogPipelineError::Config {
                field: "log_file".to_owned(),
                reason: format!("log file path '{}' must be absolute", path.display()),
            });
        }

        Ok(())
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        const MAX_STORE_CAPACITY: usize = 1_000_000;
        const MAX_POLL_INTERVAL_SECS: u64 = 3600; // 1 hour

        if self.store_capacity == 0 || self.store_capacity > MAX_STORE_CAPACITY {
            return Err(LogPipelineError::Config {
                field: "store_capacity".to_owned(),
                reason: format!("must be 1-{MAX_STORE_CAPACITY}"),
            });
        }

        if self.poll_interval_secs == 0 || self.poll_interval_secs > MAX_POLL_INTERVAL_SECS {
            return Err(LogPipelineError::Config {
                field: "poll_interval_secs".to_owned(),
                reason: format!("must be 1-{MAX_POLL_INTERVAL_SECS}"),
            });
        }

        if self.max_line_length == 0 {
            return Err(LogPipelineError::Config {
                field: "max_line_length".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        match self.source {
            SourceKind::File => Self::validate_log_file(&self.log_file)?,
            SourceKind::Command => {
                if self.command.is_empty() || self.command[0].is_empty() {
                    return Err(LogPipelineError::Config {
                        field: "command".to_owned(),
                        reason: "command must name a program when source is 'command'"
                            .to_owned(),
                    });
                }
                if self.command_timeout_secs == 0 {
                    return Err(LogPipelineError::Config {
                        field: "command_timeout_secs".to_owned(),
                        reason: "must be greater than 0".to_owned(),
                    });
                }
            }
            SourceKind::Demo => {}
        }

        Ok(())
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 로그 소스 종류를 설정합니다.
    pub fn source(mut self, source: SourceKind) -> Self {
        self.config.source = source;
        self
    }

    /// 로그 파일 경로를 설정합니다.
    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.log_file = path.into();
        self
    }

    /// 원격 tail 명령을 설정합니다.
    pub fn command(mut self, command: Vec<String>) -> Self {
        self.config.command = command;
        self
    }

    /// 폴링 주기(초)를 설정합니다.
    pub fn poll_interval_secs(mut self, secs: u64) -> Self {
        self.config.poll_interval_secs = secs;
        self
    }

    /// 저장소 용량을 설정합니다.
    pub fn store_capacity(mut self, capacity: usize) -> Self {
        self.config.store_capacity = capacity;
        self
    }

    /// 데모 데이터 대체 여부를 설정합니다.
    pub fn demo_fallback(mut self, enabled: bool) -> Self {
        self.config.demo_fallback = enabled;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn from_core_preserves_values() {
        let core = wafscope_core::config::IngestConfig {
            source: "command".to_owned(),
            command: vec!["tail".to_owned(), "-n".to_owned(), "50".to_owned()],
            poll_interval_secs: 2,
            store_capacity: 50,
            ..Default::default()
        };
        let config = PipelineConfig::from_core(&core).unwrap();
        assert_eq!(config.source, SourceKind::Command);
        assert_eq!(config.command.len(), 3);
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.store_capacity, 50);
    }

    #[test]
    fn from_core_rejects_unknown_source() {
        let core = wafscope_core::config::IngestConfig {
            source: "journald".to_owned(),
            ..Default::default()
        };
        assert!(PipelineConfig::from_core(&core).is_err());
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let config = PipelineConfig {
            store_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_relative_log_file() {
        let config = PipelineConfig {
            log_file: PathBuf::from("logs/modsec.log"),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn validate_rejects_traversal_in_log_file() {
        let config = PipelineConfig {
            log_file: PathBuf::from("/var/log/../../etc/shadow"),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains(".."));
    }

    #[test]
    fn demo_source_ignores_log_file() {
        let config = PipelineConfigBuilder::new()
            .source(SourceKind::Demo)
            .log_file("")
            .build()
            .unwrap();
        assert_eq!(config.source, SourceKind::Demo);
    }

    #[test]
    fn builder_rejects_empty_command() {
        let result = PipelineConfigBuilder::new()
            .source(SourceKind::Command)
            .command(vec![])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn source_kind_round_trips_through_display() {
        for kind in [SourceKind::File, SourceKind::Command, SourceKind::Demo] {
            assert_eq!(kind.to_string().parse::<SourceKind>().unwrap(), kind);
        }
    }
}
