//! 설정 관리: wafscope.toml 파싱 및 런타임 설정
//!
//! [`WafscopeConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`WAFSCOPE_INGEST_LOG_FILE=/var/log/...` 형식)
//! 3. 설정 파일 (`wafscope.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), wafscope_core::error::WafscopeError> {
//! use wafscope_core::config::WafscopeConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = WafscopeConfig::load("wafscope.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = WafscopeConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, WafscopeError};

/// 지원하는 로그 소스 종류
pub const INGEST_SOURCES: &[&str] = &["file", "command", "demo"];

/// ModSecurity 로그 파일 경로를 지정하는 기존 환경변수
pub const LEGACY_LOG_FILE_ENV: &str = "MODSECURITY_LOG_FILE";

/// wafscope 통합 설정
///
/// `wafscope.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WafscopeConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 로그 수집 설정
    #[serde(default)]
    pub ingest: IngestConfig,
    /// 실시간 구독자 허브 설정
    #[serde(default)]
    pub hub: HubConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl WafscopeConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, WafscopeError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, WafscopeError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WafscopeError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                WafscopeError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, WafscopeError> {
        toml::from_str(toml_str).map_err(|e| {
            WafscopeError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `WAFSCOPE_{SECTION}_{FIELD}`
    /// 예: `WAFSCOPE_HUB_BIND_ADDR=127.0.0.1:8081`
    ///
    /// `MODSECURITY_LOG_FILE`도 인식하며, `WAFSCOPE_INGEST_LOG_FILE`이 우선합니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "WAFSCOPE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "WAFSCOPE_GENERAL_LOG_FORMAT");

        // Ingest
        override_bool(&mut self.ingest.enabled, "WAFSCOPE_INGEST_ENABLED");
        override_string(&mut self.ingest.source, "WAFSCOPE_INGEST_SOURCE");
        override_string(&mut self.ingest.log_file, LEGACY_LOG_FILE_ENV);
        override_string(&mut self.ingest.log_file, "WAFSCOPE_INGEST_LOG_FILE");
        override_args(&mut self.ingest.command, "WAFSCOPE_INGEST_COMMAND");
        override_u64(
            &mut self.ingest.command_timeout_secs,
            "WAFSCOPE_INGEST_COMMAND_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.ingest.poll_interval_secs,
            "WAFSCOPE_INGEST_POLL_INTERVAL_SECS",
        );
        override_usize(
            &mut self.ingest.store_capacity,
            "WAFSCOPE_INGEST_STORE_CAPACITY",
        );
        override_bool(
            &mut self.ingest.demo_fallback,
            "WAFSCOPE_INGEST_DEMO_FALLBACK",
        );
        override_usize(
            &mut self.ingest.max_line_length,
            "WAFSCOPE_INGEST_MAX_LINE_LENGTH",
        );

        // Hub
        override_bool(&mut self.hub.enabled, "WAFSCOPE_HUB_ENABLED");
        override_string(&mut self.hub.bind_addr, "WAFSCOPE_HUB_BIND_ADDR");
        override_usize(
            &mut self.hub.max_connections,
            "WAFSCOPE_HUB_MAX_CONNECTIONS",
        );
        override_usize(&mut self.hub.queue_capacity, "WAFSCOPE_HUB_QUEUE_CAPACITY");
        override_u64(
            &mut self.hub.stats_interval_secs,
            "WAFSCOPE_HUB_STATS_INTERVAL_SECS",
        );
        override_u64(
            &mut self.hub.ping_interval_secs,
            "WAFSCOPE_HUB_PING_INTERVAL_SECS",
        );
        override_u64(
            &mut self.hub.read_timeout_secs,
            "WAFSCOPE_HUB_READ_TIMEOUT_SECS",
        );
        override_u64(
            &mut self.hub.write_timeout_secs,
            "WAFSCOPE_HUB_WRITE_TIMEOUT_SECS",
        );
        override_usize(
            &mut self.hub.max_message_size,
            "WAFSCOPE_HUB_MAX_MESSAGE_SIZE",
        );
        override_u32(
            &mut self.hub.default_log_limit,
            "WAFSCOPE_HUB_DEFAULT_LOG_LIMIT",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "WAFSCOPE_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "WAFSCOPE_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "WAFSCOPE_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), WafscopeError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.ingest.enabled {
            self.validate_ingest()?;
        }

        if self.hub.enabled {
            self.validate_hub()?;
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid(
                "metrics.port",
                "port must be non-zero when metrics are enabled",
            ));
        }

        Ok(())
    }

    fn validate_ingest(&self) -> Result<(), WafscopeError> {
        const MAX_POLL_INTERVAL_SECS: u64 = 3600;
        const MAX_STORE_CAPACITY: usize = 1_000_000;

        let ingest = &self.ingest;
        if !INGEST_SOURCES.contains(&ingest.source.as_str()) {
            return Err(invalid(
                "ingest.source",
                format!("must be one of: {}", INGEST_SOURCES.join(", ")),
            ));
        }

        if ingest.source == "file" && ingest.log_file.is_empty() {
            return Err(invalid(
                "ingest.log_file",
                "log_file must not be empty when source is 'file'",
            ));
        }

        if ingest.source == "command" && ingest.command.is_empty() {
            return Err(invalid(
                "ingest.command",
                "command must not be empty when source is 'command'",
            ));
        }

        if ingest.poll_interval_secs == 0 || ingest.poll_interval_secs > MAX_POLL_INTERVAL_SECS {
            return Err(invalid(
                "ingest.poll_interval_secs",
                format!("must be 1-{MAX_POLL_INTERVAL_SECS}"),
            ));
        }

        if ingest.store_capacity == 0 || ingest.store_capacity > MAX_STORE_CAPACITY {
            return Err(invalid(
                "ingest.store_capacity",
                format!("must be 1-{MAX_STORE_CAPACITY}"),
            ));
        }

        if ingest.command_timeout_secs == 0 {
            return Err(invalid(
                "ingest.command_timeout_secs",
                "must be greater than 0",
            ));
        }

        if ingest.max_line_length == 0 {
            return Err(invalid("ingest.max_line_length", "must be greater than 0"));
        }

        Ok(())
    }

    fn validate_hub(&self) -> Result<(), WafscopeError> {
        let hub = &self.hub;
        if hub.bind_addr.is_empty() {
            return Err(invalid("hub.bind_addr", "bind address must not be empty"));
        }

        let positive = [
            ("hub.max_connections", hub.max_connections as u64),
            ("hub.queue_capacity", hub.queue_capacity as u64),
            ("hub.stats_interval_secs", hub.stats_interval_secs),
            ("hub.ping_interval_secs", hub.ping_interval_secs),
            ("hub.read_timeout_secs", hub.read_timeout_secs),
            ("hub.write_timeout_secs", hub.write_timeout_secs),
            ("hub.max_message_size", hub.max_message_size as u64),
            ("hub.default_log_limit", u64::from(hub.default_log_limit)),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(invalid(field, "must be greater than 0"));
            }
        }

        // keepalive ping은 읽기 데드라인보다 먼저 도착해야 연결이 유지됨
        if hub.ping_interval_secs >= hub.read_timeout_secs {
            return Err(invalid(
                "hub.ping_interval_secs",
                "must be less than hub.read_timeout_secs",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> WafscopeError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 로그 수집 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 로그 소스 (file, command, demo)
    pub source: String,
    /// 감시할 ModSecurity 로그 파일
    pub log_file: String,
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

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source: "file".to_owned(),
            log_file: "/var/log/nginx/modsec_audit.log".to_owned(),
            command: vec![
                "kubectl".to_owned(),
                "logs".to_owned(),
                "-n".to_owned(),
                "ingress-nginx".to_owned(),
                "deployment/ingress-nginx-controller".to_owned(),
                "--since=10s".to_owned(),
            ],
            command_timeout_secs: 15,
            poll_interval_secs: 5,
            store_capacity: 1000,
            demo_fallback: false,
            max_line_length: 64 * 1024, // 64KB
        }
    }
}

/// 실시간 구독자 허브 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// WebSocket 수신 주소
    pub bind_addr: String,
    /// 최대 동시 연결 수
    pub max_connections: usize,
    /// 구독자별 송신 큐 용량
    pub queue_capacity: usize,
    /// stats_update 브로드캐스트 주기 (초)
    pub stats_interval_secs: u64,
    /// keepalive ping 주기 (초)
    pub ping_interval_secs: u64,
    /// 읽기 데드라인 (초, pong 수신 시 갱신)
    pub read_timeout_secs: u64,
    /// 쓰기 데드라인 (초, 전송 1회 기준)
    pub write_timeout_secs: u64,
    /// 수신 메시지 최대 크기 (바이트)
    pub max_message_size: usize,
    /// get_logs 요청에 limit이 없을 때 기본값
    pub default_log_limit: u32,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_addr: "0.0.0.0:8081".to_owned(),
            max_connections: 1024,
            queue_capacity: 256,
            stats_interval_secs: 10,
            ping_interval_secs: 54,
            read_timeout_secs: 60,
            write_timeout_secs: 10,
            max_message_size: 512,
            default_log_limit: 50,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
    /// 스크랩 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key)
        && !val.is_empty()
    {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

/// 공백으로 구분된 명령줄을 인자 목록으로 오버라이드합니다.
fn override_args(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        let args: Vec<String> = val.split_whitespace().map(str::to_owned).collect();
        if !args.is_empty() {
            *target = args;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = WafscopeConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.ingest.source, "file");
        assert_eq!(config.ingest.log_file, "/var/log/nginx/modsec_audit.log");
        assert_eq!(config.ingest.poll_interval_secs, 5);
        assert_eq!(config.ingest.store_capacity, 1000);
        assert_eq!(config.hub.queue_capacity, 256);
        assert_eq!(config.hub.stats_interval_secs, 10);
        assert_eq!(config.hub.ping_interval_secs, 54);
        assert_eq!(config.hub.read_timeout_secs, 60);
        assert_eq!(config.hub.write_timeout_secs, 10);
        assert_eq!(config.hub.max_message_size, 512);
        assert_eq!(config.hub.default_log_limit, 50);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        WafscopeConfig::default().validate().unwrap();
    }

    #[test]
    fn from_str_empty_toml_uses_defaults() {
        let config = WafscopeConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.hub.bind_addr, "0.0.0.0:8081");
    }

    #[test]
    fn from_str_partial_toml_merges_with_defaults() {
        let toml = r#"
[general]
log_level = "debug"

[ingest]
source = "demo"
"#;
        let config = WafscopeConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_level, "debug");
        // log_format은 기본값 유지
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.ingest.source, "demo");
        assert_eq!(config.ingest.poll_interval_secs, 5);
    }

    #[test]
    fn from_str_invalid_toml_returns_error() {
        let err = WafscopeConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            WafscopeError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = WafscopeConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = WafscopeConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_unknown_source() {
        let mut config = WafscopeConfig::default();
        config.ingest.source = "syslog".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ingest.source"));
    }

    #[test]
    fn validate_rejects_empty_command_for_command_source() {
        let mut config = WafscopeConfig::default();
        config.ingest.source = "command".to_owned();
        config.ingest.command.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ingest.command"));
    }

    #[test]
    fn validate_skips_ingest_when_disabled() {
        let mut config = WafscopeConfig::default();
        config.ingest.enabled = false;
        config.ingest.store_capacity = 0;
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_queue_capacity() {
        let mut config = WafscopeConfig::default();
        config.hub.queue_capacity = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("hub.queue_capacity"));
    }

    #[test]
    fn validate_rejects_ping_not_before_read_deadline() {
        let mut config = WafscopeConfig::default();
        config.hub.ping_interval_secs = 60;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ping_interval_secs"));
    }

    #[test]
    fn validate_rejects_zero_metrics_port_when_enabled() {
        let mut config = WafscopeConfig::default();
        config.metrics.enabled = true;
        config.metrics.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn env_override_string() {
        let mut val = "original".to_owned();
        // SAFETY: serial 테스트에서만 환경변수를 조작합니다.
        unsafe { std::env::set_var("TEST_WAFSCOPE_STR", "overridden") };
        override_string(&mut val, "TEST_WAFSCOPE_STR");
        assert_eq!(val, "overridden");
        unsafe { std::env::remove_var("TEST_WAFSCOPE_STR") };
    }

    #[test]
    #[serial]
    fn env_override_bool_invalid_keeps_original() {
        let mut val = false;
        // SAFETY: serial 테스트에서만 환경변수를 조작합니다.
        unsafe { std::env::set_var("TEST_WAFSCOPE_BOOL_BAD", "not-a-bool") };
        override_bool(&mut val, "TEST_WAFSCOPE_BOOL_BAD");
        assert!(!val);
        unsafe { std::env::remove_var("TEST_WAFSCOPE_BOOL_BAD") };
    }

    #[test]
    #[serial]
    fn env_override_args_splits_on_whitespace() {
        let mut val = vec!["a".to_owned()];
        // SAFETY: serial 테스트에서만 환경변수를 조작합니다.
        unsafe { std::env::set_var("TEST_WAFSCOPE_ARGS", "tail  -n 100 /tmp/x.log") };
        override_args(&mut val, "TEST_WAFSCOPE_ARGS");
        assert_eq!(val, vec!["tail", "-n", "100", "/tmp/x.log"]);
        unsafe { std::env::remove_var("TEST_WAFSCOPE_ARGS") };
    }

    #[test]
    #[serial]
    fn wafscope_log_file_wins_over_legacy_variable() {
        let mut config = WafscopeConfig::default();
        // SAFETY: serial 테스트에서만 환경변수를 조작합니다.
        unsafe {
            std::env::set_var(LEGACY_LOG_FILE_ENV, "/tmp/legacy.log");
            std::env::set_var("WAFSCOPE_INGEST_LOG_FILE", "/tmp/preferred.log");
        }
        config.apply_env_overrides();
        assert_eq!(config.ingest.log_file, "/tmp/preferred.log");

        unsafe { std::env::remove_var("WAFSCOPE_INGEST_LOG_FILE") };
        let mut config = WafscopeConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.ingest.log_file, "/tmp/legacy.log");
        unsafe { std::env::remove_var(LEGACY_LOG_FILE_ENV) };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_WAFSCOPE_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = WafscopeConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = WafscopeConfig::parse(&toml_str).unwrap();
        assert_eq!(config.ingest.log_file, parsed.ingest.log_file);
        assert_eq!(config.hub.bind_addr, parsed.hub.bind_addr);
        assert_eq!(config.ingest.command, parsed.ingest.command);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = WafscopeConfig::from_file("/nonexistent/path/wafscope.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WafscopeError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
