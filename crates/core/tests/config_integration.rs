//! wafscope.toml 통합 설정 테스트
//!
//! - wafscope.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use std::io::Write;

use wafscope_core::config::WafscopeConfig;
use wafscope_core::error::{ConfigError, WafscopeError};

/// 테스트 동안 환경변수를 설정하고, 끝나면 원래 값으로 되돌립니다.
fn with_env<T>(key: &str, value: &str, f: impl FnOnce() -> T) -> T {
    let original = std::env::var(key).ok();
    // SAFETY: 호출하는 테스트는 모두 #[serial]로 직렬화됩니다.
    unsafe { std::env::set_var(key, value) };

    let result = f();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var(key, val),
            None => std::env::remove_var(key),
        }
    }
    result
}

// =============================================================================
// wafscope.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_and_validates() {
    let content = include_str!("../../../wafscope.toml.example");
    let config = WafscopeConfig::parse(content).expect("example config should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let content = include_str!("../../../wafscope.toml.example");
    let example = WafscopeConfig::parse(content).expect("should parse");
    let defaults = WafscopeConfig::default();

    assert_eq!(example.general.log_level, defaults.general.log_level);
    assert_eq!(example.ingest.source, defaults.ingest.source);
    assert_eq!(example.ingest.log_file, defaults.ingest.log_file);
    assert_eq!(example.ingest.command, defaults.ingest.command);
    assert_eq!(
        example.ingest.poll_interval_secs,
        defaults.ingest.poll_interval_secs
    );
    assert_eq!(example.ingest.store_capacity, defaults.ingest.store_capacity);
    assert_eq!(
        example.ingest.max_line_length,
        defaults.ingest.max_line_length
    );
    assert_eq!(example.hub.bind_addr, defaults.hub.bind_addr);
    assert_eq!(example.hub.queue_capacity, defaults.hub.queue_capacity);
    assert_eq!(
        example.hub.ping_interval_secs,
        defaults.hub.ping_interval_secs
    );
    assert_eq!(
        example.hub.read_timeout_secs,
        defaults.hub.read_timeout_secs
    );
    assert_eq!(
        example.hub.default_log_limit,
        defaults.hub.default_log_limit
    );
    assert_eq!(example.metrics.port, defaults.metrics.port);
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn partial_config_hub_only() {
    let toml = r#"
[hub]
bind_addr = "127.0.0.1:9001"
queue_capacity = 8
"#;
    let config = WafscopeConfig::parse(toml).expect("should parse");
    assert_eq!(config.hub.bind_addr, "127.0.0.1:9001");
    assert_eq!(config.hub.queue_capacity, 8);
    // 다른 섹션은 기본값
    assert_eq!(config.ingest.store_capacity, 1000);
    assert_eq!(config.hub.stats_interval_secs, 10);
}

#[test]
fn partial_config_command_source() {
    let toml = r#"
[ingest]
source = "command"
command = ["tail", "-n", "200", "/var/log/nginx/error.log"]
"#;
    let config = WafscopeConfig::parse(toml).expect("should parse");
    config.validate().expect("should validate");
    assert_eq!(config.ingest.command.len(), 4);
}

// =============================================================================
// 파일 로딩 테스트
// =============================================================================

#[tokio::test]
#[serial_test::serial]
async fn load_from_file_applies_env_overrides() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[ingest]\npoll_interval_secs = 30").expect("write");

    let path = file.path().to_owned();
    let original = std::env::var("WAFSCOPE_INGEST_POLL_INTERVAL_SECS").ok();
    // SAFETY: #[serial] 테스트
    unsafe { std::env::set_var("WAFSCOPE_INGEST_POLL_INTERVAL_SECS", "2") };

    let result = WafscopeConfig::load(&path).await;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("WAFSCOPE_INGEST_POLL_INTERVAL_SECS", val),
            None => std::env::remove_var("WAFSCOPE_INGEST_POLL_INTERVAL_SECS"),
        }
    }

    let config = result.expect("should load");
    assert_eq!(config.ingest.poll_interval_secs, 2);
}

#[tokio::test]
async fn load_rejects_invalid_values_in_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[hub]\nqueue_capacity = 0").expect("write");

    let err = WafscopeConfig::load(file.path()).await.unwrap_err();
    assert!(matches!(
        err,
        WafscopeError::Config(ConfigError::InvalidValue { .. })
    ));
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[general]
log_level = "info"
"#;
    let level = with_env("WAFSCOPE_GENERAL_LOG_LEVEL", "error", || {
        let mut config = WafscopeConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config.general.log_level
    });
    assert_eq!(level, "error");
}

#[test]
#[serial_test::serial]
fn env_override_numeric_field() {
    let capacity = with_env("WAFSCOPE_HUB_QUEUE_CAPACITY", "64", || {
        let mut config = WafscopeConfig::parse("").expect("should parse");
        config.apply_env_overrides();
        config.hub.queue_capacity
    });
    assert_eq!(capacity, 64);
}

#[test]
#[serial_test::serial]
fn env_override_invalid_numeric_keeps_toml_value() {
    let toml = r#"
[ingest]
store_capacity = 500
"#;
    let capacity = with_env("WAFSCOPE_INGEST_STORE_CAPACITY", "lots", || {
        let mut config = WafscopeConfig::parse(toml).expect("should parse");
        config.apply_env_overrides();
        config.ingest.store_capacity
    });
    assert_eq!(capacity, 500);
}

#[test]
#[serial_test::serial]
fn legacy_log_file_variable_is_honored() {
    let path = with_env("MODSECURITY_LOG_FILE", "/tmp/modsec.log", || {
        let mut config = WafscopeConfig::parse("").expect("should parse");
        config.apply_env_overrides();
        config.ingest.log_file
    });
    assert_eq!(path, "/tmp/modsec.log");
}

#[test]
#[serial_test::serial]
fn env_override_bool_field() {
    let enabled = with_env("WAFSCOPE_METRICS_ENABLED", "true", || {
        let mut config = WafscopeConfig::parse("").expect("should parse");
        config.apply_env_overrides();
        config.metrics.enabled
    });
    assert!(enabled);
}

// =============================================================================
// 빈 파일 / 잘못된 형식 에러 테스트
// =============================================================================

#[test]
fn comments_only_parses_with_defaults() {
    let toml = r#"
# 이것은 주석입니다
# 모든 줄이 주석입니다
"#;
    let config = WafscopeConfig::parse(toml).expect("comments-only should parse");
    config.validate().expect("should validate");
    assert_eq!(config.general.log_level, "info");
}

#[test]
fn invalid_type_returns_parse_error() {
    let toml = r#"
[hub]
enabled = "not_a_bool"
"#;
    let err = WafscopeConfig::parse(toml).unwrap_err();
    assert!(matches!(
        err,
        WafscopeError::Config(ConfigError::ParseFailed { .. })
    ));
}
