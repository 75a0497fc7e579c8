//! 실시간 피드 설정
//!
//! [`LiveFeedConfig`]는 core의 [`HubConfig`](wafscope_core::config::HubConfig)를
//! 기반으로 합니다. 시간 값은 `Duration`으로 변환하여 제공합니다.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::LiveFeedError;

/// 실시간 피드 설정
#[derive(Debug, Clone)]
pub struct LiveFeedConfig {
    /// WebSocket 수신 주소
    pub bind_addr: SocketAddr,
    /// 최대 동시 연결 수
    pub max_connections: usize,
    /// 구독자별 송신 큐 용량
    pub queue_capacity: usize,
    /// stats_update 브로드캐스트 주기
    pub stats_interval: Duration,
    /// keepalive ping 주기
    pub ping_interval: Duration,
    /// 읽기 데드라인 (pong 수신 시 갱신)
    pub read_timeout: Duration,
    /// 쓰기 데드라인 (전송 1회 기준)
    pub write_timeout: Duration,
    /// 수신 메시지 최대 크기 (바이트)
    pub max_message_size: usize,
    /// get_logs 요청에 limit이 없을 때 기본값
    pub default_log_limit: i64,
}

impl Default for LiveFeedConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
            max_connections: 1024,
            queue_capacity: 256,
            stats_interval: Duration::from_secs(10),
            ping_interval: Duration::from_secs(54),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            max_message_size: 512,
            default_log_limit: 50,
        }
    }
}

impl LiveFeedConfig {
    /// core의 `HubConfig`에서 설정을 생성합니다.
    pub fn from_core(core: &wafscope_core::config::HubConfig) -> Result<Self, LiveFeedError> {
        let bind_addr = core
            .bind_addr
            .parse::<SocketAddr>()
            .map_err(|e| LiveFeedError::Config {
                field: "bind_addr".to_owned(),
                reason: format!("invalid socket address '{}': {e}", core.bind_addr),
            })?;

        let config = Self {
            bind_addr,
            max_connections: core.max_connections,
            queue_capacity: core.queue_capacity,
            stats_interval: Duration::from_secs(core.stats_interval_secs),
            ping_interval: Duration::from_secs(core.ping_interval_secs),
            read_timeout: Duration::from_secs(core.read_timeout_secs),
            write_timeout: Duration::from_secs(core.write_timeout_secs),
            max_message_size: core.max_message_size,
            default_log_limit: i64::from(core.default_log_limit),
        };
        config.validate()?;
        Ok(config)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LiveFeedError> {
        let invalid = |field: &str, reason: &str| LiveFeedError::Config {
            field: field.to_owned(),
            reason: reason.to_owned(),
        };

        // welcome + stats가 등록 시점에 함께 들어가야 함
        if self.queue_capacity < 2 {
            return Err(invalid("queue_capacity", "must be at least 2"));
        }
        if self.max_connections == 0 {
            return Err(invalid("max_connections", "must be greater than 0"));
        }
        if self.max_message_size == 0 {
            return Err(invalid("max_message_size", "must be greater than 0"));
        }
        if self.stats_interval.is_zero()
            || self.write_timeout.is_zero()
            || self.ping_interval.is_zero()
        {
            return Err(invalid("intervals", "must be greater than 0"));
        }
        if self.ping_interval >= self.read_timeout {
            return Err(invalid(
                "ping_interval",
                "must be shorter than read_timeout",
            ));
        }
        Ok(())
    }
}
