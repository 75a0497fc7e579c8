//! 도메인 타입: 시스템 전역에서 사용되는 공통 타입
//!
//! 수집(log-pipeline)과 실시간 전송(live-feed)이 공유하는 데이터 구조를 정의합니다.
//! JSON 필드명은 대시보드 클라이언트가 기대하는 snake_case 형식을 그대로 따릅니다.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 보안 이벤트
///
/// WAF 감사 로그 한 줄에서 파생된 구조화된 레코드입니다.
/// 저장소에 들어간 이후에는 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// 이벤트 ID (UUID v4)
    pub id: String,
    /// 발생 시각
    pub timestamp: DateTime<Utc>,
    /// 클라이언트 주소
    pub client_ip: String,
    /// HTTP 메서드
    pub method: String,
    /// 요청 경로
    pub url: String,
    /// User-Agent
    pub user_agent: String,
    /// 공격 유형 라벨 (분류 전이거나 합성 이벤트면 빈 문자열)
    pub attack_type: String,
    /// 매칭된 룰 ID
    pub rule_id: String,
    /// 룰 메시지
    pub message: String,
    /// 심각도
    pub severity: Severity,
    /// 차단 여부
    pub blocked: bool,
    /// 원본 로그 라인 (중복 제거 키)
    pub raw_log: String,
}

impl SecurityEvent {
    /// 새 ID와 현재 시각으로 빈 이벤트를 생성합니다.
    pub fn new(raw_log: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            client_ip: String::new(),
            method: String::new(),
            url: String::new(),
            user_agent: String::new(),
            attack_type: String::new(),
            rule_id: String::new(),
            message: String::new(),
            severity: Severity::Unknown,
            blocked: false,
            raw_log: raw_log.into(),
        }
    }

    /// 분류 결과를 채운 이벤트를 반환합니다.
    pub fn with_attack_type(mut self, attack_type: impl Into<String>) -> Self {
        self.attack_type = attack_type.into();
        self
    }
}

impl fmt::Display for SecurityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} {} rule={} blocked={}",
            self.severity, self.client_ip, self.method, self.url, self.rule_id, self.blocked,
        )
    }
}

/// 심각도 레벨
///
/// syslog 8단계 척도를 따릅니다 (`0 = Emergency` ... `7 = Debug`).
/// 로그에 심각도가 없거나 알 수 없는 값이면 `Unknown`입니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// 시스템 사용 불가
    Emergency,
    /// 즉시 조치 필요
    Alert,
    /// 치명적
    Critical,
    /// 오류
    Error,
    /// 경고
    Warning,
    /// 주의
    Notice,
    /// 정보성
    Info,
    /// 디버그
    Debug,
    /// 알 수 없음
    #[default]
    Unknown,
}

impl Severity {
    /// 숫자 코드(`0`~`7`)에서 심각도를 변환합니다.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Emergency,
            1 => Self::Alert,
            2 => Self::Critical,
            3 => Self::Error,
            4 => Self::Warning,
            5 => Self::Notice,
            6 => Self::Info,
            7 => Self::Debug,
            _ => Self::Unknown,
        }
    }

    /// `[severity "..."]` 필드 값을 해석합니다.
    ///
    /// 숫자 코드와 ModSecurity v3가 출력하는 텍스트 표기(`CRITICAL` 등)를 모두 받습니다.
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Self {
        let s = s.trim();
        if let Ok(code) = s.parse::<u8>() {
            return Self::from_code(code);
        }
        match s.to_lowercase().as_str() {
            "emergency" | "emerg" => Self::Emergency,
            "alert" => Self::Alert,
            "critical" | "crit" => Self::Critical,
            "error" | "err" => Self::Error,
            "warning" | "warn" => Self::Warning,
            "notice" => Self::Notice,
            "info" | "informational" => Self::Info,
            "debug" => Self::Debug,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Emergency => write!(f, "Emergency"),
            Self::Alert => write!(f, "Alert"),
            Self::Critical => write!(f, "Critical"),
            Self::Error => write!(f, "Error"),
            Self::Warning => write!(f, "Warning"),
            Self::Notice => write!(f, "Notice"),
            Self::Info => write!(f, "Info"),
            Self::Debug => write!(f, "Debug"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// 클라이언트 주소별 요청 통계
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpStat {
    /// 클라이언트 주소
    pub ip: String,
    /// 전체 요청 수
    pub requests: u64,
    /// 차단된 요청 수
    pub blocked: u64,
}

/// 통계 스냅샷
///
/// 호출 시점의 저장소 내용으로 매번 새로 계산되는 값 타입입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// 전체 이벤트 수
    pub total_requests: u64,
    /// 차단된 이벤트 수
    pub blocked_requests: u64,
    /// 공격 유형별 차단 건수 (빈 유형 제외)
    pub attacks_by_type: BTreeMap<String, u64>,
    /// 요청 수 상위 클라이언트 (최대 10개)
    pub top_ips: Vec<IpStat>,
    /// 최근 이벤트 (최대 10개, 최신순)
    pub recent_logs: Vec<SecurityEvent>,
    /// 스냅샷 생성 시각
    pub timestamp: DateTime<Utc>,
}

impl StatsSnapshot {
    /// 빈 저장소에 해당하는 스냅샷을 생성합니다.
    pub fn empty() -> Self {
        Self {
            total_requests: 0,
            blocked_requests: 0,
            attacks_by_type: BTreeMap::new(),
            top_ips: Vec::new(),
            recent_logs: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_from_code_covers_scale() {
        assert_eq!(Severity::from_code(0), Severity::Emergency);
        assert_eq!(Severity::from_code(2), Severity::Critical);
        assert_eq!(Severity::from_code(7), Severity::Debug);
        assert_eq!(Severity::from_code(8), Severity::Unknown);
    }

    #[test]
    fn severity_from_str_loose() {
        assert_eq!(Severity::from_str_loose("2"), Severity::Critical);
        assert_eq!(Severity::from_str_loose(" 4 "), Severity::Warning);
        assert_eq!(Severity::from_str_loose("CRITICAL"), Severity::Critical);
        assert_eq!(Severity::from_str_loose("notice"), Severity::Notice);
        assert_eq!(Severity::from_str_loose("42"), Severity::Unknown);
        assert_eq!(Severity::from_str_loose("loud"), Severity::Unknown);
        assert_eq!(Severity::from_str_loose(""), Severity::Unknown);
    }

    #[test]
    fn severity_default_is_unknown() {
        assert_eq!(Severity::default(), Severity::Unknown);
    }

    #[test]
    fn severity_serializes_uppercase() {
        let json = serde_json::to_string(&Severity::Warning).unwrap();
        assert_eq!(json, "\"WARNING\"");
    }

    #[test]
    fn new_event_has_unique_id_and_empty_fields() {
        let a = SecurityEvent::new("line a");
        let b = SecurityEvent::new("line a");
        assert_ne!(a.id, b.id);
        assert!(a.client_ip.is_empty());
        assert!(a.attack_type.is_empty());
        assert_eq!(a.severity, Severity::Unknown);
        assert!(!a.blocked);
        assert_eq!(a.raw_log, "line a");
    }

    #[test]
    fn event_json_uses_snake_case_keys() {
        let mut event = SecurityEvent::new("raw").with_attack_type("SQL Injection");
        event.client_ip = "10.0.0.5".to_owned();
        event.blocked = true;

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["client_ip"], "10.0.0.5");
        assert_eq!(value["attack_type"], "SQL Injection");
        assert_eq!(value["blocked"], true);
        assert_eq!(value["raw_log"], "raw");
        assert!(value.get("user_agent").is_some());
    }

    #[test]
    fn event_display() {
        let mut event = SecurityEvent::new("raw");
        event.client_ip = "192.168.1.10".to_owned();
        event.method = "GET".to_owned();
        event.url = "/login".to_owned();
        event.rule_id = "942100".to_owned();
        let display = event.to_string();
        assert!(display.contains("192.168.1.10"));
        assert!(display.contains("942100"));
    }

    #[test]
    fn empty_snapshot_has_no_entries() {
        let snapshot = StatsSnapshot::empty();
        assert_eq!(snapshot.total_requests, 0);
        assert!(snapshot.attacks_by_type.is_empty());
        assert!(snapshot.top_ips.is_empty());
        assert!(snapshot.recent_logs.is_empty());
    }
}
