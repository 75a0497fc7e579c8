//! ModSecurity 감사 로그 파서
//!
//! nginx error log에 기록되는 ModSecurity 차단 라인을 [`SecurityEvent`]로 변환합니다.
//!
//! # 라인 형식 (예시)
//! ```text
//! 2024/01/15 10:30:45 [error] 1234#1234: *5678 [client 203.0.113.7] ModSecurity: Access denied
//! with code 403 (phase 2). ... [id "942100"] [msg "SQL Injection Attack Detected"] [severity "2"]
//! ..., client: 203.0.113.7, server: _, request: "GET /search?q=1 HTTP/1.1", host: "example.com"
//! ```
//!
//! # 필드 추출 규칙
//! - 게이트: `ModSecurity`와 `Access denied`가 모두 있어야 이벤트로 인정
//! - 타임스탬프: 선행 `YYYY/MM/DD HH:MM:SS` (UTC로 해석) → `[DD/Mon/YYYY:HH:MM:SS +ZZZZ]` → 현재 시각
//! - 나머지 필드는 없으면 빈 값으로 남기며, 파싱 전체를 중단하지 않습니다.

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;

use wafscope_core::pipeline::EventParser;
use wafscope_core::types::{SecurityEvent, Severity};

use crate::error::LogPipelineError;

/// ModSecurity 모듈이 남긴 라인임을 나타내는 마커
pub const MODSECURITY_MARKER: &str = "ModSecurity";

/// 요청이 거부되었음을 나타내는 마커
pub const DENIED_MARKER: &str = "Access denied";

/// 차단 응답 코드
const FORBIDDEN_STATUS: &str = "403";

/// nginx error log 선행 타임스탬프 형식
const LEADING_TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Apache 스타일 괄호 타임스탬프 형식
const BRACKETED_TIMESTAMP_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// ModSecurity 로그 파서
///
/// 정규식은 생성 시 한 번만 컴파일되며, 파서는 여러 태스크에서 공유할 수 있습니다.
pub struct ModSecurityParser {
    leading_ts: Regex,
    bracketed_ts: Regex,
    client: Regex,
    rule_id: Regex,
    message: Regex,
    severity: Regex,
    request: Regex,
    user_agent: Regex,
    /// 최대 허용 라인 길이 (바이트)
    max_line_length: usize,
}

impl ModSecurityParser {
    /// 기본 설정으로 새 파서를 생성합니다.
    pub fn new() -> Result<Self, LogPipelineError> {
        Ok(Self {
            leading_ts: Regex::new(r"^(\d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2})")?,
            bracketed_ts: Regex::new(
                r"\[(\d{2}/[A-Za-z]{3}/\d{4}:\d{2}:\d{2}:\d{2} [+-]\d{4})\]",
            )?,
            client: Regex::new(r"client:\s*(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})")?,
            rule_id: Regex::new(r#"\[id "([^"]*)"\]"#)?,
            message: Regex::new(r#"\[msg "([^"]*)"\]"#)?,
            severity: Regex::new(r#"\[severity "([^"]*)"\]"#)?,
            request: Regex::new(r#"request:\s*"([^"]*)""#)?,
            user_agent: Regex::new(r#""User-Agent: ([^"]+)""#)?,
            max_line_length: 64 * 1024, // 64KB
        })
    }

    /// 최대 라인 길이를 설정합니다.
    pub fn with_max_line_length(mut self, size: usize) -> Self {
        self.max_line_length = size;
        self
    }

    /// 게이트 마커가 모두 있는지 확인합니다.
    pub fn is_candidate(line: &str) -> bool {
        line.contains(MODSECURITY_MARKER) && line.contains(DENIED_MARKER)
    }

    fn capture<'a>(re: &Regex, line: &'a str) -> Option<&'a str> {
        re.captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// 타임스탬프를 추출합니다. 두 형식 모두 실패하면 `None`.
    fn parse_timestamp(&self, line: &str) -> Option<DateTime<Utc>> {
        if let Some(raw) = Self::capture(&self.leading_ts, line)
            && let Ok(naive) = NaiveDateTime::parse_from_str(raw, LEADING_TIMESTAMP_FORMAT)
        {
            return Some(naive.and_utc());
        }

        if let Some(raw) = Self::capture(&self.bracketed_ts, line)
            && let Ok(parsed) = DateTime::parse_from_str(raw, BRACKETED_TIMESTAMP_FORMAT)
        {
            return Some(parsed.with_timezone(&Utc));
        }

        None
    }

    /// 한 줄을 파싱합니다. 이벤트가 아니면 `None`을 반환합니다.
    pub fn parse_line(&self, line: &str) -> Option<SecurityEvent> {
        if line.len() > self.max_line_length {
            tracing::debug!(
                len = line.len(),
                max = self.max_line_length,
                "skipping oversized log line"
            );
            return None;
        }

        if !Self::is_candidate(line) {
            return None;
        }

        let mut event = SecurityEvent::new(line);
        event.blocked = line.contains(DENIED_MARKER) || line.contains(FORBIDDEN_STATUS);

        if let Some(ts) = self.parse_timestamp(line) {
            event.timestamp = ts;
        }

        if let Some(ip) = Self::capture(&self.client, line) {
            event.client_ip = ip.to_owned();
        }

        if let Some(id) = Self::capture(&self.rule_id, line) {
            event.rule_id = id.to_owned();
        }

        if let Some(msg) = Self::capture(&self.message, line) {
            event.message = msg.to_owned();
        }

        if let Some(sev) = Self::capture(&self.severity, line) {
            event.severity = Severity::from_str_loose(sev);
        }

        if let Some(request) = Self::capture(&self.request, line) {
            let mut parts = request.split_whitespace();
            if let Some(method) = parts.next() {
                event.method = method.to_owned();
            }
            if let Some(path) = parts.next() {
                event.url = path.to_owned();
            }
        }

        if let Some(ua) = Self::capture(&self.user_agent, line) {
            event.user_agent = ua.to_owned();
        }

        Some(event)
    }
}

impl EventParser for ModSecurityParser {
    fn format_name(&self) -> &str {
        "modsecurity"
    }

    fn parse(&self, line: &str) -> Option<SecurityEvent> {
        self.parse_line(line)
    }
}
