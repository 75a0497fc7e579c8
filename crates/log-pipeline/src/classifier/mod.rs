//! 공격 유형 분류기 -- 룰 ID와 요청 대상으로 공격 카테고리를 결정
//!
//! 2단계로 동작합니다.
//!
//! 1. **룰 ID 범위 조회**: OWASP CRS 룰 패밀리 번호 범위로 카테고리를 결정합니다.
//!    숫자가 아닌 룰 ID는 텍스트 힌트(`sqli`, `xss`, `rce`/`cmd`, `lfi`, `rfi`)로 판단합니다.
//! 2. **요청 대상 휴리스틱**: 1단계 결과가 `Unknown`이거나 anomaly score 집계 룰(949110)이면
//!    요청 경로를 디코딩하여 패턴 그룹을 고정 순서로 검사합니다. 처음 매칭된 그룹이 이깁니다.
//!
//! 2단계의 검사 순서는 다음과 같으며 바꾸면 모호한 페이로드의 분류 결과가 달라집니다.
//! 명령 주입 → XSS → SQL 인젝션 → LFI → RFI(`include` 동반 시) → 경로 탐색(`..`) → PHP 인젝션
//!
//! 분류는 실패하지 않습니다. 아무 것도 매칭되지 않으면 `Security Policy Violation`,
//! 판단할 입력 자체가 없으면 `Unknown`을 반환합니다.

mod heuristics;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LogPipelineError;

use heuristics::RequestHeuristics;

/// 공격 카테고리
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackCategory {
    /// 스캐너 탐지 (913xxx)
    ScannerDetection,
    /// HTTP 프로토콜 위반 (920xxx)
    ProtocolViolation,
    /// HTTP 프로토콜 이상 (921xxx)
    ProtocolAnomaly,
    /// 로컬 파일 포함 (930xxx)
    LocalFileInclusion,
    /// 원격 파일 포함 (931xxx)
    RemoteFileInclusion,
    /// 명령 주입 (932xxx)
    CommandInjection,
    /// PHP 인젝션 (933xxx)
    PhpInjection,
    /// 크로스 사이트 스크립팅 (941xxx)
    CrossSiteScripting,
    /// SQL 인젝션 (942xxx)
    SqlInjection,
    /// 세션 고정 (943xxx)
    SessionFixation,
    /// Java 인젝션 (944xxx)
    JavaInjection,
    /// 경로 탐색 (휴리스틱 전용)
    PathTraversal,
    /// 집계 anomaly score 초과 (949110, 단일 룰 책임 아님)
    AnomalyScoreExceeded,
    /// 정책 위반 (휴리스틱 매칭 없음)
    SecurityPolicyViolation,
    /// 판단 불가
    Unknown,
}

impl AttackCategory {
    /// 대시보드에 표시되는 카테고리 라벨
    pub fn label(&self) -> &'static str {
        match self {
            Self::ScannerDetection => "Scanner Detection",
            Self::ProtocolViolation => "HTTP Protocol Violation",
            Self::ProtocolAnomaly => "HTTP Protocol Anomaly",
            Self::LocalFileInclusion => "Local File Inclusion",
            Self::RemoteFileInclusion => "Remote File Inclusion",
            Self::CommandInjection => "Command Injection",
            Self::PhpInjection => "PHP Injection",
            Self::CrossSiteScripting => "Cross-Site Scripting (XSS)",
            Self::SqlInjection => "SQL Injection",
            Self::SessionFixation => "Session Fixation",
            Self::JavaInjection => "Java Injection",
            Self::PathTraversal => "Path Traversal",
            Self::AnomalyScoreExceeded => "Anomaly Score Exceeded",
            Self::SecurityPolicyViolation => "Security Policy Violation",
            Self::Unknown => "Unknown",
        }
    }

    /// 2단계 휴리스틱이 필요한 결과인지 확인합니다.
    pub fn is_inconclusive(&self) -> bool {
        matches!(self, Self::Unknown | Self::AnomalyScoreExceeded)
    }
}

impl fmt::Display for AttackCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// anomaly score 집계 룰 ID
pub const ANOMALY_SCORE_RULE_ID: u64 = 949_110;

/// 룰 ID 범위 테이블 (포함 범위, 순서대로 검사)
const RULE_RANGES: &[(u64, u64, AttackCategory)] = &[
    (913_000, 913_999, AttackCategory::ScannerDetection),
    (920_000, 920_999, AttackCategory::ProtocolViolation),
    (921_000, 921_999, AttackCategory::ProtocolAnomaly),
    (930_000, 930_999, AttackCategory::LocalFileInclusion),
    (931_000, 931_999, AttackCategory::RemoteFileInclusion),
    (932_000, 932_999, AttackCategory::CommandInjection),
    (933_000, 933_999, AttackCategory::PhpInjection),
    (941_000, 941_999, AttackCategory::CrossSiteScripting),
    (942_000, 942_999, AttackCategory::SqlInjection),
    (943_000, 943_999, AttackCategory::SessionFixation),
    (944_000, 944_999, AttackCategory::JavaInjection),
    (
        ANOMALY_SCORE_RULE_ID,
        ANOMALY_SCORE_RULE_ID,
        AttackCategory::AnomalyScoreExceeded,
    ),
];

/// 공격 유형 분류기
///
/// 정규식은 생성 시 한 번 컴파일됩니다. `classify`는 `&self`만 필요하므로
/// `Arc`로 공유하여 여러 태스크에서 동시에 호출할 수 있습니다.
pub struct AttackClassifier {
    heuristics: RequestHeuristics,
}

impl AttackClassifier {
    /// 새 분류기를 생성합니다.
    pub fn new() -> Result<Self, LogPipelineError> {
        Ok(Self {
            heuristics: RequestHeuristics::new()?,
        })
    }

    /// 룰 ID와 요청 대상으로 공격 카테고리를 결정합니다.
    pub fn classify(&self, rule_id: &str, request_target: &str) -> AttackCategory {
        let rule_id = rule_id.trim();
        if rule_id.is_empty() && request_target.is_empty() {
            return AttackCategory::Unknown;
        }

        let by_rule = Self::classify_rule_id(rule_id);
        if !by_rule.is_inconclusive() {
            return by_rule;
        }

        let category = self.heuristics.classify(request_target);
        tracing::trace!(
            rule_id,
            stage1 = by_rule.label(),
            result = category.label(),
            "heuristic classification"
        );
        category
    }

    /// 1단계: 룰 ID 범위 조회 + 텍스트 힌트
    pub fn classify_rule_id(rule_id: &str) -> AttackCategory {
        if let Ok(id) = rule_id.parse::<u64>() {
            return RULE_RANGES
                .iter()
                .find(|(lo, hi, _)| (*lo..=*hi).contains(&id))
                .map(|(_, _, category)| *category)
                .unwrap_or(AttackCategory::Unknown);
        }

        let lower = rule_id.to_lowercase();
        if lower.contains("sqli") {
            AttackCategory::SqlInjection
        } else if lower.contains("xss") {
            AttackCategory::CrossSiteScripting
        } else if lower.contains("rce") || lower.contains("cmd") {
            AttackCategory::CommandInjection
        } else if lower.contains("lfi") {
            AttackCategory::LocalFileInclusion
        } else if lower.contains("rfi") {
            AttackCategory::RemoteFileInclusion
        } else {
            AttackCategory::Unknown
        }
    }
}
