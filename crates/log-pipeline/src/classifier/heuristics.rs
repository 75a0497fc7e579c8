//! 요청 대상 휴리스틱 (2단계 분류)
//!
//! 패턴 그룹은 `PATTERN_GROUPS` 배열 순서대로 검사되며 처음 매칭된 그룹이 결과가 됩니다.
//! RFI 그룹만 예외적으로 `include` 키워드가 함께 있어야 매칭으로 인정합니다.

use regex::Regex;

use super::AttackCategory;
use crate::error::LogPipelineError;

/// 디코딩 대상 퍼센트 인코딩 (소문자 기준)
const DECODE_TABLE: &[(&str, &str)] = &[
    ("%3c", "<"),
    ("%3e", ">"),
    ("%22", "\""),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%20", " "),
];

/// 검사 순서대로 나열된 (카테고리, 패턴) 목록
///
/// 명령 주입의 명령어 뒤에는 공백, 구분자 또는 끝이 와야 합니다 (`/page;id=5` 같은 matrix 파라미터 제외).
const PATTERN_GROUPS: &[(AttackCategory, &str)] = &[
    (
        AttackCategory::CommandInjection,
        r"(?:[;|`]|&&|\$\()\s*(?:ls|cat|id|whoami|uname|wget|curl|nc|bash|sh|ping|rm|echo|pwd)(?:[\s+;|&)`]|$)|/bin/(?:ba)?sh|cmd\.exe|powershell",
    ),
    (
        AttackCategory::CrossSiteScripting,
        r"<script|javascript:|\bon(?:error|load|click|mouseover|focus)\s*=|alert\(|document\.cookie|<iframe|<svg|eval\(",
    ),
    (
        AttackCategory::SqlInjection,
        r"union[\s+]+(?:all[\s+]+)?select|\bor[\s+]+1[\s+]*=[\s+]*1|select[\s+].*[\s+]from|insert[\s+]+into|drop[\s+]+table|sleep\(\d+\)|benchmark\(|information_schema|'[\s+]*--",
    ),
    (
        AttackCategory::LocalFileInclusion,
        r"/etc/passwd|/etc/shadow|/proc/self|boot\.ini|win\.ini|windows/system32|php://filter",
    ),
    (
        AttackCategory::RemoteFileInclusion,
        r"(?:https?|ftp|php|data|expect)://",
    ),
    (AttackCategory::PathTraversal, r"\.\.|%2e%2e"),
    (
        AttackCategory::PhpInjection,
        r"<\?php|<\?=|phpinfo\(|base64_decode\(|shell_exec\(|passthru\(",
    ),
];

/// RFI 그룹이 매칭되려면 함께 있어야 하는 키워드
const RFI_KEYWORD: &str = "include";

/// 컴파일된 휴리스틱 패턴 그룹
pub(super) struct RequestHeuristics {
    groups: Vec<(AttackCategory, Regex)>,
}

impl RequestHeuristics {
    pub(super) fn new() -> Result<Self, LogPipelineError> {
        let groups = PATTERN_GROUPS
            .iter()
            .map(|(category, pattern)| Ok((*category, Regex::new(pattern)?)))
            .collect::<Result<Vec<_>, LogPipelineError>>()?;
        Ok(Self { groups })
    }

    /// 요청 대상을 분류합니다. 매칭이 없으면 `SecurityPolicyViolation`.
    pub(super) fn classify(&self, target: &str) -> AttackCategory {
        let normalized = normalize(target);

        for (category, re) in &self.groups {
            if !re.is_match(&normalized) {
                continue;
            }
            if *category == AttackCategory::RemoteFileInclusion
                && !normalized.contains(RFI_KEYWORD)
            {
                continue;
            }
            return *category;
        }

        AttackCategory::SecurityPolicyViolation
    }
}

/// 소문자 변환 후 흔한 퍼센트 인코딩 문장부호를 디코딩합니다.
fn normalize(target: &str) -> String {
    let mut out = target.to_lowercase();
    if out.contains('%') {
        for (encoded, decoded) in DECODE_TABLE {
            out = out.replace(encoded, decoded);
        }
    }
    out
}
