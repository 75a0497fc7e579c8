//! 로그 파싱 모듈 -- 원시 로그 라인을 보안 이벤트로 변환
//!
//! 각 파서는 core의 [`EventParser`](wafscope_core::pipeline::EventParser) trait을 구현합니다.
//! 현재는 nginx + ModSecurity 감사 로그 형식([`ModSecurityParser`])을 지원합니다.
//!
//! # 사용 예시
//! ```ignore
//! use wafscope_log_pipeline::parser::ModSecurityParser;
//!
//! let parser = ModSecurityParser::new()?;
//! let event = parser.parse_line(line);
//! ```

pub mod modsecurity;

pub use modsecurity::ModSecurityParser;
