//! 대체 소스 -- 주 소스가 불가하면 대체 소스를 폴링
//!
//! 주 소스는 매 폴링마다 먼저 시도됩니다. 주 소스가 회복되면 대체 소스는 더 이상 쓰이지 않습니다.

use wafscope_core::pipeline::BoxFuture;

use super::LogSource;
use crate::error::LogPipelineError;

/// 주/대체 소스 조합
pub struct FallbackSource {
    primary: Box<dyn LogSource>,
    fallback: Box<dyn LogSource>,
    name: String,
    /// 직전 폴링에서 대체 소스를 사용했는지 여부 (로그 중복 방지)
    using_fallback: bool,
}

impl FallbackSource {
    /// 새 대체 소스를 생성합니다.
    pub fn new(primary: Box<dyn LogSource>, fallback: Box<dyn LogSource>) -> Self {
        Self {
            name: format!("{}|{}", primary.name(), fallback.name()),
            primary,
            fallback,
            using_fallback: false,
        }
    }

    async fn poll_with_fallback(&mut self) -> Result<Vec<String>, LogPipelineError> {
        match self.primary.poll().await {
            Ok(lines) => {
                if self.using_fallback {
                    tracing::info!(source = self.primary.name(), "primary log source recovered");
                    self.using_fallback = false;
                }
                Ok(lines)
            }
            Err(e) => {
                if !self.using_fallback {
                    tracing::warn!(
                        source = self.primary.name(),
                        fallback = self.fallback.name(),
                        error = %e,
                        "primary log source unavailable, using fallback"
                    );
                    self.using_fallback = true;
                }
                self.fallback.poll().await
            }
        }
    }
}

impl LogSource for FallbackSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll(&mut self) -> BoxFuture<'_, Result<Vec<String>, LogPipelineError>> {
        Box::pin(self.poll_with_fallback())
    }
}
