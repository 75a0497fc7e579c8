//! 파이프라인 trait: 모듈 생명주기와 확장 포인트 정의
//!
//! - [`Pipeline`]: 데몬이 관리하는 모듈의 시작/정지/상태 확인
//! - [`DynPipeline`]: `Vec<Box<dyn DynPipeline>>`으로 다루기 위한 dyn-compatible 버전
//! - [`EventParser`]: 원시 로그 라인을 [`SecurityEvent`]로 변환
//! - [`EventNotifier`]: 새 이벤트가 저장되었음을 하위 모듈에 알림

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::error::WafscopeError;
use crate::types::SecurityEvent;

/// `Send` 가능한 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 모듈 건강 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 성능 저하
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// 모듈 생명주기 trait
///
/// 데몬은 이 trait을 통해 각 모듈을 같은 방식으로 시작/정지합니다.
pub trait Pipeline: Send + Sync {
    /// 모듈을 시작합니다. 이미 실행 중이면 에러를 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), WafscopeError>> + Send;

    /// 모듈을 정지하고 백그라운드 태스크가 끝날 때까지 기다립니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), WafscopeError>> + Send;

    /// 현재 건강 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// dyn-compatible 파이프라인 trait
///
/// `Pipeline`은 RPITIT를 사용하므로 `dyn Pipeline`이 불가합니다.
pub trait DynPipeline: Send + Sync {
    /// 모듈을 시작합니다.
    fn start(&mut self) -> BoxFuture<'_, Result<(), WafscopeError>>;

    /// 모듈을 정지합니다.
    fn stop(&mut self) -> BoxFuture<'_, Result<(), WafscopeError>>;

    /// 건강 상태를 확인합니다.
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

/// Pipeline을 구현한 타입은 자동으로 DynPipeline도 구현됩니다.
impl<T: Pipeline> DynPipeline for T {
    fn start(&mut self) -> BoxFuture<'_, Result<(), WafscopeError>> {
        Box::pin(Pipeline::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), WafscopeError>> {
        Box::pin(Pipeline::stop(self))
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Pipeline::health_check(self))
    }
}

/// 로그 파서 trait
///
/// 한 줄을 받아 보안 이벤트이면 `Some`, 아니면 `None`을 반환합니다.
/// 이벤트가 아닌 라인은 에러가 아닙니다 (대부분의 로그 트래픽이 여기에 해당).
pub trait EventParser: Send + Sync {
    /// 지원하는 로그 형식 이름
    fn format_name(&self) -> &str;

    /// 원시 로그 라인을 이벤트로 변환
    fn parse(&self, line: &str) -> Option<SecurityEvent>;
}

/// 새 이벤트 알림 trait
///
/// 수집 루프는 저장소에 새로 추가한 이벤트마다 한 번 호출합니다.
/// 구현체는 호출자를 블로킹해서는 안 됩니다.
pub trait EventNotifier: Send + Sync {
    /// 새로 저장된 이벤트를 전달합니다.
    fn on_new_event(&self, event: &SecurityEvent);
}

/// 알림을 버리는 notifier (구독자 허브가 없는 구성용)
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl EventNotifier for NoopNotifier {
    fn on_new_event(&self, _event: &SecurityEvent) {}
}
