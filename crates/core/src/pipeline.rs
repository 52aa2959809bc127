//! 파이프라인 trait -- 백그라운드 워커의 생명주기 정의
//!
//! 샘플러, 변경 감시자, 분석 루프 등 모든 백그라운드 워커는 [`Pipeline`]을 구현하여
//! `gotchi-daemon`에서 동일한 start/stop/health_check 계약으로 관리됩니다.
//!
//! daemon은 서로 다른 구체 타입을 한 레지스트리에 담아야 하므로
//! object-safe 버전인 [`DynPipeline`]을 함께 제공합니다.
//! `Pipeline`을 구현한 모든 타입은 blanket impl으로 `DynPipeline`이 됩니다.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::error::GotchiError;

/// `Send` boxed future 별칭
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 모듈 헬스 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// 정상 동작
    Healthy,
    /// 동작 중이나 일부 기능 저하
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

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 백그라운드 워커 생명주기 trait
///
/// - `start()`: 워커 태스크를 스폰합니다. 이미 실행 중이면 `PipelineError::AlreadyRunning`.
/// - `stop()`: 취소 신호를 보내고 제한 시간 안에 워커 종료를 기다립니다.
///   실행 중이 아니면 `PipelineError::NotRunning`.
/// - `health_check()`: 현재 헬스 상태를 반환합니다.
pub trait Pipeline: Send + Sync {
    /// 워커를 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), GotchiError>> + Send;

    /// 워커를 정지합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), GotchiError>> + Send;

    /// 헬스 상태를 확인합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// object-safe 파이프라인 trait
///
/// `Box<dyn DynPipeline>`으로 이종 워커를 한 레지스트리에서 관리할 때 사용합니다.
pub trait DynPipeline: Send + Sync {
    /// 워커를 시작합니다.
    fn start(&mut self) -> BoxFuture<'_, Result<(), GotchiError>>;

    /// 워커를 정지합니다.
    fn stop(&mut self) -> BoxFuture<'_, Result<(), GotchiError>>;

    /// 헬스 상태를 확인합니다.
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

impl<T: Pipeline> DynPipeline for T {
    fn start(&mut self) -> BoxFuture<'_, Result<(), GotchiError>> {
        Box::pin(Pipeline::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), GotchiError>> {
        Box::pin(Pipeline::stop(self))
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Pipeline::health_check(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    struct Toggle {
        running: bool,
    }

    impl Pipeline for Toggle {
        async fn start(&mut self) -> Result<(), GotchiError> {
            if self.running {
                return Err(PipelineError::AlreadyRunning.into());
            }
            self.running = true;
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), GotchiError> {
            if !self.running {
                return Err(PipelineError::NotRunning.into());
            }
            self.running = false;
            Ok(())
        }

        async fn health_check(&self) -> HealthStatus {
            if self.running {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy("stopped".to_owned())
            }
        }
    }

    #[test]
    fn health_status_predicates() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Degraded("slow".to_owned()).is_healthy());
        assert!(!HealthStatus::Degraded("slow".to_owned()).is_unhealthy());
        assert!(HealthStatus::Unhealthy("down".to_owned()).is_unhealthy());
    }

    #[test]
    fn health_status_display() {
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
        assert_eq!(
            HealthStatus::Degraded("no gateway".to_owned()).to_string(),
            "degraded: no gateway"
        );
    }

    #[tokio::test]
    async fn dyn_pipeline_delegates_to_pipeline() {
        let mut boxed: Box<dyn DynPipeline> = Box::new(Toggle { running: false });

        boxed.start().await.unwrap();
        assert!(boxed.health_check().await.is_healthy());

        let err = boxed.start().await.unwrap_err();
        assert!(matches!(
            err,
            GotchiError::Pipeline(PipelineError::AlreadyRunning)
        ));

        boxed.stop().await.unwrap();
        assert!(boxed.health_check().await.is_unhealthy());
        assert!(boxed.stop().await.is_err());
    }
}
