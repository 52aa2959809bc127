//! 평판 소스 trait
//!
//! 외부 평판 서비스 하나를 [`ReputationSource`]로 표현합니다.
//! 집계기는 이종 소스를 `Vec<Arc<dyn ReputationSource>>`로 보관하므로
//! `lookup`은 boxed future를 반환하는 object-safe 형태입니다.

use std::net::IpAddr;
use std::time::Duration;

use serde::Serialize;

use gotchi_core::pipeline::BoxFuture;

use crate::error::ThreatIntelError;

/// HTTP 클라이언트 User-Agent
pub(crate) const USER_AGENT: &str = concat!("gotchi/", env!("CARGO_PKG_VERSION"));

/// 단일 소스의 조회 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceVerdict {
    /// 소스 이름
    pub source: String,
    /// 위협으로 판정했는지 여부
    pub is_threat: bool,
    /// 위협일 때 신뢰도 합산에 더할 가중치 (0-100)
    pub weight: u32,
    /// 사람이 읽는 태그
    pub tags: Vec<String>,
}

impl SourceVerdict {
    /// 위협 정보가 없는 응답
    pub fn clean(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            is_threat: false,
            weight: 0,
            tags: Vec::new(),
        }
    }
}

/// 외부 IP 평판 소스
///
/// 구현체는 HTTP 요청과 응답 해석만 담당합니다.
/// 호출 간격 제한과 타임아웃은 집계기가 `min_interval()`/`timeout()` 값으로 적용합니다.
pub trait ReputationSource: Send + Sync + 'static {
    /// 소스 이름 (태그, 에러 문자열, 메트릭 레이블에 사용)
    fn name(&self) -> &str;

    /// 연속 호출 사이 최소 간격
    fn min_interval(&self) -> Duration;

    /// 조회 타임아웃
    fn timeout(&self) -> Duration;

    /// IP 평판을 조회합니다.
    fn lookup(&self, ip: IpAddr) -> BoxFuture<'_, Result<SourceVerdict, ThreatIntelError>>;
}

/// 소스 공용 HTTP 클라이언트를 생성합니다.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, ThreatIntelError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ThreatIntelError::Config {
            field: "http_client".to_owned(),
            reason: e.to_string(),
        })
}

/// 기본 URL 끝의 `/`를 제거합니다.
pub(crate) fn trim_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_owned()
}

#[cfg(test)]
pub(crate) mod mock {
    //! 집계기 테스트용 스크립트 소스

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// 미리 정한 응답을 반환하고 호출 시각을 기록하는 소스
    pub struct ScriptedSource {
        name: String,
        min_interval: Duration,
        timeout: Duration,
        response: Mutex<Result<SourceVerdict, String>>,
        delay: Duration,
        calls: AtomicUsize,
        call_times: Mutex<Vec<tokio::time::Instant>>,
    }

    impl ScriptedSource {
        pub fn clean(name: &str) -> Self {
            Self::new(name, Ok(SourceVerdict::clean(name)))
        }

        pub fn threat(name: &str, weight: u32, tags: &[&str]) -> Self {
            Self::new(
                name,
                Ok(SourceVerdict {
                    source: name.to_owned(),
                    is_threat: true,
                    weight,
                    tags: tags.iter().map(|t| (*t).to_owned()).collect(),
                }),
            )
        }

        pub fn failing(name: &str, reason: &str) -> Self {
            Self::new(name, Err(reason.to_owned()))
        }

        fn new(name: &str, response: Result<SourceVerdict, String>) -> Self {
            Self {
                name: name.to_owned(),
                min_interval: Duration::ZERO,
                timeout: Duration::from_secs(5),
                response: Mutex::new(response),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                call_times: Mutex::new(Vec::new()),
            }
        }

        pub fn with_min_interval(mut self, interval: Duration) -> Self {
            self.min_interval = interval;
            self
        }

        pub fn with_delay(mut self, delay: Duration, timeout: Duration) -> Self {
            self.delay = delay;
            self.timeout = timeout;
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn call_times(&self) -> Vec<tokio::time::Instant> {
            self.call_times.lock().unwrap().clone()
        }
    }

    impl ReputationSource for ScriptedSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn min_interval(&self) -> Duration {
            self.min_interval
        }

        fn timeout(&self) -> Duration {
            self.timeout
        }

        fn lookup(&self, _ip: IpAddr) -> BoxFuture<'_, Result<SourceVerdict, ThreatIntelError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.call_times
                    .lock()
                    .unwrap()
                    .push(tokio::time::Instant::now());
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                self.response
                    .lock()
                    .unwrap()
                    .clone()
                    .map_err(ThreatIntelError::Http)
            })
        }
    }
}
