//! 소스별 호출 간격 제한

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// 연속 호출 사이에 최소 간격을 보장하는 게이트
///
/// 잠금을 쥔 채 "대기 후 시각 기록"을 수행하므로 동시에 여러 조회가 들어와도
/// 호출 시작 시각은 항상 `min_interval` 이상 벌어집니다.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// 새 게이트를 생성합니다.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// 최소 간격
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// 호출 가능 시점까지 기다린 뒤 호출 시각을 기록합니다.
    pub async fn acquire(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let ready_at = last + self.min_interval;
            if Instant::now() < ready_at {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}
