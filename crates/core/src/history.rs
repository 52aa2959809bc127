//! 고정 용량 FIFO 히스토리
//!
//! [`RollingHistory`]는 용량을 넘으면 가장 오래된 값을 버리는 링 버퍼입니다.
//! 샘플러의 지연/손실 윈도우와 기준선 풀, 분류기의 점수 히스토리가 사용합니다.

use std::collections::VecDeque;

/// 고정 용량 FIFO 히스토리
///
/// 불변식: `len() <= capacity()`
#[derive(Debug, Clone, PartialEq)]
pub struct RollingHistory<T> {
    values: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingHistory<T> {
    /// 지정한 용량으로 빈 히스토리를 생성합니다.
    ///
    /// 용량 0은 1로 보정합니다.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// 값을 추가합니다. 가득 찬 경우 가장 오래된 값을 제거합니다.
    pub fn push(&mut self, value: T) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// 모든 값을 제거합니다.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// 저장된 값 개수
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 최대 용량
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 가장 최근 값
    pub fn latest(&self) -> Option<&T> {
        self.values.back()
    }

    /// 오래된 순서로 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }
}

impl<T: Clone> RollingHistory<T> {
    /// 오래된 순서의 복사본을 반환합니다.
    pub fn to_vec(&self) -> Vec<T> {
        self.values.iter().cloned().collect()
    }
}

impl RollingHistory<f64> {
    /// 산술 평균. 비어 있으면 0.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// 중앙값. 짝수 개면 가운데 두 값의 평균, 비어 있으면 0.
    pub fn median(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.values.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    }
}
