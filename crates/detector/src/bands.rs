//! 상태 밴드 -- 지연/손실 임계값으로 네트워크 상태 결정
//!
//! 밴드는 happy → alert → under_attack 순서로 검사되며,
//! `latency < max_latency && loss < max_loss`를 처음 만족하는 밴드가 선택됩니다.
//! 어느 밴드도 만족하지 않으면 [`ThreatState::Stressed`]입니다.

use gotchi_core::config::{BandLimit, BandsConfig};
use gotchi_core::types::ThreatState;

use crate::error::DetectorError;

/// 우선순위 순서가 고정된 상태 밴드
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdBands {
    ordered: [(ThreatState, BandLimit); 3],
}

impl ThresholdBands {
    /// 설정에서 밴드를 생성합니다.
    ///
    /// 상한값이 양수가 아니거나 밴드 순서대로 증가하지 않으면 에러를 반환합니다.
    pub fn from_config(config: &BandsConfig) -> Result<Self, DetectorError> {
        config.validate().map_err(|e| DetectorError::Config {
            field: "bands".to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self::new_unchecked(config))
    }

    fn new_unchecked(config: &BandsConfig) -> Self {
        Self {
            ordered: [
                (ThreatState::Happy, config.happy),
                (ThreatState::Alert, config.alert),
                (ThreatState::UnderAttack, config.under_attack),
            ],
        }
    }

    /// 지연 시간과 손실률에 해당하는 상태를 반환합니다.
    pub fn state_for(&self, latency_ms: f64, packet_loss_pct: f64) -> ThreatState {
        self.ordered
            .iter()
            .find(|(_, band)| {
                latency_ms < band.max_latency_ms && packet_loss_pct < band.max_packet_loss_pct
            })
            .map(|(state, _)| *state)
            .unwrap_or(ThreatState::Stressed)
    }

    /// 우선순위 순서의 (상태, 상한값) 목록
    pub fn iter(&self) -> impl Iterator<Item = &(ThreatState, BandLimit)> {
        self.ordered.iter()
    }
}

impl Default for ThresholdBands {
    fn default() -> Self {
        Self::new_unchecked(&BandsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bands() {
        let bands = ThresholdBands::default();
        assert_eq!(bands.state_for(5.0, 0.0), ThreatState::Happy);
        assert_eq!(bands.state_for(30.0, 0.5), ThreatState::Alert);
        assert_eq!(bands.state_for(120.0, 10.0), ThreatState::UnderAttack);
        assert_eq!(bands.state_for(250.0, 0.0), ThreatState::Stressed);
        assert_eq!(bands.state_for(5.0, 25.0), ThreatState::Stressed);
    }

    #[test]
    fn upper_bound_is_exclusive() {
        let bands = ThresholdBands::default();
        assert_eq!(bands.state_for(10.0, 0.0), ThreatState::Alert);
        assert_eq!(bands.state_for(5.0, 1.0), ThreatState::Alert);
        assert_eq!(bands.state_for(200.0, 0.0), ThreatState::Stressed);
    }

    #[test]
    fn state_is_monotonic_in_each_axis() {
        let bands = ThresholdBands::default();
        let latencies = [0.0, 5.0, 9.9, 10.0, 25.0, 49.9, 50.0, 150.0, 199.9, 200.0, 800.0];
        let losses = [0.0, 0.5, 1.0, 3.0, 5.0, 12.0, 20.0, 60.0, 100.0];

        for &loss in &losses {
            for pair in latencies.windows(2) {
                assert!(bands.state_for(pair[1], loss) >= bands.state_for(pair[0], loss));
            }
        }
        for &latency in &latencies {
            for pair in losses.windows(2) {
                assert!(bands.state_for(latency, pair[1]) >= bands.state_for(latency, pair[0]));
            }
        }
    }

    #[test]
    fn custom_bands_are_used() {
        let config = BandsConfig {
            happy: BandLimit::new(40.0, 4.0),
            ..BandsConfig::default()
        };
        let bands = ThresholdBands::from_config(&config).unwrap();
        assert_eq!(bands.state_for(30.0, 3.0), ThreatState::Happy);
    }

    #[test]
    fn misordered_bands_are_rejected() {
        let config = BandsConfig {
            under_attack: BandLimit::new(20.0, 20.0),
            ..BandsConfig::default()
        };
        assert!(ThresholdBands::from_config(&config).is_err());
    }

    #[test]
    fn iter_preserves_priority_order() {
        let states: Vec<ThreatState> = ThresholdBands::default().iter().map(|(s, _)| *s).collect();
        assert_eq!(
            states,
            vec![ThreatState::Happy, ThreatState::Alert, ThreatState::UnderAttack]
        );
    }
}
