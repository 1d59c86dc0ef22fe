use crate::indicators::{calculate_rsi, calculate_zscore, detect_spike};
use crate::models::IndicatorSnapshot;
use serde::Deserialize;

/// Base score before any adjustment
pub const BASE_SCORE: f64 = 50.0;

/// Configuration for indicator computation and scoring
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub window_size: usize,
    /// Expected seconds between ticks. Informational only.
    pub tick_interval_secs: u64,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub zscore_window: usize,
    pub zscore_band: f64,
    pub spike_min_history: usize,
    pub spike_threshold_pct: f64,
    pub adjustment: f64,
    pub spike_penalty: f64,
    /// Alerts fire on scores strictly above this
    pub alert_threshold: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            window_size: 60,
            tick_interval_secs: 5,
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            zscore_window: 30,
            zscore_band: 1.5,
            spike_min_history: 5,
            spike_threshold_pct: 3.0,
            adjustment: 20.0,
            spike_penalty: 10.0,
            alert_threshold: 70.0,
        }
    }
}

impl SignalConfig {
    /// Observations needed before a tick is scored at all
    pub fn warmup_len(&self) -> usize {
        self.rsi_period
    }

    pub fn compute_indicators(&self, prices: &[f64]) -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi: calculate_rsi(prices, self.rsi_period),
            zscore: calculate_zscore(prices, self.zscore_window),
            spike: detect_spike(prices, self.spike_min_history, self.spike_threshold_pct),
        }
    }

    /// Combine indicators into a heuristic alert score
    ///
    /// Starts at 50. Overbought (RSI or z-score) subtracts, oversold adds, a
    /// spike subtracts. The three rules are independent so their order does
    /// not matter. Missing indicators satisfy no threshold. Not clamped.
    pub fn score(&self, rsi: Option<f64>, zscore: Option<f64>, spike: Option<bool>) -> f64 {
        let overbought = matches!(rsi, Some(r) if r > self.rsi_overbought)
            || matches!(zscore, Some(z) if z > self.zscore_band);
        let oversold = matches!(rsi, Some(r) if r < self.rsi_oversold)
            || matches!(zscore, Some(z) if z < -self.zscore_band);
        let spiked = spike == Some(true);

        let mut score = BASE_SCORE;
        if overbought {
            score -= self.adjustment;
        }
        if oversold {
            score += self.adjustment;
        }
        if spiked {
            score -= self.spike_penalty;
        }
        score
    }

    pub fn score_snapshot(&self, snapshot: &IndicatorSnapshot) -> f64 {
        self.score(snapshot.rsi, snapshot.zscore, snapshot.spike)
    }

    pub fn should_alert(&self, score: f64) -> bool {
        score > self.alert_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_reference_cases() {
        let config = SignalConfig::default();

        assert_eq!(config.score(Some(75.0), Some(0.0), Some(false)), 30.0);
        assert_eq!(config.score(Some(20.0), Some(0.0), Some(false)), 70.0);
        assert_eq!(config.score(Some(50.0), Some(0.0), Some(true)), 40.0);
        assert_eq!(config.score(None, None, Some(false)), 50.0);
    }

    #[test]
    fn test_missing_indicators_never_trigger() {
        let config = SignalConfig::default();
        assert_eq!(config.score(None, None, None), 50.0);
        assert_eq!(config.score(None, Some(0.0), None), 50.0);
        assert_eq!(config.score(Some(50.0), None, None), 50.0);
    }

    #[test]
    fn test_conflicting_signals_cancel() {
        let config = SignalConfig::default();
        // RSI overbought, z-score oversold
        assert_eq!(config.score(Some(80.0), Some(-2.0), Some(false)), 50.0);
        // Both oversold counts once
        assert_eq!(config.score(Some(10.0), Some(-2.0), Some(false)), 70.0);
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        let config = SignalConfig::default();
        assert_eq!(config.score(Some(70.0), Some(1.5), None), 50.0);
        assert_eq!(config.score(Some(30.0), Some(-1.5), None), 50.0);
    }

    #[test]
    fn test_default_rules_never_exceed_threshold() {
        let config = SignalConfig::default();
        let mut max = f64::MIN;
        for rsi in [None, Some(10.0), Some(50.0), Some(90.0)] {
            for z in [None, Some(-3.0), Some(0.0), Some(3.0)] {
                for spike in [None, Some(false), Some(true)] {
                    max = max.max(config.score(rsi, z, spike));
                }
            }
        }
        assert_eq!(max, 70.0);
        assert!(!config.should_alert(max));
    }

    #[test]
    fn test_compute_indicators_on_jump() {
        let config = SignalConfig::default();
        let mut prices = vec![100.0; 14];
        prices.push(130.0);

        let snapshot = config.compute_indicators(&prices);
        assert_eq!(snapshot.spike, Some(true));
        assert_eq!(snapshot.rsi, Some(0.0));
        assert_eq!(snapshot.zscore, None);
        assert_eq!(config.score_snapshot(&snapshot), 60.0);
    }
}
