use serde::{Deserialize, Serialize};

/// Number of most recent closes used for support/resistance
pub const LEVELS_LOOKBACK: usize = 20;

/// Support and resistance derived from recent closes
///
/// Both fields are `None` when the history query failed or returned nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SupportResistance {
    pub support: Option<f64>,
    pub resistance: Option<f64>,
}

impl SupportResistance {
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn is_available(&self) -> bool {
        self.support.is_some() && self.resistance.is_some()
    }
}

/// Minimum and maximum of the last `lookback` closes
pub fn calculate_levels(closes: &[f64], lookback: usize) -> SupportResistance {
    let start = closes.len().saturating_sub(lookback);
    let recent = &closes[start..];

    if recent.is_empty() {
        return SupportResistance::unavailable();
    }

    let support = recent.iter().copied().fold(f64::INFINITY, f64::min);
    let resistance = recent.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    SupportResistance {
        support: Some(support),
        resistance: Some(resistance),
    }
}
