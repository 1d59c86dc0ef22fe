// Technical indicators module
// Implements RSI, z-score, spike detection and support/resistance levels

pub mod levels;
pub mod rsi;
pub mod spike;
pub mod zscore;

pub use levels::{calculate_levels, SupportResistance, LEVELS_LOOKBACK};
pub use rsi::calculate_rsi;
pub use spike::detect_spike;
pub use zscore::calculate_zscore;
