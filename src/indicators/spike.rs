/// Detect an abrupt single-step move
///
/// Compares the two most recent prices. Returns `Some(true)` when the absolute
/// percentage change exceeds `threshold_pct`, `None` below `min_history`
/// observations or when the previous price is zero.
pub fn detect_spike(prices: &[f64], min_history: usize, threshold_pct: f64) -> Option<bool> {
    if prices.len() < min_history.max(2) {
        return None;
    }

    let latest = prices[prices.len() - 1];
    let previous = prices[prices.len() - 2];
    if previous == 0.0 {
        return None;
    }

    let pct_change = (latest - previous) / previous * 100.0;
    Some(pct_change.abs() > threshold_pct)
}
