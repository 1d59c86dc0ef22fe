/// Standardized deviation of the latest price from the mean of the last `window` prices
///
/// Uses the population standard deviation. Returns `Some(0.0)` when the
/// window has zero variance and `None` below `window` observations.
pub fn calculate_zscore(prices: &[f64], window: usize) -> Option<f64> {
    if window == 0 || prices.len() < window {
        return None;
    }

    let recent = &prices[prices.len() - window..];
    let n = window as f64;

    let mean = recent.iter().sum::<f64>() / n;
    let variance = recent.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 {
        return Some(0.0);
    }

    let latest = *recent.last()?;
    Some((latest - mean) / std_dev)
}
