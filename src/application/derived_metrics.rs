// Derived metrics - Rolling mean and threshold evaluation
use crate::domain::alert::{AlertEvent, Direction};
use crate::domain::telemetry::Series;

/// Trailing mean with a window that shrinks at the start of the series:
/// output `i` is the mean of the last `min(i + 1, window)` values.
///
/// `window` must be at least 1; 0 is treated as 1.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &values[start..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Most recent sample on the unsafe side of `threshold`, as an alert.
///
/// Recency matters operationally, so this is the last qualifying sample,
/// not the first or the most extreme.
pub fn evaluate_threshold(
    channel_id: &str,
    series: &Series,
    threshold: f64,
    direction: Direction,
) -> Option<AlertEvent> {
    series
        .samples()
        .iter()
        .rev()
        .find(|s| direction.is_breached(s.value, threshold))
        .map(|s| AlertEvent {
            channel_id: channel_id.to_string(),
            value: s.value,
            timestamp_local: s.timestamp_local,
            threshold_value: threshold,
            direction,
        })
}
