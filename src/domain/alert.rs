// Threshold alert domain model
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Which side of the threshold is unsafe for a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Minimum-safe-level channels: alert while `value < threshold`.
    Below,
    /// Flood/overflow channels: alert while `value >= threshold`.
    #[default]
    AtOrAbove,
}

impl Direction {
    pub fn is_breached(&self, value: f64, threshold: f64) -> bool {
        match self {
            Direction::Below => value < threshold,
            Direction::AtOrAbove => value >= threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub channel_id: String,
    pub value: f64,
    pub timestamp_local: DateTime<FixedOffset>,
    pub threshold_value: f64,
    pub direction: Direction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_or_above_includes_threshold() {
        assert!(Direction::AtOrAbove.is_breached(10.0, 10.0));
        assert!(Direction::AtOrAbove.is_breached(10.5, 10.0));
        assert!(!Direction::AtOrAbove.is_breached(9.99, 10.0));
    }

    #[test]
    fn test_below_excludes_threshold() {
        assert!(Direction::Below.is_breached(9.0, 10.0));
        assert!(!Direction::Below.is_breached(10.0, 10.0));
    }
}
