// Telemetry data domain models
use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// One record as delivered by the telemetry source, before any parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub timestamp_utc: String,
    pub raw_value: Option<serde_json::Value>,
}

impl RawSample {
    pub fn new(timestamp_utc: impl Into<String>, raw_value: Option<serde_json::Value>) -> Self {
        Self {
            timestamp_utc: timestamp_utc.into(),
            raw_value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanSample {
    pub timestamp_local: DateTime<FixedOffset>,
    pub value: f64,
}

impl CleanSample {
    pub fn new(timestamp_local: DateTime<FixedOffset>, value: f64) -> Self {
        Self {
            timestamp_local,
            value,
        }
    }
}

/// Cleaned samples for one channel, in non-decreasing time order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Series {
    samples: Vec<CleanSample>,
}

impl Series {
    /// Stable sort keeps arrival order among equal timestamps.
    pub fn from_unordered(mut samples: Vec<CleanSample>) -> Self {
        samples.sort_by_key(|s| s.timestamp_local);
        Self { samples }
    }

    pub fn samples(&self) -> &[CleanSample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<CleanSample> {
        self.samples
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_unordered_sorts_and_keeps_tie_order() {
        let t1 = DateTime::parse_from_rfc3339("2024-07-01T10:00:00+05:30").unwrap();
        let t2 = DateTime::parse_from_rfc3339("2024-07-01T10:15:00+05:30").unwrap();

        let series = Series::from_unordered(vec![
            CleanSample::new(t2, 3.0),
            CleanSample::new(t1, 1.0),
            CleanSample::new(t2, 4.0),
        ]);

        assert_eq!(series.values(), vec![1.0, 3.0, 4.0]);
    }
}
