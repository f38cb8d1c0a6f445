// Series cleaner - Raw records to an ordered series in engineering units
use crate::domain::channel::ChannelSpec;
use crate::domain::error::CleanError;
use crate::domain::telemetry::{CleanSample, RawSample, Series};
use chrono::{DateTime, FixedOffset};
use serde_json::Value;

#[derive(Debug, Clone, Copy)]
pub struct SeriesCleaner {
    display_offset: FixedOffset,
}

impl SeriesCleaner {
    pub fn new(display_offset: FixedOffset) -> Self {
        Self { display_offset }
    }

    /// Clean one channel's raw records.
    ///
    /// Per record, in arrival order: numeric parse, value transform and
    /// timestamp conversion to display time. Any record failing a parse step
    /// is dropped without error. The survivors are stably sorted by time and
    /// only then run through the jump filter, which compares against the last
    /// *accepted* value so one spike never moves the baseline. Device
    /// lead-trim happens before all of that.
    pub fn clean(
        &self,
        channel: &ChannelSpec,
        raw: Vec<RawSample>,
        single_day_window: bool,
    ) -> Result<Series, CleanError> {
        let max_jump = match channel.jump_filter {
            Some(filter) if !filter.max_jump.is_finite() || filter.max_jump < 0.0 => {
                return Err(CleanError::InvalidJumpThreshold {
                    max_jump: filter.max_jump,
                });
            }
            Some(filter) => Some(filter.max_jump),
            None => None,
        };

        let received = raw.len();
        let skip = match channel.lead_trim {
            Some(trim) if trim.applies_to(single_day_window) => trim.count,
            _ => 0,
        };

        let mut unparsed = 0usize;
        let mut parsed = Vec::with_capacity(received.saturating_sub(skip));

        for sample in raw.into_iter().skip(skip) {
            let Some(raw_value) = sample.raw_value.as_ref().and_then(parse_value) else {
                unparsed += 1;
                continue;
            };

            let value = channel.value_transform.apply(raw_value);
            if !value.is_finite() {
                unparsed += 1;
                continue;
            }

            let Some(timestamp_local) = self.to_local(&sample.timestamp_utc) else {
                unparsed += 1;
                continue;
            };

            parsed.push(CleanSample::new(timestamp_local, value));
        }

        let ordered = Series::from_unordered(parsed);
        let mut prev_accepted: Option<f64> = None;
        let mut jumps = 0usize;
        let mut accepted = Vec::with_capacity(ordered.len());

        for sample in ordered.into_samples() {
            if let (Some(limit), Some(prev)) = (max_jump, prev_accepted) {
                if (sample.value - prev).abs() > limit {
                    jumps += 1;
                    continue;
                }
            }

            prev_accepted = Some(sample.value);
            accepted.push(sample);
        }

        tracing::debug!(
            "Cleaned channel {}: {} received, {} lead-trimmed, {} unparseable, {} jump-rejected, {} kept",
            channel.id,
            received,
            skip.min(received),
            unparsed,
            jumps,
            accepted.len()
        );

        Ok(Series::from_unordered(accepted))
    }

    fn to_local(&self, timestamp_utc: &str) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(timestamp_utc.trim())
            .ok()
            .map(|t| t.with_timezone(&self.display_offset))
    }
}

/// Numbers pass through; strings are trimmed and parsed. Anything else,
/// including NaN and infinities, is not a reading.
fn parse_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::telemetry_source::fake::minute_samples;
    use crate::domain::channel::{test_channel, JumpFilter, LeadTrim, ValueTransform};
    use serde_json::json;

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
    }

    fn cleaner() -> SeriesCleaner {
        SeriesCleaner::new(ist())
    }

    fn jump_filtered(max_jump: f64) -> ChannelSpec {
        let mut channel = test_channel("level");
        channel.jump_filter = Some(JumpFilter { max_jump });
        channel
    }

    #[test]
    fn test_jump_filter_compares_against_last_accepted() {
        let raw = minute_samples(&["10", "12", "50", "13"]);
        let series = cleaner().clean(&jump_filtered(20.0), raw, false).unwrap();
        assert_eq!(series.values(), vec![10.0, 12.0, 13.0]);
    }

    #[test]
    fn test_jump_filter_allows_exact_limit() {
        let raw = minute_samples(&["10", "30", "51"]);
        let series = cleaner().clean(&jump_filtered(20.0), raw, false).unwrap();
        assert_eq!(series.values(), vec![10.0, 30.0]);
    }

    #[test]
    fn test_consecutive_accepted_values_within_limit() {
        let raw = minute_samples(&["5", "90", "24", "-3", "26", "44", "70", "45"]);
        let series = cleaner().clean(&jump_filtered(20.0), raw, false).unwrap();
        let values = series.values();
        assert_eq!(values, vec![5.0, 24.0, 26.0, 44.0, 45.0]);
        assert!(values.windows(2).all(|w| (w[1] - w[0]).abs() <= 20.0));
    }

    #[test]
    fn test_no_jump_filter_keeps_spikes() {
        let raw = minute_samples(&["10", "12", "50", "13"]);
        let series = cleaner().clean(&test_channel("rain"), raw, false).unwrap();
        assert_eq!(series.values(), vec![10.0, 12.0, 50.0, 13.0]);
    }

    #[test]
    fn test_non_numeric_values_dropped_without_moving_baseline() {
        let mut raw = minute_samples(&["10", "abc", "", "12"]);
        raw.push(RawSample::new("2024-07-01T00:10:00Z", None));
        raw.push(RawSample::new("2024-07-01T00:11:00Z", Some(Value::Null)));
        raw.push(RawSample::new("2024-07-01T00:12:00Z", Some(json!("NaN"))));
        raw.push(RawSample::new("2024-07-01T00:13:00Z", Some(json!(31.5))));

        let series = cleaner().clean(&jump_filtered(20.0), raw, false).unwrap();
        assert_eq!(series.values(), vec![10.0, 12.0, 31.5]);
    }

    #[test]
    fn test_bad_timestamp_dropped() {
        let raw = vec![
            RawSample::new("2024-07-01T00:00:00Z", Some(json!("1.5"))),
            RawSample::new("yesterday", Some(json!("2.5"))),
            RawSample::new("", Some(json!("3.5"))),
        ];
        let series = cleaner().clean(&test_channel("temp"), raw, false).unwrap();
        assert_eq!(series.values(), vec![1.5]);
    }

    #[test]
    fn test_timestamps_converted_to_display_offset() {
        let raw = vec![RawSample::new("2024-07-01T04:30:00Z", Some(json!(" 7.25 ")))];
        let series = cleaner().clean(&test_channel("temp"), raw, false).unwrap();

        let sample = &series.samples()[0];
        assert_eq!(sample.timestamp_local.to_rfc3339(), "2024-07-01T10:00:00+05:30");
        assert_eq!(sample.value, 7.25);
    }

    #[test]
    fn test_transform_runs_before_jump_filter() {
        // Raw 100 -> 20, raw 95 -> 25, raw 60 -> 60 (jump of 35 rejected), raw 90 -> 30.
        let mut channel = jump_filtered(20.0);
        channel.value_transform = ValueTransform::LinearInverse { constant: 120.0 };

        let raw = minute_samples(&["100", "95", "60", "90"]);
        let series = cleaner().clean(&channel, raw, false).unwrap();
        assert_eq!(series.values(), vec![20.0, 25.0, 30.0]);
    }

    #[test]
    fn test_output_sorted_by_time() {
        let raw = vec![
            RawSample::new("2024-07-01T00:02:00Z", Some(json!("3"))),
            RawSample::new("2024-07-01T00:00:00Z", Some(json!("1"))),
            RawSample::new("2024-07-01T00:01:00Z", Some(json!("2"))),
        ];
        let series = cleaner().clean(&test_channel("flow"), raw, false).unwrap();
        assert_eq!(series.values(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_jump_filter_runs_in_time_order() {
        let raw = vec![
            RawSample::new("2024-07-01T00:02:00Z", Some(json!("10"))),
            RawSample::new("2024-07-01T00:00:00Z", Some(json!("25"))),
            RawSample::new("2024-07-01T00:01:00Z", Some(json!("40"))),
        ];
        let series = cleaner().clean(&jump_filtered(20.0), raw, false).unwrap();

        let values = series.values();
        assert_eq!(values, vec![25.0, 40.0]);
        assert!(values.windows(2).all(|w| (w[1] - w[0]).abs() <= 20.0));
        assert!(series
            .samples()
            .windows(2)
            .all(|w| w[0].timestamp_local <= w[1].timestamp_local));
    }

    #[test]
    fn test_lead_trim_only_for_single_day_window() {
        let mut channel = test_channel("level");
        channel.lead_trim = Some(LeadTrim { count: 2, only_when_single_day_window: true });

        let raw = minute_samples(&["1", "2", "3", "4"]);
        let single_day = cleaner().clean(&channel, raw.clone(), true).unwrap();
        assert_eq!(single_day.values(), vec![3.0, 4.0]);

        let multi_day = cleaner().clean(&channel, raw, false).unwrap();
        assert_eq!(multi_day.values(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_unguarded_lead_trim_longer_than_input() {
        let mut channel = test_channel("level");
        channel.lead_trim = Some(LeadTrim { count: 222, only_when_single_day_window: false });

        let series = cleaner().clean(&channel, minute_samples(&["1", "2"]), false).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn test_empty_input_is_empty_series() {
        let series = cleaner().clean(&test_channel("rain"), Vec::new(), true).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn test_invalid_jump_threshold_is_channel_error() {
        let result = cleaner().clean(&jump_filtered(-1.0), minute_samples(&["1"]), false);
        assert!(matches!(result, Err(CleanError::InvalidJumpThreshold { .. })));

        let result = cleaner().clean(&jump_filtered(f64::NAN), minute_samples(&["1"]), false);
        assert!(result.is_err());
    }
}
