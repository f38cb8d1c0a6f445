// Presentation adapter - Reshapes cleaned series for charts and export
use crate::domain::channel::{ChannelKind, ChannelSpec};
use crate::domain::table::{CombinedTable, CombinedTableBuilder};
use crate::domain::telemetry::Series;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// One successfully processed channel, as seen by the adapter.
#[derive(Debug, Clone, Copy)]
pub struct ChannelView<'a> {
    pub channel: &'a ChannelSpec,
    pub series: &'a Series,
    /// Aligned with `series`; present when smoothing is enabled.
    pub rolling: Option<&'a [f64]>,
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceVariant {
    Raw,
    Rolling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStyle {
    Line,
    Bar,
    StepArea,
}

impl From<ChannelKind> for TraceStyle {
    fn from(kind: ChannelKind) -> Self {
        match kind {
            ChannelKind::Gauge => TraceStyle::Line,
            ChannelKind::Rate => TraceStyle::Bar,
            ChannelKind::Accumulator => TraceStyle::StepArea,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TracePoint {
    pub time: DateTime<FixedOffset>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartTrace {
    pub id: String,
    pub channel_id: String,
    pub name: String,
    pub color: Option<String>,
    pub variant: TraceVariant,
    pub style: TraceStyle,
    pub points: Vec<TracePoint>,
}

/// Horizontal line drawn at a channel's alert threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdMarker {
    pub channel_id: String,
    pub name: String,
    pub value: f64,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSpec {
    pub traces: Vec<ChartTrace>,
    pub markers: Vec<ThresholdMarker>,
}

/// Suffix of the derived rolling-mean column; channel ids may not end in it.
pub const ROLLING_SUFFIX: &str = "_rolling";

pub fn rolling_column_name(channel_id: &str) -> String {
    format!("{}{}", channel_id, ROLLING_SUFFIX)
}

/// Outer join of every channel's series, plus rolling columns when shown.
pub fn build_combined_table(views: &[ChannelView<'_>], show_rolling: bool) -> CombinedTable {
    let mut builder = CombinedTableBuilder::new();

    for view in views {
        builder.add_column(
            view.channel.id.clone(),
            view.series
                .samples()
                .iter()
                .map(|s| (s.timestamp_local, s.value)),
        );

        if let (true, Some(rolling)) = (show_rolling, view.rolling) {
            builder.add_column(
                rolling_column_name(&view.channel.id),
                view.series
                    .samples()
                    .iter()
                    .zip(rolling)
                    .map(|(s, mean)| (s.timestamp_local, *mean)),
            );
        }
    }

    builder.build()
}

pub fn build_chart(views: &[ChannelView<'_>], show_raw: bool, show_rolling: bool) -> ChartSpec {
    let mut chart = ChartSpec::default();

    for view in views {
        let channel = view.channel;

        if show_raw {
            chart.traces.push(ChartTrace {
                id: channel.id.clone(),
                channel_id: channel.id.clone(),
                name: channel.display_name.clone(),
                color: channel.color.clone(),
                variant: TraceVariant::Raw,
                style: channel.kind.into(),
                points: view
                    .series
                    .samples()
                    .iter()
                    .map(|s| TracePoint {
                        time: s.timestamp_local,
                        value: s.value,
                    })
                    .collect(),
            });
        }

        if let (true, Some(rolling)) = (show_rolling, view.rolling) {
            chart.traces.push(ChartTrace {
                id: rolling_column_name(&channel.id),
                channel_id: channel.id.clone(),
                name: format!("{} (rolling mean)", channel.display_name),
                color: channel.color.clone(),
                variant: TraceVariant::Rolling,
                style: TraceStyle::Line,
                points: view
                    .series
                    .samples()
                    .iter()
                    .zip(rolling)
                    .map(|(s, mean)| TracePoint {
                        time: s.timestamp_local,
                        value: *mean,
                    })
                    .collect(),
            });
        }

        if let Some(value) = view.threshold {
            chart.markers.push(ThresholdMarker {
                channel_id: channel.id.clone(),
                name: format!("{} threshold", channel.display_name),
                value,
                color: channel.color.clone(),
            });
        }
    }

    chart
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::channel::test_channel;
    use crate::domain::telemetry::CleanSample;

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn test_table_outer_join_across_channels() {
        let (t1, t2, t3) = (
            ts("2024-07-01T10:00:00+05:30"),
            ts("2024-07-01T10:01:00+05:30"),
            ts("2024-07-01T10:02:00+05:30"),
        );
        let a = test_channel("a");
        let b = test_channel("b");
        let series_a = Series::from_unordered(vec![CleanSample::new(t1, 1.0), CleanSample::new(t3, 3.0)]);
        let series_b = Series::from_unordered(vec![CleanSample::new(t2, 2.0), CleanSample::new(t3, 4.0)]);

        let views = [
            ChannelView { channel: &a, series: &series_a, rolling: None, threshold: None },
            ChannelView { channel: &b, series: &series_b, rolling: None, threshold: None },
        ];
        let table = build_combined_table(&views, true);

        assert_eq!(table.rows().len(), 3);
        assert_eq!(table.cell(&t2, "a"), None);
        assert_eq!(table.cell(&t1, "b"), None);
        assert_eq!(table.cell(&t3, "a"), Some(3.0));
        assert_eq!(table.cell(&t3, "b"), Some(4.0));
    }

    #[test]
    fn test_rolling_column_follows_toggle() {
        let t1 = ts("2024-07-01T10:00:00+05:30");
        let channel = test_channel("level");
        let series = Series::from_unordered(vec![CleanSample::new(t1, 8.0)]);
        let rolling = [8.0];
        let views = [ChannelView { channel: &channel, series: &series, rolling: Some(&rolling), threshold: None }];

        let shown = build_combined_table(&views, true);
        assert_eq!(shown.columns(), &["level".to_string(), "level_rolling".to_string()]);

        let hidden = build_combined_table(&views, false);
        assert_eq!(hidden.columns(), &["level".to_string()]);
    }

    #[test]
    fn test_chart_traces_per_toggle_and_marker() {
        let t1 = ts("2024-07-01T10:00:00+05:30");
        let mut rain = test_channel("rain");
        rain.kind = ChannelKind::Rate;
        let series = Series::from_unordered(vec![CleanSample::new(t1, 2.5)]);
        let rolling = [2.5];
        let views = [ChannelView { channel: &rain, series: &series, rolling: Some(&rolling), threshold: Some(30.0) }];

        let chart = build_chart(&views, true, true);
        assert_eq!(chart.traces.len(), 2);
        assert_eq!(chart.traces[0].variant, TraceVariant::Raw);
        assert_eq!(chart.traces[0].style, TraceStyle::Bar);
        assert_eq!(chart.traces[1].variant, TraceVariant::Rolling);
        assert_eq!(chart.traces[1].style, TraceStyle::Line);
        assert_eq!(chart.markers.len(), 1);
        assert_eq!(chart.markers[0].value, 30.0);

        let raw_only = build_chart(&views, true, false);
        assert_eq!(raw_only.traces.len(), 1);

        let nothing = build_chart(&views, false, false);
        assert!(nothing.traces.is_empty());
        assert_eq!(nothing.markers.len(), 1);
    }

    #[test]
    fn test_kind_maps_to_trace_style() {
        assert_eq!(TraceStyle::from(ChannelKind::Gauge), TraceStyle::Line);
        assert_eq!(TraceStyle::from(ChannelKind::Accumulator), TraceStyle::StepArea);
    }
}
