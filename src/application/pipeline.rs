// Fetch-clean-derive pipeline - One fresh run per render
use crate::application::derived_metrics::{evaluate_threshold, rolling_mean};
use crate::application::presentation_adapter::{
    build_chart, build_combined_table, ChannelView, ChartSpec,
};
use crate::application::series_cleaner::SeriesCleaner;
use crate::application::telemetry_source::TelemetrySource;
use crate::domain::alert::AlertEvent;
use crate::domain::channel::ChannelSpec;
use crate::domain::error::{ChannelError, FetchError, InvalidRangeError, OptionsError};
use crate::domain::table::CombinedTable;
use crate::domain::telemetry::Series;
use crate::domain::window::{DateRange, TimeWindow};
use chrono::FixedOffset;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use thiserror::Error;

pub const DEFAULT_ROLLING_WINDOW: usize = 5;

/// User-chosen render settings owned by the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOptions {
    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,
    #[serde(default = "default_true")]
    pub show_raw: bool,
    #[serde(default = "default_true")]
    pub show_rolling: bool,
    /// Per-channel overrides of `ChannelSpec::default_threshold`.
    #[serde(default)]
    pub thresholds: HashMap<String, f64>,
    pub max_results: Option<u32>,
}

fn default_rolling_window() -> usize {
    DEFAULT_ROLLING_WINDOW
}

fn default_true() -> bool {
    true
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            rolling_window: DEFAULT_ROLLING_WINDOW,
            show_raw: true,
            show_rolling: true,
            thresholds: HashMap::new(),
            max_results: None,
        }
    }
}

impl PipelineOptions {
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.rolling_window == 0 {
            return Err(OptionsError::ZeroRollingWindow);
        }
        Ok(())
    }

    /// Active threshold for a channel, or `None` if it is not alertable.
    pub fn threshold_for(&self, channel: &ChannelSpec) -> Option<f64> {
        if !channel.is_threshold_subject {
            return None;
        }
        self.thresholds
            .get(&channel.id)
            .copied()
            .or(channel.default_threshold)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    InvalidRange(#[from] InvalidRangeError),
    #[error(transparent)]
    InvalidOptions(#[from] OptionsError),
}

/// Exactly one outcome per channel per run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChannelStatus {
    Loaded { count: usize },
    NoData,
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub series: BTreeMap<String, Series>,
    pub rolling_means: BTreeMap<String, Vec<f64>>,
    pub alerts: Vec<AlertEvent>,
    pub combined_table: CombinedTable,
    pub errors: BTreeMap<String, ChannelError>,
    pub statuses: BTreeMap<String, ChannelStatus>,
    pub charts: ChartSpec,
}

/// Run one full render: resolve the window, fetch every channel, clean,
/// derive metrics and reshape for presentation.
///
/// An invalid range or options fails before anything is fetched. Channel
/// failures never fail the run; they show up in `errors` and `statuses`.
pub async fn run_pipeline(
    source: &dyn TelemetrySource,
    channels: &[ChannelSpec],
    range: DateRange,
    options: &PipelineOptions,
    display_offset: FixedOffset,
) -> Result<PipelineReport, PipelineError> {
    options.validate()?;
    let window = range.resolve(display_offset)?;
    let started = Instant::now();
    let cleaner = SeriesCleaner::new(display_offset);

    let outcomes = join_all(
        channels
            .iter()
            .map(|channel| process_channel(source, &cleaner, channel, &window, options.max_results)),
    )
    .await;

    let mut series = BTreeMap::new();
    let mut rolling_means = BTreeMap::new();
    let mut alerts = Vec::new();
    let mut errors = BTreeMap::new();
    let mut statuses = BTreeMap::new();
    let mut loaded: Vec<&ChannelSpec> = Vec::new();

    for (channel, outcome) in channels.iter().zip(outcomes) {
        let cleaned = match outcome {
            Ok(cleaned) => cleaned,
            Err(ChannelError::Fetch(FetchError::Empty)) => Series::default(),
            Err(err) => {
                tracing::warn!("Channel {} failed: {}", channel.id, err);
                statuses.insert(
                    channel.id.clone(),
                    ChannelStatus::Failed {
                        message: err.to_string(),
                    },
                );
                errors.insert(channel.id.clone(), err);
                continue;
            }
        };

        let status = if cleaned.is_empty() {
            ChannelStatus::NoData
        } else {
            ChannelStatus::Loaded {
                count: cleaned.len(),
            }
        };
        statuses.insert(channel.id.clone(), status);

        if channel.smoothing_enabled {
            rolling_means.insert(
                channel.id.clone(),
                rolling_mean(&cleaned.values(), options.rolling_window),
            );
        }

        if let Some(threshold) = options.threshold_for(channel) {
            if let Some(alert) =
                evaluate_threshold(&channel.id, &cleaned, threshold, channel.alert_direction)
            {
                alerts.push(alert);
            }
        }

        series.insert(channel.id.clone(), cleaned);
        loaded.push(channel);
    }

    let views: Vec<ChannelView<'_>> = loaded
        .iter()
        .copied()
        .filter_map(|channel| {
            Some(ChannelView {
                channel,
                series: series.get(&channel.id)?,
                rolling: rolling_means.get(&channel.id).map(Vec::as_slice),
                threshold: options.threshold_for(channel),
            })
        })
        .collect();

    let combined_table = build_combined_table(&views, options.show_rolling);
    let charts = build_chart(&views, options.show_raw, options.show_rolling);

    tracing::debug!(
        "Pipeline finished in {} ms: {} channels, {} loaded, {} failed, {} alerts",
        started.elapsed().as_millis(),
        channels.len(),
        series.len(),
        errors.len(),
        alerts.len()
    );

    Ok(PipelineReport {
        series,
        rolling_means,
        alerts,
        combined_table,
        errors,
        statuses,
        charts,
    })
}

async fn process_channel(
    source: &dyn TelemetrySource,
    cleaner: &SeriesCleaner,
    channel: &ChannelSpec,
    window: &TimeWindow,
    max_results: Option<u32>,
) -> Result<Series, ChannelError> {
    let raw = source.fetch(channel, window, max_results).await?;
    let cleaned = cleaner.clean(channel, raw, window.single_day)?;
    Ok(cleaned)
}
