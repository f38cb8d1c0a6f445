// Pipeline error taxonomy
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// End date earlier than start date. Fatal to the render; nothing is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("end date {end} is before start date {start}")]
pub struct InvalidRangeError {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FetchError {
    /// Transport-level failure: connect error, timeout or non-2xx status.
    #[error("telemetry source unreachable: {0}")]
    Unreachable(String),
    /// Body was not the expected feed schema.
    #[error("malformed telemetry response: {0}")]
    Malformed(String),
    /// Well-formed response with zero records.
    #[error("no records in the requested window")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CleanError {
    #[error("jump filter threshold must be a finite non-negative number, got {max_jump}")]
    InvalidJumpThreshold { max_jump: f64 },
}

/// Failure confined to a single channel's fetch-clean pass.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(untagged)]
pub enum ChannelError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Clean(#[from] CleanError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    #[error("rolling window must be at least 1")]
    ZeroRollingWindow,
}
