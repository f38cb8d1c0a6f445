// Source trait for remote telemetry access
use crate::domain::channel::ChannelSpec;
use crate::domain::error::FetchError;
use crate::domain::telemetry::RawSample;
use crate::domain::window::TimeWindow;
use async_trait::async_trait;

#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Read one channel's records for the window, in arrival order.
    ///
    /// A single attempt: callers never retry, the next render is the retry.
    /// `max_results` caps the record count when the source supports it.
    async fn fetch(
        &self,
        channel: &ChannelSpec,
        window: &TimeWindow,
        max_results: Option<u32>,
    ) -> Result<Vec<RawSample>, FetchError>;
}
