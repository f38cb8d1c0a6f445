// ThingSpeak-style feed client
use crate::application::telemetry_source::TelemetrySource;
use crate::domain::channel::ChannelSpec;
use crate::domain::error::FetchError;
use crate::domain::telemetry::RawSample;
use crate::domain::window::TimeWindow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ThingSpeakRepository {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    feeds: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl ThingSpeakRepository {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn build_feed_url(
        &self,
        channel: &ChannelSpec,
        window: &TimeWindow,
        max_results: Option<u32>,
    ) -> Result<String, FetchError> {
        let field = channel.field_index().ok_or_else(|| {
            FetchError::Malformed(format!("invalid field selector {:?}", channel.field_selector))
        })?;

        let mut url = format!(
            "{}/channels/{}/fields/{}.json?api_key={}&start={}&end={}",
            self.base_url,
            urlencoding::encode(&channel.endpoint_id),
            field,
            urlencoding::encode(&channel.access_key),
            urlencoding::encode(&iso_utc(&window.start_utc)),
            urlencoding::encode(&iso_utc(&window.end_utc)),
        );
        if let Some(results) = max_results {
            url.push_str(&format!("&results={}", results));
        }
        Ok(url)
    }

    async fn execute_fetch(&self, url: &str) -> Result<FeedResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Unreachable(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Unreachable(format!("HTTP status {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Unreachable(e.without_url().to_string()))?;

        serde_json::from_str::<FeedResponse>(&body).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

fn iso_utc(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[async_trait]
impl TelemetrySource for ThingSpeakRepository {
    async fn fetch(
        &self,
        channel: &ChannelSpec,
        window: &TimeWindow,
        max_results: Option<u32>,
    ) -> Result<Vec<RawSample>, FetchError> {
        let url = self.build_feed_url(channel, window, max_results)?;
        tracing::debug!(
            "Fetching channel {} from endpoint {} ({} .. {})",
            channel.id,
            channel.endpoint_id,
            window.start_utc,
            window.end_utc
        );

        let response = self.execute_fetch(&url).await?;
        if response.feeds.is_empty() {
            return Err(FetchError::Empty);
        }

        let samples: Vec<RawSample> = response
            .feeds
            .into_iter()
            .map(|mut feed| {
                let timestamp = feed
                    .get("created_at")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                RawSample::new(timestamp, feed.remove(&channel.field_selector))
            })
            .collect();

        tracing::debug!("Fetched {} records for channel {}", samples.len(), channel.id);
        Ok(samples)
    }
}
