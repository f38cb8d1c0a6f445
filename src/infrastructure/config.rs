use crate::application::pipeline::PipelineOptions;
use crate::application::presentation_adapter::ROLLING_SUFFIX;
use crate::domain::alert::Direction;
use crate::domain::channel::{ChannelKind, ChannelSpec, JumpFilter, LeadTrim, ValueTransform};
use chrono::FixedOffset;
use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

use super::csv_export::TIMESTAMP_COLUMN;

pub const DEFAULT_CONFIG_PATH: &str = "config/dashboard";
pub const ENV_PREFIX: &str = "DRAINWATCH";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub display: DisplaySettings,
    pub auth: AuthSettings,
    #[serde(default)]
    pub defaults: PipelineOptions,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetrySettings {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct DisplaySettings {
    /// Display zone as a fixed UTC offset, e.g. `+05:30`.
    pub utc_offset: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            utc_offset: "+00:00".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthSettings {
    pub shared_secret: String,
}

/// Channel as written in configuration. The access key itself never
/// appears here, only the name of the environment variable holding it.
#[derive(Debug, Deserialize, Clone)]
pub struct ChannelConfig {
    pub id: String,
    pub display_name: String,
    pub endpoint_id: String,
    pub access_key_env: String,
    pub field_selector: String,
    pub color: Option<String>,
    #[serde(default)]
    pub value_transform: ValueTransform,
    #[serde(default)]
    pub smoothing_enabled: bool,
    #[serde(default)]
    pub is_threshold_subject: bool,
    #[serde(default)]
    pub alert_direction: Direction,
    pub default_threshold: Option<f64>,
    #[serde(default)]
    pub kind: ChannelKind,
    pub max_jump: Option<f64>,
    pub lead_trim: Option<LeadTrim>,
}

#[derive(Debug, Deserialize)]
struct ChannelsDocument {
    #[serde(default)]
    channels: Vec<ChannelConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("channel {channel}: environment variable {var} with its access key is not set")]
    MissingAccessKey { channel: String, var: String },
    #[error("channel {channel}: field selector {selector:?} is not of the form fieldN")]
    InvalidFieldSelector { channel: String, selector: String },
    #[error("duplicate channel id: {0}")]
    DuplicateChannel(String),
    #[error("channel id {0:?} collides with a derived table column")]
    ReservedChannelId(String),
    #[error("invalid UTC offset {0:?}, expected e.g. +05:30")]
    InvalidUtcOffset(String),
    #[error("invalid channel document: {0}")]
    Document(#[from] toml::de::Error),
}

impl ChannelConfig {
    fn into_spec(self, access_key: String) -> ChannelSpec {
        ChannelSpec {
            id: self.id,
            display_name: self.display_name,
            endpoint_id: self.endpoint_id,
            access_key,
            field_selector: self.field_selector,
            color: self.color,
            value_transform: self.value_transform,
            smoothing_enabled: self.smoothing_enabled,
            is_threshold_subject: self.is_threshold_subject,
            alert_direction: self.alert_direction,
            default_threshold: self.default_threshold,
            kind: self.kind,
            jump_filter: self.max_jump.map(|max_jump| JumpFilter { max_jump }),
            lead_trim: self.lead_trim,
        }
    }
}

pub fn load_app_config() -> anyhow::Result<AppConfig> {
    let path = std::env::var(format!("{}_CONFIG", ENV_PREFIX))
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let settings = config::Config::builder()
        .add_source(config::File::with_name(&path))
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

pub fn parse_utc_offset(offset: &str) -> Result<FixedOffset, ConfigError> {
    offset
        .trim()
        .parse::<FixedOffset>()
        .map_err(|_| ConfigError::InvalidUtcOffset(offset.to_string()))
}

/// Build channel specs, reading each access key through `lookup`.
pub fn resolve_channels<F>(
    configs: Vec<ChannelConfig>,
    lookup: F,
) -> Result<Vec<ChannelSpec>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut seen = HashSet::new();
    let mut specs = Vec::with_capacity(configs.len());

    for config in configs {
        if config.id.ends_with(ROLLING_SUFFIX) || config.id == TIMESTAMP_COLUMN {
            return Err(ConfigError::ReservedChannelId(config.id));
        }
        if !seen.insert(config.id.clone()) {
            return Err(ConfigError::DuplicateChannel(config.id));
        }

        let access_key = lookup(&config.access_key_env).ok_or_else(|| ConfigError::MissingAccessKey {
            channel: config.id.clone(),
            var: config.access_key_env.clone(),
        })?;

        let spec = config.into_spec(access_key);
        if spec.field_index().is_none() {
            return Err(ConfigError::InvalidFieldSelector {
                channel: spec.id,
                selector: spec.field_selector,
            });
        }
        specs.push(spec);
    }

    Ok(specs)
}

pub fn resolve_channels_from_env(configs: Vec<ChannelConfig>) -> Result<Vec<ChannelSpec>, ConfigError> {
    resolve_channels(configs, |var| std::env::var(var).ok())
}

/// Parse a TOML document of `[[channels]]` tables into channel specs.
pub fn channels_from_toml<F>(document: &str, lookup: F) -> Result<Vec<ChannelSpec>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let parsed: ChannelsDocument = toml::from_str(document)?;
    resolve_channels(parsed.channels, lookup)
}
