// Channel domain model
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

use super::alert::Direction;

/// Pure mapping from a raw device reading to engineering units.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueTransform {
    #[default]
    Identity,
    /// `value = constant - raw`, e.g. an ultrasonic sensor mounted above the
    /// channel floor reporting distance to the water surface.
    LinearInverse { constant: f64 },
    /// Code-only transform. Never read from configuration; written out as a
    /// bare `{"type": "custom"}` tag.
    #[serde(skip_deserializing, serialize_with = "serialize_custom")]
    Custom(Arc<dyn Fn(f64) -> f64 + Send + Sync>),
}

fn serialize_custom<S>(_: &Arc<dyn Fn(f64) -> f64 + Send + Sync>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_unit()
}

impl ValueTransform {
    pub fn apply(&self, raw: f64) -> f64 {
        match self {
            ValueTransform::Identity => raw,
            ValueTransform::LinearInverse { constant } => constant - raw,
            ValueTransform::Custom(f) => f(raw),
        }
    }
}

impl fmt::Debug for ValueTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueTransform::Identity => write!(f, "Identity"),
            ValueTransform::LinearInverse { constant } => {
                write!(f, "LinearInverse {{ constant: {} }}", constant)
            }
            ValueTransform::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}

/// Determines chart treatment only; cleaning is identical for every kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    #[default]
    Gauge,
    Rate,
    Accumulator,
}

/// Discard a fixed block of leading records some devices back-fill after a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadTrim {
    pub count: usize,
    #[serde(default = "default_true")]
    pub only_when_single_day_window: bool,
}

impl LeadTrim {
    pub fn applies_to(&self, single_day_window: bool) -> bool {
        !self.only_when_single_day_window || single_day_window
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JumpFilter {
    pub max_jump: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub id: String,
    pub display_name: String,
    pub endpoint_id: String,
    #[serde(skip_serializing, default)]
    pub access_key: String,
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
    pub jump_filter: Option<JumpFilter>,
    pub lead_trim: Option<LeadTrim>,
}

impl ChannelSpec {
    /// Numeric slot index taken from the selector, `field3` -> `3`.
    pub fn field_index(&self) -> Option<u8> {
        self.field_selector
            .strip_prefix("field")
            .and_then(|n| n.parse().ok())
    }
}

/// Operator edit applied to a channel. Absent fields stay unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelPatch {
    pub display_name: Option<String>,
    pub color: Option<String>,
    pub value_transform: Option<ValueTransform>,
    pub smoothing_enabled: Option<bool>,
    pub is_threshold_subject: Option<bool>,
    pub alert_direction: Option<Direction>,
    pub default_threshold: Option<f64>,
    pub kind: Option<ChannelKind>,
    pub jump_filter: Option<JumpFilter>,
}

impl ChannelSpec {
    pub fn apply_patch(&mut self, patch: ChannelPatch) {
        if let Some(name) = patch.display_name {
            self.display_name = name;
        }
        if let Some(color) = patch.color {
            self.color = Some(color);
        }
        if let Some(transform) = patch.value_transform {
            self.value_transform = transform;
        }
        if let Some(smoothing) = patch.smoothing_enabled {
            self.smoothing_enabled = smoothing;
        }
        if let Some(subject) = patch.is_threshold_subject {
            self.is_threshold_subject = subject;
        }
        if let Some(direction) = patch.alert_direction {
            self.alert_direction = direction;
        }
        if let Some(threshold) = patch.default_threshold {
            self.default_threshold = Some(threshold);
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(filter) = patch.jump_filter {
            self.jump_filter = Some(filter);
        }
    }
}

#[cfg(test)]
pub(crate) fn test_channel(id: &str) -> ChannelSpec {
    ChannelSpec {
        id: id.to_string(),
        display_name: format!("Channel {}", id),
        endpoint_id: "123456".to_string(),
        access_key: "TESTKEY".to_string(),
        field_selector: "field1".to_string(),
        color: None,
        value_transform: ValueTransform::Identity,
        smoothing_enabled: false,
        is_threshold_subject: false,
        alert_direction: Direction::AtOrAbove,
        default_threshold: None,
        kind: ChannelKind::Gauge,
        jump_filter: None,
        lead_trim: None,
    }
}
