#![allow(dead_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single point value as produced by a device reader, before scale
/// factors are applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl RawValue {
    pub fn is_numeric(&self) -> bool {
        matches!(self, RawValue::Integer(_) | RawValue::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Integer(value) => Some(*value as f64),
            RawValue::Float(value) => Some(*value),
            RawValue::Text(_) => None,
        }
    }

    /// Integer view with floats truncated toward zero.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RawValue::Integer(value) => Some(*value),
            RawValue::Float(value) => Some(value.trunc() as i64),
            RawValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawValue::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Integer(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Float(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

/// Flat mapping of point name to value, one per poll per device.
pub type RawReading = BTreeMap<String, RawValue>;

/// Reading with scale factors applied: numeric points land in `fields`
/// as physical-unit values, identity strings pass through into `tags`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedReading {
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, f64>,
}

/// The unit of output sent to the metrics sink, one per device per
/// successful poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementRecord {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    /// Milliseconds since the Unix epoch, UTC.
    pub timestamp_ms: u64,
    pub fields: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceKind {
    Inverter,
    Meter,
    Battery,
}

impl DeviceKind {
    pub fn measurement(&self) -> &'static str {
        match self {
            DeviceKind::Inverter => "inverter",
            DeviceKind::Meter => "meter",
            DeviceKind::Battery => "battery",
        }
    }
}

/// Identity points a reading must carry before it yields a record or any
/// publication. Meters additionally report `c_option`, picked up when
/// present.
pub const IDENTITY_FIELDS: [&str; 6] = [
    "c_manufacturer",
    "c_model",
    "c_version",
    "c_serialnumber",
    "c_deviceaddress",
    "c_sunspec_did",
];

/// Protocol bookkeeping points stripped from MQTT state payloads.
pub const PROTOCOL_METADATA_FIELDS: [&str; 4] =
    ["c_did", "c_length", "c_sunspec_did", "c_sunspec_length"];
