//! The telemetry reading flowing through every transport.

use serde::{Deserialize, Serialize};

/// Opaque device identifier.
///
/// Producers send either a JSON number or a JSON string. The value is
/// carried through mutation verbatim and never interpreted; numbers keep
/// their original textual form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceId {
    Number(serde_json::Number),
    Text(String),
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for DeviceId {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

/// One device telemetry sample.
///
/// The wire form uses `time` for the timestamp field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub device_id: DeviceId,
    #[serde(rename = "time")]
    pub timestamp: i64,
    pub temperature: f64,
    pub humidity: f64,
}

impl Reading {
    /// Decode a reading from a JSON payload.
    pub fn from_json(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Encode the reading as JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
