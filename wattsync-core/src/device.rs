//! Device identity and status types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a monitored device.
///
/// Device ids are backend-assigned opaque strings (e.g. `"dev-42"`); they
/// are never parsed, only compared and forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Reported operational state of a device.
///
/// The backend reports free-form status strings; anything outside the
/// known set decodes as [`DeviceState::Unknown`] rather than failing the
/// whole reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    Online,
    Offline,
    Fault,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceState::Online => "online",
            DeviceState::Offline => "offline",
            DeviceState::Fault => "fault",
            DeviceState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Latest known status of one device, as returned by the device-status
/// endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatusReading {
    pub device_id: DeviceId,
    pub state: DeviceState,
    /// Instantaneous power draw or output in watts.
    pub power_w: f64,
    /// Cumulative energy for the current day, when the device meters it.
    pub energy_today_kwh: Option<f64>,
    pub last_seen: Option<DateTime<Utc>>,
}
