//! Resource keys
//!
//! A [`ResourceKey`] scopes a fetch or subscription to one logical
//! resource. Keys are stable for the lifetime of a synchronizer instance
//! and serve as cache keys; two synchronizers polling the same key share
//! one cache entry.

use crate::DeviceId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKey {
    /// Live status of one device.
    DeviceStatus(DeviceId),
    /// The alert list.
    Alerts,
    /// The tariff currently in effect.
    LatestTariff,
    /// The space hierarchy.
    Spaces,
}

impl ResourceKey {
    /// REST endpoint path serving this resource, relative to the API base.
    pub fn endpoint(&self) -> String {
        match self {
            ResourceKey::DeviceStatus(device_id) => format!("devices/{}/status", device_id),
            ResourceKey::Alerts => "alerts".to_string(),
            ResourceKey::LatestTariff => "tariffs/latest".to_string(),
            ResourceKey::Spaces => "spaces".to_string(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::DeviceStatus(device_id) => write!(f, "device-status:{}", device_id),
            ResourceKey::Alerts => f.write_str("alerts"),
            ResourceKey::LatestTariff => f.write_str("latest-tariff"),
            ResourceKey::Spaces => f.write_str("spaces"),
        }
    }
}
