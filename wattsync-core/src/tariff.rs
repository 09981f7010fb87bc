//! Tariff types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One pricing period. The backend returns the row whose validity window
/// covers "now" from the latest-tariff endpoint; an open-ended tariff has
/// no `ends_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tariff {
    pub id: Uuid,
    pub price_per_kwh: f64,
    pub currency: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl Tariff {
    /// Whether this tariff is in effect at the given instant.
    pub fn active_at(&self, at: DateTime<Utc>) -> bool {
        at >= self.starts_at && self.ends_at.map_or(true, |end| at < end)
    }
}
