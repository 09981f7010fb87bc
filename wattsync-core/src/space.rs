//! Space (site/zone) types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A monitored space: a site, building, or zone within one. Spaces form a
/// hierarchy via `parent_id`; root spaces have none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Space {
    pub id: Uuid,
    pub name: String,
    /// Free-form space category as stored by the backend
    /// (e.g. "site", "building", "floor").
    pub kind: Option<String>,
    pub parent_id: Option<Uuid>,
}

impl Space {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
