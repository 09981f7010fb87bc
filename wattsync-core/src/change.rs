//! Realtime change events and filters
//!
//! The realtime channel delivers one [`ChangeEvent`] per row mutation on a
//! subscribed stream. Arrival order is the only ordering guarantee; the
//! source attaches no sequence numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of row mutation carried by a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// One change notification from the realtime channel.
///
/// The payload is the affected row as arbitrary JSON; decoding it into a
/// domain type is the consumer's concern, so events pass through the
/// subscription layer untransformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Table or stream name the mutation applies to.
    pub table: String,
    pub payload: serde_json::Value,
}

/// Filter applied to inbound change events: a stream name plus the set of
/// mutation kinds to accept. An empty kind set accepts every kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub table: String,
    pub kinds: Vec<ChangeKind>,
}

impl EventFilter {
    /// Filter accepting all mutation kinds on `table`.
    pub fn all(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            kinds: Vec::new(),
        }
    }

    /// Filter accepting only inserts on `table`.
    pub fn inserts(table: impl Into<String>) -> Self {
        Self::all(table).with_kind(ChangeKind::Insert)
    }

    pub fn with_kind(mut self, kind: ChangeKind) -> Self {
        if !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
        self
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.table == self.table && (self.kinds.is_empty() || self.kinds.contains(&event.kind))
    }
}
