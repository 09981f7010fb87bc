//! Error types for the synchronization client.
//!
//! Every failure that crosses a component boundary is normalized into
//! [`SyncError`]; nothing panics past its boundary and nothing is
//! swallowed. The variants mirror the failure taxonomy of the backend
//! interfaces: transport failures, non-success HTTP statuses, malformed
//! payloads, and dropped realtime channels.

use crate::config::ConfigError;

/// Outcome of one fetch: the decoded payload or a tagged failure.
pub type FetchResult<T> = Result<T, SyncError>;

/// Failure taxonomy for fetches and subscriptions.
///
/// `Clone` is deliberate: a failure may be delivered to several consumers
/// of the same resource key, so causes are carried as rendered strings
/// rather than source errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("subscription channel dropped: {0}")]
    ConnectionDropped(String),
}

impl SyncError {
    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }

    pub fn network(err: impl std::fmt::Display) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Top-level error for the monitor binary.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}
