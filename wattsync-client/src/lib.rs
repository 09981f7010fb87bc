//! WATTSYNC client library exports.
//!
//! The synchronization core: a REST fetch client, a polling synchronizer,
//! an event subscription synchronizer, and the shared cache policy layer
//! that governs staleness, eviction, and retries across all of them.

pub mod api_client;
pub mod cache;
pub mod config;
pub mod error;
pub mod poll;
pub mod subscribe;
pub mod watch;

pub use api_client::{Fetcher, RestClient, WsClient};
pub use cache::{spawn_sweeper, AppSignal, CachePolicy, SweeperHandle, SyncCache};
pub use config::ClientConfig;
pub use error::{ClientError, FetchResult, SyncError};
pub use poll::{spawn_poller, PollHandle, PollOptions};
pub use subscribe::{spawn_subscriber, EventSource, SubscriptionHandle};
