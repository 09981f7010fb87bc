//! Cache Policy Layer
//!
//! A process-wide cache shared by all fetch-based synchronizers. The
//! policy is read-only after construction; cache entries are the only
//! mutable shared state, and the at-most-one-in-flight-per-key rule in
//! the polling layer keeps entry writes confined to the synchronizer that
//! owns the in-flight fetch for that key.
//!
//! The cache is passed around as an explicit `Arc<SyncCache>` dependency,
//! never looked up through a global.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use wattsync_core::ResourceKey;

/// Process-wide cache defaults. Individual pollers may override the
/// staleness window and retry count per key via `PollOptions`.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// Data younger than this is served from cache without a refetch.
    pub stale_time: Duration,
    /// Entries older than this, with no active consumer, are purged.
    pub eviction_time: Duration,
    /// Automatic retries on failure before a failure is surfaced.
    pub retry_count: u32,
    pub refetch_on_focus: bool,
    pub refetch_on_reconnect: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(30),
            eviction_time: Duration::from_secs(300),
            retry_count: 1,
            refetch_on_focus: true,
            refetch_on_reconnect: true,
        }
    }
}

impl CachePolicy {
    /// Whether the given application signal should trigger a background
    /// refetch under this policy.
    pub fn honors(&self, signal: AppSignal) -> bool {
        match signal {
            AppSignal::FocusRegained => self.refetch_on_focus,
            AppSignal::Reconnected => self.refetch_on_reconnect,
        }
    }
}

/// Application-level signals forwarded by the embedding application.
/// Eviction and refetch are driven only by time, consumer count, and
/// these signals; never by memory pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppSignal {
    FocusRegained,
    Reconnected,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    fetched_at: Instant,
    stale: bool,
}

/// Shared cache of last-known fetch results, keyed by [`ResourceKey`].
///
/// Failures are never stored; a stale success is more useful to a
/// consumer than a cached failure.
#[derive(Debug)]
pub struct SyncCache {
    policy: CachePolicy,
    entries: DashMap<ResourceKey, CacheEntry>,
    consumers: DashMap<ResourceKey, usize>,
    signals: broadcast::Sender<AppSignal>,
}

impl SyncCache {
    pub fn new(policy: CachePolicy) -> Self {
        let (signals, _) = broadcast::channel(16);
        Self {
            policy,
            entries: DashMap::new(),
            consumers: DashMap::new(),
            signals,
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// The cached value for `key` if it is younger than the policy's
    /// staleness window and not flagged stale.
    pub fn fresh(&self, key: &ResourceKey) -> Option<serde_json::Value> {
        self.fresh_within(key, self.policy.stale_time)
    }

    /// Like [`SyncCache::fresh`] with a per-key staleness override.
    /// A zero window never serves from cache.
    pub fn fresh_within(
        &self,
        key: &ResourceKey,
        stale_time: Duration,
    ) -> Option<serde_json::Value> {
        let entry = self.entries.get(key)?;
        if entry.stale || entry.fetched_at.elapsed() >= stale_time {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Record a successful fetch for `key`, clearing any staleness flag.
    pub fn store(&self, key: &ResourceKey, value: serde_json::Value) {
        self.entries.insert(
            key.clone(),
            CacheEntry {
                value,
                fetched_at: Instant::now(),
                stale: false,
            },
        );
    }

    /// Register a consumer of `key`. Entries with at least one consumer
    /// are never evicted.
    pub fn acquire(&self, key: &ResourceKey) {
        *self.consumers.entry(key.clone()).or_insert(0) += 1;
    }

    /// Drop one consumer registration for `key`.
    pub fn release(&self, key: &ResourceKey) {
        let emptied = match self.consumers.get_mut(key) {
            Some(mut count) => {
                *count = count.saturating_sub(1);
                *count == 0
            }
            None => false,
        };
        if emptied {
            self.consumers.remove_if(key, |_, count| *count == 0);
        }
    }

    pub fn consumer_count(&self, key: &ResourceKey) -> usize {
        self.consumers.get(key).map(|count| *count).unwrap_or(0)
    }

    /// Purge entries past the eviction window that have no active
    /// consumer.
    pub fn sweep(&self) {
        let eviction = self.policy.eviction_time;
        self.entries.retain(|key, entry| {
            let keep = self.consumer_count(key) > 0 || entry.fetched_at.elapsed() < eviction;
            if !keep {
                tracing::debug!(key = %key, "evicting cache entry");
            }
            keep
        });
    }

    /// Forward an application signal. When the policy honors it, every
    /// entry is flagged stale and subscribed pollers are woken for a
    /// background refetch.
    pub fn signal(&self, signal: AppSignal) {
        if !self.policy.honors(signal) {
            tracing::debug!(?signal, "signal ignored by cache policy");
            return;
        }
        for mut entry in self.entries.iter_mut() {
            entry.stale = true;
        }
        // No receivers just means no poller is currently running.
        let _ = self.signals.send(signal);
    }

    pub fn subscribe_signals(&self) -> broadcast::Receiver<AppSignal> {
        self.signals.subscribe()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Handle to the background eviction task.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Stop sweeping and wait for the task to exit. Idempotent.
    pub async fn stop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Run [`SyncCache::sweep`] every `period` until the handle is stopped.
pub fn spawn_sweeper(cache: Arc<SyncCache>, period: Duration) -> SweeperHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::debug!(period_ms = period.as_millis() as u64, "cache sweeper started");

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    cache.sweep();
                }
            }
        }
        tracing::debug!("cache sweeper stopped");
    });

    SweeperHandle {
        shutdown: shutdown_tx,
        task: Some(task),
    }
}
