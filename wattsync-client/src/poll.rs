//! Polling synchronizer
//!
//! Repeatedly fetches one resource key on a fixed interval and delivers
//! every result (success or failure) to a consumer callback. The loop is
//! strictly sequential per key: the next tick cannot start while a fetch
//! is outstanding, and missed ticks are skipped rather than buffered, so
//! at most one fetch per key is ever in flight.
//!
//! Teardown is the one property treated as load-bearing here: the task
//! checks its shutdown flag before every callback invocation, and
//! [`PollHandle::stop`] awaits task exit, so no update can be delivered
//! after `stop()` returns.

use crate::api_client::Fetcher;
use crate::cache::SyncCache;
use crate::error::FetchResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use wattsync_core::ResourceKey;

/// Per-key polling options. Unset fields fall back to the cache policy.
#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    /// Override for the policy retry count.
    pub retry_count: Option<u32>,
    /// Override for the policy staleness window. `Duration::ZERO`
    /// disables cache hits entirely, forcing a round trip every tick.
    pub stale_time: Option<Duration>,
}

impl PollOptions {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            retry_count: None,
            stale_time: None,
        }
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }
}

/// Handle to a running poller.
///
/// Dropping the handle without calling [`PollHandle::stop`] signals
/// shutdown too, but only `stop()` guarantees the task has exited (and
/// with it, that no further callback will run).
pub struct PollHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Stop polling and wait for the task to exit. Idempotent: calling
    /// this twice is the same as calling it once. Any in-flight fetch
    /// result is discarded, never delivered.
    pub async fn stop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.task.is_none()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Start polling `key`: one immediate fetch, then one per interval until
/// the handle is stopped.
///
/// The cache is consulted first on every tick; an entry younger than the
/// staleness window is delivered without a network call. Failed fetches
/// are retried up to the retry count within the tick, then surfaced as a
/// single failure; polling continues either way (no backoff, no circuit
/// breaking). Application signals honored by the cache policy wake the
/// poller for an immediate refetch.
pub fn spawn_poller<F>(
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<SyncCache>,
    key: ResourceKey,
    options: PollOptions,
    mut on_update: F,
) -> PollHandle
where
    F: FnMut(FetchResult<serde_json::Value>) + Send + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let retry_count = options
            .retry_count
            .unwrap_or(cache.policy().retry_count);
        let stale_time = options.stale_time.unwrap_or(cache.policy().stale_time);

        cache.acquire(&key);
        let mut signals = cache.subscribe_signals();
        let mut ticker = interval(options.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::debug!(
            key = %key,
            interval_ms = options.interval.as_millis() as u64,
            retry_count,
            "poller started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }

                // First tick fires immediately.
                _ = ticker.tick() => {
                    poll_once(
                        fetcher.as_ref(),
                        &cache,
                        &key,
                        stale_time,
                        retry_count,
                        &shutdown_rx,
                        &mut on_update,
                    )
                    .await;
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }

                // A focus/reconnect signal marked the entry stale; refetch
                // without waiting for the next tick.
                signal = signals.recv() => {
                    if signal.is_ok() {
                        poll_once(
                            fetcher.as_ref(),
                            &cache,
                            &key,
                            stale_time,
                            retry_count,
                            &shutdown_rx,
                            &mut on_update,
                        )
                        .await;
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        }

        cache.release(&key);
        tracing::debug!(key = %key, "poller stopped");
    });

    PollHandle {
        shutdown: shutdown_tx,
        task: Some(task),
    }
}

/// One delivery cycle: cache hit or fetch-with-retry, then callback.
async fn poll_once<F>(
    fetcher: &dyn Fetcher,
    cache: &SyncCache,
    key: &ResourceKey,
    stale_time: Duration,
    retry_count: u32,
    shutdown_rx: &watch::Receiver<bool>,
    on_update: &mut F,
) where
    F: FnMut(FetchResult<serde_json::Value>) + Send,
{
    let result = match cache.fresh_within(key, stale_time) {
        Some(value) => Ok(value),
        None => {
            let result = fetch_with_retry(fetcher, key, retry_count).await;
            if let Ok(value) = &result {
                cache.store(key, value.clone());
            }
            result
        }
    };

    // Discard the result if stop() raced with the fetch.
    if *shutdown_rx.borrow() {
        return;
    }
    on_update(result);
}

async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    key: &ResourceKey,
    retry_count: u32,
) -> FetchResult<serde_json::Value> {
    let endpoint = key.endpoint();
    let mut attempt = 0u32;
    loop {
        match fetcher.fetch(&endpoint, &[]).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < retry_count => {
                attempt += 1;
                tracing::debug!(key = %key, attempt, error = %err, "retrying fetch");
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "fetch failed");
                return Err(err);
            }
        }
    }
}
