//! Typed watchers over the raw synchronizers.
//!
//! Each watcher pairs one [`ResourceKey`] with its domain type: the
//! polling layer hands back raw JSON, the watcher decodes it and forwards
//! decode failures like any other failure, so consumers always see a
//! typed `FetchResult`.

use crate::api_client::Fetcher;
use crate::cache::SyncCache;
use crate::error::{FetchResult, SyncError};
use crate::poll::{spawn_poller, PollHandle, PollOptions};
use crate::subscribe::{spawn_subscriber, EventSource, SubscriptionHandle};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use wattsync_core::{Alert, DeviceId, DeviceStatusReading, EventFilter, ResourceKey, Space, Tariff};

/// Polling interval used for device status when the caller does not
/// choose one.
pub const DEVICE_STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// Realtime stream carrying alert rows.
pub const ALERTS_STREAM: &str = "alerts";

fn decode<T: DeserializeOwned>(result: FetchResult<serde_json::Value>) -> FetchResult<T> {
    result.and_then(|value| serde_json::from_value(value).map_err(SyncError::decode))
}

/// Poll the live status of one device.
///
/// Device status is always fetched live (zero staleness window): a
/// monitoring view polling every few seconds must observe each new
/// reading, never a cache replay.
pub fn watch_device_status<F>(
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<SyncCache>,
    device_id: DeviceId,
    interval: Duration,
    mut on_update: F,
) -> PollHandle
where
    F: FnMut(FetchResult<DeviceStatusReading>) + Send + 'static,
{
    let options = PollOptions::new(interval).with_stale_time(Duration::ZERO);
    spawn_poller(
        fetcher,
        cache,
        ResourceKey::DeviceStatus(device_id),
        options,
        move |result| on_update(decode(result)),
    )
}

/// Poll the tariff currently in effect. Tariffs change rarely, so cache
/// hits within the policy staleness window are served without a round
/// trip.
pub fn watch_latest_tariff<F>(
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<SyncCache>,
    interval: Duration,
    mut on_update: F,
) -> PollHandle
where
    F: FnMut(FetchResult<Tariff>) + Send + 'static,
{
    spawn_poller(
        fetcher,
        cache,
        ResourceKey::LatestTariff,
        PollOptions::new(interval),
        move |result| on_update(decode(result)),
    )
}

/// Poll the space hierarchy.
pub fn watch_spaces<F>(
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<SyncCache>,
    interval: Duration,
    mut on_update: F,
) -> PollHandle
where
    F: FnMut(FetchResult<Vec<Space>>) + Send + 'static,
{
    spawn_poller(
        fetcher,
        cache,
        ResourceKey::Spaces,
        PollOptions::new(interval),
        move |result| on_update(decode(result)),
    )
}

/// Subscribe to newly inserted alerts on the realtime channel.
///
/// Each insert payload is decoded into an [`Alert`]; a payload that does
/// not decode is delivered as a `Failure` rather than dropped. Channel
/// failures go to `on_error` and are not retried here.
pub fn subscribe_alerts<S, F, R>(
    source: S,
    mut on_alert: F,
    on_error: R,
) -> SubscriptionHandle
where
    S: EventSource + 'static,
    F: FnMut(FetchResult<Alert>) + Send + 'static,
    R: FnMut(SyncError) + Send + 'static,
{
    spawn_subscriber(
        source,
        EventFilter::inserts(ALERTS_STREAM),
        move |event| {
            on_alert(serde_json::from_value(event.payload).map_err(SyncError::decode))
        },
        on_error,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachePolicy;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use wattsync_core::{AlertSeverity, ChangeEvent, ChangeKind, DeviceState};

    struct StaticFetcher {
        value: serde_json::Value,
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(
            &self,
            _endpoint: &str,
            _params: &[(&str, &str)],
        ) -> FetchResult<serde_json::Value> {
            Ok(self.value.clone())
        }
    }

    struct OneShotSource {
        event: Option<ChangeEvent>,
    }

    #[async_trait]
    impl EventSource for OneShotSource {
        async fn next_event(&mut self) -> Option<FetchResult<ChangeEvent>> {
            match self.event.take() {
                Some(event) => Some(Ok(event)),
                None => std::future::pending().await,
            }
        }
    }

    fn cache() -> Arc<SyncCache> {
        Arc::new(SyncCache::new(CachePolicy::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn device_status_watcher_decodes_reading() {
        let fetcher = Arc::new(StaticFetcher {
            value: serde_json::json!({
                "device_id": "dev-42",
                "state": "online",
                "power_w": 10.0,
                "energy_today_kwh": 4.2,
                "last_seen": "2026-02-01T08:00:00Z",
            }),
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut handle = watch_device_status(
            fetcher,
            cache(),
            DeviceId::from("dev-42"),
            DEVICE_STATUS_INTERVAL,
            move |result| sink.lock().unwrap().push(result),
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.stop().await;

        let seen = seen.lock().unwrap();
        let reading = seen[0].as_ref().unwrap();
        assert_eq!(reading.device_id.as_str(), "dev-42");
        assert_eq!(reading.state, DeviceState::Online);
        assert_eq!(reading.power_w, 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn device_status_watcher_surfaces_decode_failure() {
        let fetcher = Arc::new(StaticFetcher {
            value: serde_json::json!({ "unexpected": true }),
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut handle = watch_device_status(
            fetcher,
            cache(),
            DeviceId::from("dev-42"),
            DEVICE_STATUS_INTERVAL,
            move |result| sink.lock().unwrap().push(result),
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.stop().await;

        assert!(matches!(
            seen.lock().unwrap()[0],
            Err(SyncError::Decode(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn spaces_watcher_decodes_list() {
        let fetcher = Arc::new(StaticFetcher {
            value: serde_json::json!([
                { "id": "b81b3d8e-8f5c-4f93-9f41-1d1a1a111111", "name": "HQ", "kind": "site", "parent_id": null },
            ]),
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut handle = watch_spaces(fetcher, cache(), Duration::from_secs(60), move |result| {
            sink.lock().unwrap().push(result)
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.stop().await;

        let seen = seen.lock().unwrap();
        let spaces = seen[0].as_ref().unwrap();
        assert_eq!(spaces.len(), 1);
        assert!(spaces[0].is_root());
    }

    #[tokio::test]
    async fn alert_subscription_decodes_insert_payload() {
        let source = OneShotSource {
            event: Some(ChangeEvent {
                kind: ChangeKind::Insert,
                table: "alerts".to_string(),
                payload: serde_json::json!({
                    "id": "8e7f9a30-0c39-4a7b-9d38-0cf6a1f1a111",
                    "title": "Overload",
                    "message": "Inverter above rated capacity",
                    "severity": "critical",
                    "device_id": "dev-42",
                    "created_at": "2026-02-01T08:00:00Z",
                    "acknowledged": false,
                    "acknowledged_at": null,
                }),
            }),
        };
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut handle = subscribe_alerts(
            source,
            move |alert| sink.lock().unwrap().push(alert),
            |_err| {},
        );
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        handle.close().await;

        let seen = seen.lock().unwrap();
        let alert = seen[0].as_ref().unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert_eq!(alert.title, "Overload");
    }
}
