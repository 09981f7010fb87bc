//! WATTSYNC monitor entry point.
//!
//! Watches a set of devices and the alert stream from the command line:
//!
//! ```text
//! wattsync-monitor --config wattsync.toml dev-42 dev-43
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use wattsync_client::api_client::{RestClient, WsClient};
use wattsync_client::cache::{spawn_sweeper, SyncCache};
use wattsync_client::config::ClientConfig;
use wattsync_client::error::{ClientError, FetchResult, SyncError};
use wattsync_client::watch::{self, ALERTS_STREAM};
use wattsync_core::{Alert, DeviceId, DeviceStatusReading};

enum MonitorEvent {
    Status(DeviceId, FetchResult<DeviceStatusReading>),
    Alert(FetchResult<Alert>),
    ChannelError(SyncError),
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ClientConfig::load()?;
    let rest = Arc::new(RestClient::new(&config)?);
    let cache = Arc::new(SyncCache::new(config.cache_policy()));

    let mut sweeper = spawn_sweeper(Arc::clone(&cache), Duration::from_secs(60));

    let (event_tx, mut event_rx) = mpsc::channel::<MonitorEvent>(256);

    let mut pollers = Vec::new();
    for device_id in device_ids_from_args() {
        let tx = event_tx.clone();
        let id = device_id.clone();
        let handle = watch::watch_device_status(
            rest.clone(),
            Arc::clone(&cache),
            device_id,
            Duration::from_millis(config.poll_interval_ms),
            move |result| {
                let _ = tx.try_send(MonitorEvent::Status(id.clone(), result));
            },
        );
        pollers.push(handle);
    }

    let ws = WsClient::new(&config)?;
    let source = ws.open(ALERTS_STREAM).await?;
    let alert_tx = event_tx.clone();
    let error_tx = event_tx.clone();
    let mut alerts = watch::subscribe_alerts(
        source,
        move |alert| {
            let _ = alert_tx.try_send(MonitorEvent::Alert(alert));
        },
        move |err| {
            let _ = error_tx.try_send(MonitorEvent::ChannelError(err));
        },
    );

    tracing::info!(devices = pollers.len(), "monitor started");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
            Some(event) = event_rx.recv() => report(event),
        }
    }

    for mut poller in pollers {
        poller.stop().await;
    }
    alerts.close().await;
    sweeper.stop().await;
    Ok(())
}

fn report(event: MonitorEvent) {
    match event {
        MonitorEvent::Status(device_id, Ok(reading)) => {
            tracing::info!(
                device_id = %device_id,
                state = %reading.state,
                power_w = reading.power_w,
                "device status"
            );
        }
        MonitorEvent::Status(device_id, Err(err)) => {
            tracing::warn!(device_id = %device_id, error = %err, "device status unavailable");
        }
        MonitorEvent::Alert(Ok(alert)) => {
            tracing::warn!(
                severity = %alert.severity,
                title = %alert.title,
                message = %alert.message,
                "alert"
            );
        }
        MonitorEvent::Alert(Err(err)) => {
            tracing::warn!(error = %err, "undecodable alert payload");
        }
        MonitorEvent::ChannelError(err) => {
            tracing::error!(error = %err, "alert channel failed");
        }
    }
}

/// Positional arguments are device ids; `--config <path>` is consumed by
/// config loading.
fn device_ids_from_args() -> Vec<DeviceId> {
    let mut ids = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            let _ = args.next();
            continue;
        }
        ids.push(DeviceId::new(arg));
    }
    ids
}
