//! Event subscription synchronizer
//!
//! A dedicated listener task drains one [`EventSource`] and invokes the
//! consumer callback exactly once per matching event, in arrival order.
//! A dropped connection is surfaced through the error callback and ends
//! the subscription; reconnection is the caller's responsibility.
//!
//! [`SubscriptionHandle::close`] signals shutdown and awaits listener
//! exit before returning, so no event can be delivered after `close()`
//! returns.

use crate::error::{FetchResult, SyncError};
use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use wattsync_core::{ChangeEvent, EventFilter};

/// A long-lived stream of change events.
///
/// `None` means the stream ended; `Some(Err(_))` carries a decode failure
/// or transport error for one inbound message. Implemented by the
/// WebSocket client and by test doubles.
#[async_trait]
pub trait EventSource: Send {
    async fn next_event(&mut self) -> Option<FetchResult<ChangeEvent>>;
}

/// Handle to a running subscription.
pub struct SubscriptionHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    /// Release the subscription and wait for the listener task to exit.
    /// Idempotent. After this returns, `on_event` and `on_error` will not
    /// be invoked again.
    pub async fn close(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_none()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Start a listener over `source`, delivering events matching `filter` to
/// `on_event` and failures to `on_error`.
pub fn spawn_subscriber<S, E, R>(
    mut source: S,
    filter: EventFilter,
    mut on_event: E,
    mut on_error: R,
) -> SubscriptionHandle
where
    S: EventSource + 'static,
    E: FnMut(ChangeEvent) + Send + 'static,
    R: FnMut(SyncError) + Send + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        tracing::debug!(table = %filter.table, "subscription started");
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }

                inbound = source.next_event() => {
                    // Suppress anything that raced with close().
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    match inbound {
                        Some(Ok(event)) => {
                            if filter.matches(&event) {
                                on_event(event);
                            }
                        }
                        Some(Err(err)) => {
                            tracing::warn!(table = %filter.table, error = %err, "subscription error");
                            on_error(err);
                        }
                        None => {
                            tracing::warn!(table = %filter.table, "event stream ended");
                            on_error(SyncError::ConnectionDropped(
                                "event stream ended".to_string(),
                            ));
                            break;
                        }
                    }
                }
            }
        }
        tracing::debug!(table = %filter.table, "subscription closed");
    });

    SubscriptionHandle {
        shutdown: shutdown_tx,
        task: Some(task),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;
    use wattsync_core::ChangeKind;

    /// Event source fed from an mpsc channel.
    struct ChannelSource {
        rx: mpsc::UnboundedReceiver<FetchResult<ChangeEvent>>,
    }

    #[async_trait]
    impl EventSource for ChannelSource {
        async fn next_event(&mut self) -> Option<FetchResult<ChangeEvent>> {
            self.rx.recv().await
        }
    }

    fn channel_source() -> (
        mpsc::UnboundedSender<FetchResult<ChangeEvent>>,
        ChannelSource,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, ChannelSource { rx })
    }

    fn event(kind: ChangeKind, table: &str, id: &str) -> ChangeEvent {
        ChangeEvent {
            kind,
            table: table.to_string(),
            payload: serde_json::json!({ "id": id }),
        }
    }

    fn sinks() -> (
        Arc<Mutex<Vec<ChangeEvent>>>,
        impl FnMut(ChangeEvent) + Send + 'static,
        Arc<Mutex<Vec<SyncError>>>,
        impl FnMut(SyncError) + Send + 'static,
    ) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));
        let events_sink = Arc::clone(&events);
        let errors_sink = Arc::clone(&errors);
        (
            events,
            move |event| events_sink.lock().unwrap().push(event),
            errors,
            move |err| errors_sink.lock().unwrap().push(err),
        )
    }

    #[tokio::test]
    async fn matching_events_delivered_in_arrival_order_untransformed() {
        let (tx, source) = channel_source();
        let (events, on_event, _errors, on_error) = sinks();
        let mut handle =
            spawn_subscriber(source, EventFilter::inserts("alerts"), on_event, on_error);

        let delivered = ChangeEvent {
            kind: ChangeKind::Insert,
            table: "alerts".to_string(),
            payload: serde_json::json!({ "id": "a1", "severity": "critical" }),
        };
        tx.send(Ok(delivered.clone())).unwrap();
        tx.send(Ok(event(ChangeKind::Insert, "alerts", "a2"))).unwrap();
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        handle.close().await;

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], delivered);
        assert_eq!(events[1].payload["id"], "a2");
    }

    #[tokio::test]
    async fn non_matching_events_are_filtered_out() {
        let (tx, source) = channel_source();
        let (events, on_event, _errors, on_error) = sinks();
        let mut handle =
            spawn_subscriber(source, EventFilter::inserts("alerts"), on_event, on_error);

        tx.send(Ok(event(ChangeKind::Update, "alerts", "a1"))).unwrap();
        tx.send(Ok(event(ChangeKind::Insert, "devices", "d1"))).unwrap();
        tx.send(Ok(event(ChangeKind::Insert, "alerts", "a2"))).unwrap();
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        handle.close().await;

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["id"], "a2");
    }

    #[tokio::test]
    async fn no_delivery_after_close_returns() {
        let (tx, source) = channel_source();
        let (events, on_event, _errors, on_error) = sinks();
        let mut handle =
            spawn_subscriber(source, EventFilter::all("alerts"), on_event, on_error);

        handle.close().await;
        let _ = tx.send(Ok(event(ChangeKind::Insert, "alerts", "late")));
        tokio::task::yield_now().await;

        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (_tx, source) = channel_source();
        let (_events, on_event, _errors, on_error) = sinks();
        let mut handle =
            spawn_subscriber(source, EventFilter::all("alerts"), on_event, on_error);

        handle.close().await;
        handle.close().await;
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn ended_stream_surfaces_connection_dropped() {
        let (tx, source) = channel_source();
        let (_events, on_event, errors, on_error) = sinks();
        let mut handle =
            spawn_subscriber(source, EventFilter::all("alerts"), on_event, on_error);

        drop(tx);
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        handle.close().await;

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], SyncError::ConnectionDropped(_)));
    }

    #[tokio::test]
    async fn decode_errors_surface_without_ending_subscription() {
        let (tx, source) = channel_source();
        let (events, on_event, errors, on_error) = sinks();
        let mut handle =
            spawn_subscriber(source, EventFilter::all("alerts"), on_event, on_error);

        tx.send(Err(SyncError::Decode("not json".to_string()))).unwrap();
        tx.send(Ok(event(ChangeKind::Insert, "alerts", "a1"))).unwrap();
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        handle.close().await;

        assert_eq!(errors.lock().unwrap().len(), 1);
        assert_eq!(events.lock().unwrap().len(), 1);
    }
}
