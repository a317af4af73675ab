//! Broadcast event bus carrying [`EngineEvent`]s to the host.
//!
//! Every device session publishes onto a shared bus; the host subscribes to
//! everything or to a filtered slice (one device, value updates only, ...).

use std::sync::Arc;

use futures::Stream;
use tokio::sync::broadcast;

use crate::config::EngineConfig;
use crate::event::{EngineEvent, EventMetadata};

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Event bus shared by all device sessions.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<(EngineEvent, EventMetadata)>,
    name: String,
}

impl EventBus {
    /// Create a new event bus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with the specified capacity.
    ///
    /// The capacity determines how many events are buffered for slow subscribers.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            name: "default".to_string(),
        }
    }

    /// Create a bus sized by `event_channel_capacity`.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::with_capacity(config.event_channel_capacity.max(1))
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            tx: broadcast::channel(DEFAULT_CHANNEL_CAPACITY).0,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish an event with default metadata.
    ///
    /// Returns `true` if there was at least one subscriber.
    pub async fn publish(&self, event: EngineEvent) -> bool {
        self.publish_with_source(event, "engine").await
    }

    /// Publish an event with a custom source.
    pub async fn publish_with_source(&self, event: EngineEvent, source: impl Into<String>) -> bool {
        let metadata = EventMetadata::new(source);
        self.publish_with_metadata(event, metadata).await
    }

    pub async fn publish_with_metadata(&self, event: EngineEvent, metadata: EventMetadata) -> bool {
        self.tx.send((event, metadata)).is_ok()
    }

    /// Subscribe to all events.
    ///
    /// If the subscriber falls behind, older events may be dropped.
    pub fn subscribe(&self) -> EventBusReceiver {
        EventBusReceiver {
            rx: self.tx.subscribe(),
        }
    }

    /// Subscribe to events matching a filter.
    pub fn subscribe_filtered<F>(&self, filter: F) -> FilteredReceiver<F>
    where
        F: Fn(&EngineEvent) -> bool + Send + 'static,
    {
        FilteredReceiver::new(self.tx.subscribe(), filter)
    }

    /// Subscribe to every event of a single device.
    pub fn subscribe_device(
        &self,
        device_id: impl Into<String>,
    ) -> FilteredReceiver<impl Fn(&EngineEvent) -> bool + Send + 'static> {
        let target = device_id.into();
        FilteredReceiver::new(self.tx.subscribe(), move |event: &EngineEvent| {
            event.device_id() == target
        })
    }

    /// Subscribe to capability and setting updates only.
    pub fn value_events(&self) -> FilteredReceiver<fn(&EngineEvent) -> bool> {
        FilteredReceiver::new(self.tx.subscribe(), EngineEvent::is_value_event as fn(&EngineEvent) -> bool)
    }

    /// Subscribe to lifecycle and binding health events only.
    pub fn health_events(&self) -> FilteredReceiver<fn(&EngineEvent) -> bool> {
        FilteredReceiver::new(self.tx.subscribe(), EngineEvent::is_health_event as fn(&EngineEvent) -> bool)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver for all events from the event bus.
pub struct EventBusReceiver {
    rx: broadcast::Receiver<(EngineEvent, EventMetadata)>,
}

impl EventBusReceiver {
    /// Receive the next event.
    ///
    /// Returns `None` if the event bus is closed.
    pub async fn recv(&mut self) -> Option<(EngineEvent, EventMetadata)> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event bus receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive an event without blocking.
    ///
    /// A lagged receiver skips what it missed and returns the oldest event
    /// still buffered.
    pub fn try_recv(&mut self) -> Option<(EngineEvent, EventMetadata)> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event bus receiver lagged");
                }
                Err(_) => return None,
            }
        }
    }

    /// Drain everything currently buffered.
    pub fn drain(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Some((event, _)) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Convert into a stream of events, ending when the bus closes.
    pub fn into_stream(self) -> impl Stream<Item = EngineEvent> + Send {
        futures::stream::unfold(self, |mut rx| async move {
            rx.recv().await.map(|(event, _)| (event, rx))
        })
    }
}

/// Receiver for filtered events from the event bus.
pub struct FilteredReceiver<F>
where
    F: Fn(&EngineEvent) -> bool + Send,
{
    rx: broadcast::Receiver<(EngineEvent, EventMetadata)>,
    filter: F,
}

impl<F> FilteredReceiver<F>
where
    F: Fn(&EngineEvent) -> bool + Send,
{
    fn new(rx: broadcast::Receiver<(EngineEvent, EventMetadata)>, filter: F) -> Self {
        Self { rx, filter }
    }

    /// Receive the next event matching the filter.
    ///
    /// Returns `None` if the event bus is closed.
    pub async fn recv(&mut self) -> Option<(EngineEvent, EventMetadata)> {
        loop {
            match self.rx.recv().await {
                Ok((event, meta)) => {
                    if (self.filter)(&event) {
                        return Some((event, meta));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive a matching event without blocking.
    pub fn try_recv(&mut self) -> Option<(EngineEvent, EventMetadata)> {
        loop {
            match self.rx.try_recv() {
                Ok((event, meta)) if (self.filter)(&event) => return Some((event, meta)),
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Drain every buffered event that matches the filter.
    pub fn drain(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        while let Some((event, _)) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Shared event bus handle.
pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use futures::StreamExt;

    fn changed(device_id: &str, capability: &str, value: Value) -> EngineEvent {
        EngineEvent::CapabilityChanged {
            device_id: device_id.to_string(),
            capability: capability.to_string(),
            value,
            previous: None,
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(changed("lamp", "onoff", Value::Boolean(true))).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.0.type_name(), "CapabilityChanged");
        assert_eq!(received.1.source, "engine");
    }

    #[tokio::test]
    async fn test_drain_continues_after_lag() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe();

        for level in 0..5 {
            bus.publish(changed("lamp", "dim", Value::Integer(level))).await;
        }

        let events = rx.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1],
            EngineEvent::CapabilityChanged { value: Value::Integer(4), .. }
        ));
    }

    #[test]
    fn test_capacity_from_config() {
        let config = EngineConfig {
            event_channel_capacity: 4,
            ..EngineConfig::default()
        };
        let bus = EventBus::from_config(&config);
        let mut rx = bus.subscribe();
        assert!(rx.try_recv().is_none());
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_reports_false() {
        let bus = EventBus::new();
        assert!(!bus.publish(changed("lamp", "onoff", Value::Boolean(true))).await);
    }

    #[tokio::test]
    async fn test_device_filter() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_device("plug");

        bus.publish(changed("lamp", "onoff", Value::Boolean(true))).await;
        bus.publish(changed("plug", "onoff", Value::Boolean(false))).await;

        let (event, _) = rx.recv().await.unwrap();
        assert_eq!(event.device_id(), "plug");
    }

    #[tokio::test]
    async fn test_health_filter_skips_values() {
        let bus = EventBus::new();
        let mut rx = bus.health_events();

        bus.publish(changed("lamp", "dim", Value::Float(0.5))).await;
        assert!(rx.try_recv().is_none());

        bus.publish(EngineEvent::SessionStateChanged {
            device_id: "lamp".to_string(),
            from: "binding".to_string(),
            to: "ready".to_string(),
            timestamp: 0,
        })
        .await;
        assert_eq!(rx.try_recv().unwrap().0.type_name(), "SessionStateChanged");
    }

    #[tokio::test]
    async fn test_into_stream() {
        let bus = EventBus::new();
        let stream = bus.subscribe().into_stream();

        bus.publish(changed("lamp", "dim", Value::Float(0.25))).await;
        drop(bus);

        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_subscriber_count() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        let _rx1 = bus.subscribe();
        let _rx2 = bus.value_events();
        assert_eq!(bus.subscriber_count(), 2);
    }
}
