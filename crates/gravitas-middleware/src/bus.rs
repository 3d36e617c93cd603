//! Typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.  A lagging subscriber loses the oldest messages, so only
//! fan-out output travels here; world changes use the lossless
//! [`inbox`][crate::inbox].
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::StableWorld`] | One [`ChangeSet`][gravitas_types::ChangeSet] per reasoning cycle |
//! | [`Topic::SystemAlerts`] | Under-performance warnings |

use gravitas_types::{Event, GravitasError};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Routing topics of the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Reasoning output, one batch per cycle.
    StableWorld,
    /// Operational alerts such as slow reasoning cycles.
    SystemAlerts,
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    stable_world: broadcast::Sender<Event>,
    system_alerts: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus.  The `capacity` is applied to every topic channel
    /// independently.
    pub fn new(capacity: usize) -> Self {
        let (stable_world, _) = broadcast::channel(capacity);
        let (system_alerts, _) = broadcast::channel(capacity);
        Self {
            stable_world,
            system_alerts,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event.
    ///
    /// # Errors
    ///
    /// [`GravitasError::Channel`] when nobody is subscribed to the topic.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, GravitasError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| GravitasError::Channel(format!("no subscribers for topic {topic:?}")))
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::StableWorld => &self.stable_world,
            Topic::SystemAlerts => &self.system_alerts,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(RecvError::Lagged(n))` – the subscriber fell behind and `n`
    ///   messages were dropped.
    /// * `Err(RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Like [`recv`][Self::recv] but skips over lag, logging how many events
    /// were lost.  Returns `None` once the bus is closed.
    pub async fn next(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gravitas_types::{EventPayload, WorldEvent};

    fn make_event(source: &str) -> Event {
        Event::new(source, EventPayload::World(WorldEvent::Deleted("cube_1".into())))
    }

    #[test]
    fn publish_without_subscribers_is_channel_error() {
        let bus = EventBus::default();
        let result = bus.publish_to(Topic::StableWorld, make_event("test"));
        assert!(matches!(result, Err(GravitasError::Channel(_))));
    }

    #[tokio::test]
    async fn topic_multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut subscriber1 = bus.subscribe_to(Topic::StableWorld);
        let mut subscriber2 = bus.subscribe_to(Topic::StableWorld);
        assert_eq!(bus.subscriber_count(Topic::StableWorld), 2);

        let event = make_event("gravitas-reasoner::service");
        bus.publish_to(Topic::StableWorld, event.clone())?;

        assert_eq!(subscriber1.recv().await?.id, event.id);
        assert_eq!(subscriber2.recv().await?.id, event.id);
        Ok(())
    }

    /// A subscriber on `SystemAlerts` must not receive events published to
    /// `StableWorld`.
    #[tokio::test]
    async fn topic_subscriber_does_not_receive_other_topic_events() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut alerts_sub = bus.subscribe_to(Topic::SystemAlerts);
        let _stable_sub = bus.subscribe_to(Topic::StableWorld);

        bus.publish_to(Topic::StableWorld, make_event("reasoner"))?;

        let result = tokio::time::timeout(std::time::Duration::from_millis(50), alerts_sub.recv()).await;
        assert!(result.is_err(), "SystemAlerts subscriber must not receive a change set");
        Ok(())
    }

    #[tokio::test]
    async fn next_skips_lag_and_keeps_delivering() {
        let bus = EventBus::new(4);
        let mut slow = bus.subscribe_to(Topic::StableWorld);
        for _ in 0..16 {
            let _ = bus.publish_to(Topic::StableWorld, make_event("flood"));
        }
        let last = make_event("last");
        let _ = bus.publish_to(Topic::StableWorld, last.clone());

        let mut seen = Vec::new();
        while let Ok(Some(event)) = tokio::time::timeout(std::time::Duration::from_millis(50), slow.next()).await {
            seen.push(event.id);
        }
        assert!(seen.len() <= 4);
        assert_eq!(seen.last(), Some(&last.id));
    }

    #[tokio::test]
    async fn next_returns_none_after_bus_dropped() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::SystemAlerts);
        drop(bus);
        assert!(rx.next().await.is_none());
        assert_eq!(rx.topic(), Topic::SystemAlerts);
    }
}
