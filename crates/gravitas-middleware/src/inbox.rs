//! Lossless inbound queue for world-model changes.
//!
//! The broadcast [`EventBus`][crate::EventBus] drops the oldest messages for
//! a subscriber that falls behind, which is acceptable for fan-out output but
//! not for world changes: a lost deletion would leave a ghost object behind.
//! World changes therefore travel on a bounded [`tokio::sync::mpsc`] queue
//! with a single consumer.  A full queue makes [`WorldFeed::send`] wait.

use gravitas_types::{Event, GravitasError};
use tokio::sync::mpsc;

/// Default number of queued world events before senders wait.
pub const DEFAULT_INBOX_CAPACITY: usize = 256;

/// Create a world-change queue holding at most `capacity` events.
pub fn world_channel(capacity: usize) -> (WorldFeed, WorldInbox) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (WorldFeed { tx }, WorldInbox { rx })
}

/// Producer half.  Clone it for every source of world changes; the queue
/// closes once every clone is dropped.
#[derive(Clone, Debug)]
pub struct WorldFeed {
    tx: mpsc::Sender<Event>,
}

impl WorldFeed {
    /// Queue `event`, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// [`GravitasError::Channel`] when the consumer is gone.
    pub async fn send(&self, event: Event) -> Result<(), GravitasError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| GravitasError::Channel("world inbox closed".to_string()))
    }

    /// Queue `event` without waiting.
    ///
    /// # Errors
    ///
    /// [`GravitasError::Channel`] when the queue is full or closed; the
    /// event is not queued.
    pub fn try_send(&self, event: Event) -> Result<(), GravitasError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => GravitasError::Channel("world inbox full".to_string()),
            mpsc::error::TrySendError::Closed(_) => GravitasError::Channel("world inbox closed".to_string()),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half, owned by the reasoner service.
#[derive(Debug)]
pub struct WorldInbox {
    rx: mpsc::Receiver<Event>,
}

impl WorldInbox {
    /// Wait for the next event.  Returns `None` once every feed is dropped
    /// and the queue is empty.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Take an already queued event without waiting.
    pub fn try_next(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Number of events waiting in the queue.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
