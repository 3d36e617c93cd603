//! `gravitas-middleware` – plumbing between the world model and the reasoner.
//!
//! # Modules
//!
//! - [`bus`] – Typed, topic-based publish/subscribe event bus built on Tokio
//!   broadcast channels, for reasoning output and alerts.
//! - [`inbox`] – Bounded, lossless queue carrying world changes to the
//!   reasoner.
//! - [`scene`] – In-memory world-model store: applies inbound world events,
//!   enumerates the objects of a named world and mirrors reasoning output
//!   into the derived world.

pub mod bus;
pub mod inbox;
pub mod scene;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use inbox::{DEFAULT_INBOX_CAPACITY, WorldFeed, WorldInbox, world_channel};
pub use scene::{DEFAULT_HISTORY_LIMIT, SceneStore};
