//! [`ReasonerService`] – drives a [`Reasoner`] from the event bus.
//!
//! One Tokio task owns the reasoner.  Its `select!` loop waits on the tick
//! interval, the [`WorldInbox`] and the shutdown signal, so ticks and world
//! events are handled strictly one at a time.  The inbox is lossless: events
//! still queued when shutdown arrives are ingested before the loop returns.
//!
//! Output goes back onto the bus: every non-empty change set on
//! [`Topic::StableWorld`], every slow cycle on [`Topic::SystemAlerts`].

use chrono::Utc;
use gravitas_middleware::{EventBus, SceneStore, Topic, WorldInbox};
use gravitas_types::{Event, EventPayload};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::budget::CycleHealth;
use crate::cycle::Reasoner;

const SOURCE: &str = "gravitas-reasoner::service";

enum Wake {
    Tick,
    Inbound(Option<Event>),
    Shutdown { sender_dropped: bool },
}

pub struct ReasonerService {
    reasoner: Reasoner,
    bus: EventBus,
    inbound: WorldInbox,
}

impl ReasonerService {
    /// World changes are read from `inbound`; output is published on `bus`.
    pub fn new(reasoner: Reasoner, bus: EventBus, inbound: WorldInbox) -> Self {
        Self { reasoner, bus, inbound }
    }

    /// Load every object `store` already knows in the input world.
    pub fn seed(&mut self, store: &SceneStore) {
        let world = self.reasoner.config().input_world.clone();
        self.reasoner.seed(store.objects(&world), Utc::now());
    }

    pub fn reasoner(&self) -> &Reasoner {
        &self.reasoner
    }

    /// Run until `shutdown` turns true or its sender is dropped, then hand
    /// the reasoner back.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Reasoner {
        let mut interval = tokio::time::interval(self.reasoner.config().tick_period());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut inbound_open = true;

        info!(
            world = %self.reasoner.config().input_world,
            hz = self.reasoner.config().reasoning_frequency,
            "reasoner service started"
        );

        loop {
            let wake = tokio::select! {
                _ = interval.tick() => Wake::Tick,
                event = self.inbound.next(), if inbound_open => Wake::Inbound(event),
                changed = shutdown.changed() => Wake::Shutdown { sender_dropped: changed.is_err() },
            };
            match wake {
                Wake::Tick => self.tick(),
                Wake::Inbound(Some(event)) => self.handle(event),
                Wake::Inbound(None) => {
                    debug!("world change stream closed");
                    inbound_open = false;
                }
                Wake::Shutdown { sender_dropped } => {
                    if sender_dropped || *shutdown.borrow() {
                        self.drain();
                        break;
                    }
                }
            }
        }

        info!("reasoner service stopped");
        self.reasoner
    }

    /// Run on a new Tokio task.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<Reasoner> {
        tokio::spawn(self.run(shutdown))
    }

    /// Ingest everything already queued.
    fn drain(&mut self) {
        let mut drained = 0usize;
        while let Some(event) = self.inbound.try_next() {
            self.handle(event);
            drained += 1;
        }
        if drained > 0 {
            debug!(drained, "queued world events ingested at shutdown");
        }
    }

    fn handle(&mut self, event: Event) {
        match event.payload {
            EventPayload::World(change) => self.reasoner.ingest(&change, Utc::now()),
            other => debug!(source = %event.source, payload = ?other, "unexpected payload in world inbox"),
        }
    }

    fn tick(&mut self) {
        let changes = self.reasoner.tick(Utc::now());
        if !changes.is_empty() {
            self.publish(Topic::StableWorld, EventPayload::Changes(changes));
        }
        if let CycleHealth::TooSlow { achieved_hz } = self.reasoner.last_health() {
            let target_hz = self.reasoner.config().reasoning_frequency;
            self.publish(Topic::SystemAlerts, EventPayload::PerformanceWarning { achieved_hz, target_hz });
        }
    }

    fn publish(&self, topic: Topic, payload: EventPayload) {
        if let Err(e) = self.bus.publish_to(topic, Event::new(SOURCE, payload)) {
            debug!(?topic, error = %e, "output dropped");
        }
    }
}
