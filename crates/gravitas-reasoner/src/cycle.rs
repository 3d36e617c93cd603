//! [`Reasoner`] – the per-tick orchestrator.
//!
//! Owns every piece of reasoning state for one input world and exposes the
//! two entry points the service serialises:
//!
//! - [`Reasoner::ingest`] for world-model change notifications, and
//! - [`Reasoner::tick`] for the periodic reasoning cycle.
//!
//! A tick refreshes perception freshness, runs the stability evaluation,
//! updates the action trackers, detects relations on the corrected poses and
//! returns everything as one [`ChangeSet`].

use chrono::{DateTime, Utc};
use gravitas_physics::{BodyRegistry, PhysicsEngine};
use gravitas_types::{
    ActionEvent, ChangeSet, KinematicState, NodeKind, ObjectId, ObjectSnapshot, ObjectUpdate, Situation,
    WorldEvent,
};
use tracing::{debug, info, instrument, warn};

use crate::action::event_confidence;
use crate::budget::{CycleBudget, CycleHealth};
use crate::config::ReasonerConfig;
use crate::relations::RelationDetector;
use crate::stability;
use crate::world::{ObjectRegistry, TrackedObject};

pub struct Reasoner {
    config: ReasonerConfig,
    output_world: String,
    objects: ObjectRegistry,
    bodies: BodyRegistry,
    relations: RelationDetector,
    budget: CycleBudget,
    /// Situations produced between ticks (closed by deletions).
    pending: Vec<Situation>,
    pending_deleted: Vec<ObjectId>,
    last_health: CycleHealth,
}

impl Reasoner {
    pub fn new(engine: Box<dyn PhysicsEngine>, config: ReasonerConfig) -> Self {
        let bodies = BodyRegistry::new(engine).with_friction(config.friction);
        Self {
            output_world: config.output_world(),
            budget: CycleBudget::new(config.reasoning_frequency),
            config,
            objects: ObjectRegistry::new(),
            bodies,
            relations: RelationDetector::new(),
            pending: Vec::new(),
            pending_deleted: Vec::new(),
            last_health: CycleHealth::OnTime,
        }
    }

    pub fn config(&self) -> &ReasonerConfig {
        &self.config
    }

    /// Apply a world-model change received at `now`.
    #[instrument(skip_all)]
    pub fn ingest(&mut self, event: &WorldEvent, now: DateTime<Utc>) {
        match event {
            WorldEvent::Upserted(snapshot) => {
                if snapshot.kind != NodeKind::Mesh {
                    debug!(object = %snapshot.id, kind = ?snapshot.kind, "not a mesh, ignored");
                    return;
                }
                self.objects.observe(snapshot.clone(), now);
                stability::resync_on_observation(&mut self.objects, &mut self.bodies, &self.config, &snapshot.id);
            }
            WorldEvent::Deleted(id) => self.forget(id, now),
        }
    }

    /// Ingest every object already present in the world model.
    pub fn seed(&mut self, snapshots: impl IntoIterator<Item = ObjectSnapshot>, now: DateTime<Utc>) {
        for snapshot in snapshots {
            self.ingest(&WorldEvent::Upserted(snapshot), now);
        }
        info!(objects = self.objects.len(), "reasoner seeded");
    }

    fn forget(&mut self, id: &str, now: DateTime<Utc>) {
        let known = self.objects.contains(id);
        let closed = self.relations.purge(id, now);
        self.pending.extend(closed.into_iter().map(Situation::Fact));
        self.objects.remove(id);
        let had_body = self.bodies.remove(id);
        if known || had_body {
            info!(object = id, "object deleted");
            self.pending_deleted.push(id.to_string());
        } else {
            debug!(object = id, "deletion of unknown object ignored");
        }
    }

    /// Run one reasoning cycle at `now`.
    #[instrument(skip_all, fields(world = %self.output_world))]
    pub fn tick(&mut self, now: DateTime<Utc>) -> ChangeSet {
        let started = self.budget.start();

        let window = self.config.perception_window();
        for object in self.objects.iter_mut() {
            object.is_perceived = object.perception.is_fresh(now, window);
        }

        let report = stability::evaluate(&mut self.objects, &mut self.bodies, &self.config);
        if !report.unstable.is_empty() {
            debug!(unstable = ?report.unstable, "unstable objects");
        }

        let mut changes = ChangeSet::new(self.output_world.clone(), now);
        let mut actions = Vec::new();
        for id in self.objects.ids() {
            let simulated = self.bodies.state(&id);
            let Some(object) = self.objects.get_mut(&id) else { continue };
            let reported = if simulated.is_some() {
                report_simulated(object, simulated, self.config.infer_actions, now, &mut actions)
            } else {
                // No body: perception-only.
                object.perceived()
            };
            if let Some(state) = reported {
                object.corrected = Some(state);
                changes.objects.push(ObjectUpdate { id, state });
            }
        }

        if self.config.visualize {
            for id in self.bodies.simulated_ids() {
                if let Some(state) = self.bodies.state(id) {
                    let p = state.position();
                    info!(target: "gravitas::visualize", object = %id, x = p.x, y = p.y, z = p.z, "body");
                }
            }
        }

        let order = self.bodies.simulated_ids().to_vec();
        let facts = self.relations.evaluate(&mut self.objects, &order, now);

        changes.situations.append(&mut self.pending);
        changes.situations.extend(facts.into_iter().map(Situation::Fact));
        changes.situations.extend(actions.into_iter().map(Situation::Action));
        changes.deleted.append(&mut self.pending_deleted);

        self.last_health = self.budget.finish(started);
        if let CycleHealth::TooSlow { achieved_hz } = self.last_health {
            warn!(achieved_hz, target_hz = self.budget.target_hz(), "reasoning too slow");
        }
        changes
    }

    /// Budget verdict of the most recent tick.
    pub fn last_health(&self) -> CycleHealth {
        self.last_health
    }

    pub fn object(&self, id: &str) -> Option<&TrackedObject> {
        self.objects.get(id)
    }

    pub fn objects(&self) -> &ObjectRegistry {
        &self.objects
    }

    pub fn bodies(&self) -> &BodyRegistry {
        &self.bodies
    }

    pub fn relations(&self) -> &RelationDetector {
        &self.relations
    }
}

/// Action update of a simulated object.  Returns the state to report:
/// perception while it is being disturbed, the simulation otherwise.
fn report_simulated(
    object: &mut TrackedObject,
    simulated: Option<KinematicState>,
    infer: bool,
    now: DateTime<Utc>,
    actions: &mut Vec<ActionEvent>,
) -> Option<KinematicState> {
    let disturbed = object.is_unstable && object.is_perceived;
    let perceived = object.is_perceived;
    let event = match object.action.as_mut() {
        Some(tracker) if disturbed => tracker.on_disturbed(infer),
        Some(tracker) => tracker.on_settled(perceived, infer),
        None => None,
    };
    if let Some(kind) = event {
        let action = ActionEvent::new(kind, object.id(), object.name(), event_confidence(kind), now);
        info!(object = %action.subject, description = %action.description, "action detected");
        actions.push(action);
    }
    if disturbed { object.perceived() } else { simulated }
}
