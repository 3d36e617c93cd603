//! Stability evaluation and body resynchronisation.
//!
//! Every cycle the simulation is advanced by a fixed number of micro-steps.
//! A perceived object whose simulated position drifts further than the
//! simulation tolerance from its perceived position is *unstable*: physics
//! cannot explain where perception sees it (it is being held, pushed or was
//! mis-detected).  Its body is pinned to the perceived state for the rest of
//! the cycle and its contents are carried along.
//!
//! Between cycles, [`resync_on_observation`] forces a body to a new
//! observation whenever the observation actually moved the object.

use gravitas_physics::BodyRegistry;
use gravitas_types::{KinematicState, Twist, Vec3};
use tracing::{debug, instrument};

use crate::action::ActionTracker;
use crate::config::ReasonerConfig;
use crate::world::ObjectRegistry;

/// Outcome of one [`evaluate`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StabilityReport {
    pub steps: usize,
    /// Objects flagged unstable, in the order they diverged.
    pub unstable: Vec<String>,
}

/// Run the micro-step simulation of one cycle.
#[instrument(skip_all, fields(steps = config.micro_steps()))]
pub fn evaluate(objects: &mut ObjectRegistry, bodies: &mut BodyRegistry, config: &ReasonerConfig) -> StabilityReport {
    let simulated = bodies.simulated_ids().to_vec();
    for id in &simulated {
        if let Some(object) = objects.get_mut(id) {
            object.is_unstable = false;
        }
    }

    let mut report = StabilityReport {
        steps: config.micro_steps(),
        unstable: Vec::new(),
    };

    for step in 0..report.steps {
        bodies.step(config.time_step);

        for id in &simulated {
            let Some(object) = objects.get(id) else { continue };
            if !object.is_perceived {
                continue;
            }
            let Some(perceived) = object.perceived() else { continue };

            if !object.is_unstable {
                let Some(simulated_state) = bodies.state(id) else { continue };
                let divergence = simulated_state.position().distance(perceived.position());
                if divergence <= config.simulation_tolerance {
                    continue;
                }
                debug!(object = %id, step, divergence, "simulation diverged from perception");
                if let Some(object) = objects.get_mut(id) {
                    object.is_unstable = true;
                }
                report.unstable.push(id.clone());

                let offset = perceived.position().sub(simulated_state.position());
                carry_contents(objects, bodies, id, offset, perceived.twist, ContentBaseline::Simulated);
            }

            if let Err(e) = bodies.set_state(id, &perceived) {
                debug!(object = %id, error = %e, "cannot pin body to perception");
            }
        }
    }
    report
}

/// Force the body of `id` to its latest observation when the observation
/// warrants it and carry its contents along.  Returns whether the body was
/// forced.
///
/// A body is forced on first sighting, when the object was unstable in the
/// last cycle, or when position or orientation moved beyond the perception
/// tolerance since the previous observation.  The first successful force
/// creates the body and attaches a fresh [`ActionTracker`].
pub fn resync_on_observation(
    objects: &mut ObjectRegistry,
    bodies: &mut BodyRegistry,
    config: &ReasonerConfig,
    id: &str,
) -> bool {
    let Some(object) = objects.get(id) else { return false };
    let Some(perceived) = object.perceived() else { return false };

    let force = object.perception.is_first_sighting()
        || object.is_unstable
        || object.perception.moved_beyond(config.perception_tolerance);
    if !force {
        return false;
    }

    let name = object.name().to_string();
    let baseline = object.corrected;
    let entry = match bodies.ensure_body(id, &name, &perceived.pose) {
        Ok(entry) => entry,
        Err(e) => {
            debug!(object = %id, error = %e, "observation not mirrored in simulation");
            return false;
        }
    };
    // A live body always gets a tracker, even if forcing its state fails.
    if entry.created
        && let Some(object) = objects.get_mut(id)
    {
        object.action.get_or_insert_with(ActionTracker::new);
    }
    if let Err(e) = bodies.set_state(id, &perceived) {
        debug!(object = %id, error = %e, "observation not mirrored in simulation");
        return false;
    }

    // Without a reported pose there is no displacement to carry yet.
    let Some(baseline) = baseline else { return true };
    let offset = perceived.position().sub(baseline.position());
    if !offset.abs_diff_le(Vec3::zero(), config.perception_tolerance) {
        carry_contents(objects, bodies, id, offset, perceived.twist, ContentBaseline::Corrected);
    }
    true
}

/// Which pose of a contained object the container's displacement is added
/// to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentBaseline {
    /// Current simulated pose (within a cycle).
    Simulated,
    /// Last reported pose (between cycles).
    Corrected,
}

fn carry_contents(
    objects: &ObjectRegistry,
    bodies: &mut BodyRegistry,
    container: &str,
    offset: Vec3,
    twist: Twist,
    baseline: ContentBaseline,
) {
    let Some(contents) = objects.get(container).map(|o| o.contains.clone()) else {
        return;
    };
    for child in contents {
        let Some(object) = objects.get(&child) else {
            debug!(container, object = %child, "contained object unknown, skipped");
            continue;
        };
        let base = match baseline {
            ContentBaseline::Simulated => {
                if object.perceived().is_none() {
                    continue;
                }
                bodies.state(&child)
            }
            ContentBaseline::Corrected => object.corrected,
        };
        let Some(base) = base else {
            debug!(container, object = %child, "no baseline pose, skipped");
            continue;
        };
        let target = KinematicState::new(base.pose.translated(offset), twist);
        if let Err(e) = bodies.set_state(&child, &target) {
            debug!(container, object = %child, error = %e, "cannot carry contained object");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gravitas_physics::{
        BodyHandle, FrictionParams, PhysicsEngine, PhysicsError, ShapeAsset, ShapeLibrary, SimEngine,
    };
    use gravitas_types::{NodeKind, ObjectSnapshot, Pose, Property};

    fn registries() -> (ObjectRegistry, BodyRegistry) {
        let library = ShapeLibrary::in_memory()
            .with_asset("cube", ShapeAsset::cuboid([0.05; 3], 0.1))
            .with_asset("box", ShapeAsset::cuboid([0.2, 0.2, 0.1], 1.0));
        (ObjectRegistry::new(), BodyRegistry::new(Box::new(SimEngine::new(library))))
    }

    fn snapshot(id: &str, name: &str, state: KinematicState) -> ObjectSnapshot {
        ObjectSnapshot {
            id: id.to_string(),
            name: name.to_string(),
            kind: NodeKind::Mesh,
            state,
            properties: vec![Property::new("aabb", "0.1,0.1,0.1")],
        }
    }

    fn observe(objects: &mut ObjectRegistry, bodies: &mut BodyRegistry, cfg: &ReasonerConfig, snap: ObjectSnapshot) -> bool {
        let id = snap.id.clone();
        objects.observe(snap, Utc::now());
        resync_on_observation(objects, bodies, cfg, &id)
    }

    #[test]
    fn first_sighting_creates_body_and_tracker() {
        let (mut objects, mut bodies) = registries();
        let cfg = ReasonerConfig::default();
        let state = KinematicState::at_rest(Pose::at(Vec3::new(0.0, 0.0, 0.05)));
        assert!(observe(&mut objects, &mut bodies, &cfg, snapshot("c", "cube_1", state)));
        assert_eq!(bodies.state("c"), Some(state));
        assert!(objects.get("c").unwrap().action.is_some());
    }

    /// Accepts bodies but refuses to teleport them.
    struct StuckEngine(SimEngine);

    impl PhysicsEngine for StuckEngine {
        fn instantiate_ground(&mut self) -> Result<BodyHandle, PhysicsError> {
            self.0.instantiate_ground()
        }
        fn instantiate_body(&mut self, asset_key: &str, pose: &Pose) -> Result<BodyHandle, PhysicsError> {
            self.0.instantiate_body(asset_key, pose)
        }
        fn step(&mut self, dt: f32) {
            self.0.step(dt);
        }
        fn body_state(&self, handle: BodyHandle) -> Option<KinematicState> {
            self.0.body_state(handle)
        }
        fn set_body_state(&mut self, handle: BodyHandle, _state: &KinematicState) -> Result<(), PhysicsError> {
            Err(PhysicsError::UnknownBody(handle))
        }
        fn set_friction(&mut self, handle: BodyHandle, params: FrictionParams) -> Result<(), PhysicsError> {
            self.0.set_friction(handle, params)
        }
        fn remove_body(&mut self, handle: BodyHandle) {
            self.0.remove_body(handle);
        }
        fn body_count(&self) -> usize {
            self.0.body_count()
        }
    }

    #[test]
    fn tracker_attached_even_when_first_force_fails() {
        let library = ShapeLibrary::in_memory().with_asset("cube", ShapeAsset::cuboid([0.05; 3], 0.1));
        let mut bodies = BodyRegistry::new(Box::new(StuckEngine(SimEngine::new(library))));
        let mut objects = ObjectRegistry::new();
        let cfg = ReasonerConfig::default();
        let state = KinematicState::at_rest(Pose::at(Vec3::new(0.0, 0.0, 0.05)));

        assert!(!observe(&mut objects, &mut bodies, &cfg, snapshot("c", "cube_1", state)));
        assert!(bodies.is_simulated("c"));
        assert!(objects.get("c").unwrap().action.is_some());
    }

    #[test]
    fn jitter_does_not_resync_stable_object() {
        let (mut objects, mut bodies) = registries();
        let cfg = ReasonerConfig::default();
        let at = |x: f32| KinematicState::at_rest(Pose::at(Vec3::new(x, 0.0, 0.05)));
        observe(&mut objects, &mut bodies, &cfg, snapshot("c", "cube", at(0.0)));
        assert!(!observe(&mut objects, &mut bodies, &cfg, snapshot("c", "cube", at(0.005))));
        assert!(observe(&mut objects, &mut bodies, &cfg, snapshot("c", "cube", at(0.05))));
    }

    #[test]
    fn unstable_object_always_resyncs() {
        let (mut objects, mut bodies) = registries();
        let cfg = ReasonerConfig::default();
        let state = KinematicState::at_rest(Pose::at(Vec3::new(0.0, 0.0, 0.05)));
        observe(&mut objects, &mut bodies, &cfg, snapshot("c", "cube", state));
        objects.get_mut("c").unwrap().is_unstable = true;
        assert!(observe(&mut objects, &mut bodies, &cfg, snapshot("c", "cube", state)));
    }

    #[test]
    fn missing_asset_is_not_resynced() {
        let (mut objects, mut bodies) = registries();
        let cfg = ReasonerConfig::default();
        let state = KinematicState::default();
        assert!(!observe(&mut objects, &mut bodies, &cfg, snapshot("t", "teapot", state)));
        assert!(objects.get("t").unwrap().action.is_none());
    }

    #[test]
    fn stationary_object_stays_stable() {
        let (mut objects, mut bodies) = registries();
        let cfg = ReasonerConfig::default();
        let state = KinematicState::at_rest(Pose::at(Vec3::new(0.0, 0.0, 0.05)));
        observe(&mut objects, &mut bodies, &cfg, snapshot("c", "cube", state));

        let report = evaluate(&mut objects, &mut bodies, &cfg);
        assert_eq!(report.steps, 24);
        assert!(report.unstable.is_empty());
        assert!(!objects.get("c").unwrap().is_unstable);
    }

    #[test]
    fn diverging_object_is_pinned_and_carries_contents() {
        let (mut objects, mut bodies) = registries();
        let cfg = ReasonerConfig::default();

        // The box is perceived moving at 1 m/s; the cube sits inside it.
        let moving = KinematicState::new(
            Pose::at(Vec3::new(0.0, 0.0, 0.1)),
            Twist::new(Vec3::new(1.0, 0.0, 0.0), Vec3::zero()),
        );
        observe(&mut objects, &mut bodies, &cfg, snapshot("b", "box", moving));
        let inside = KinematicState::at_rest(Pose::at(Vec3::new(0.0, 0.0, 0.05)));
        observe(&mut objects, &mut bodies, &cfg, snapshot("c", "cube", inside));
        objects.get_mut("b").unwrap().contains.insert("c".into());
        // Occluded by the box walls.
        objects.get_mut("c").unwrap().is_perceived = false;

        let report = evaluate(&mut objects, &mut bodies, &cfg);
        assert_eq!(report.unstable, vec!["b".to_string()]);
        assert!(objects.get("b").unwrap().is_unstable);
        assert!(!objects.get("c").unwrap().is_unstable);

        // Pinned to perception after the last micro-step.
        let b = bodies.state("b").unwrap();
        assert!(b.position().abs_diff_le(moving.position(), 1e-6), "{b:?}");
        // The cube was carried back by the box offset and inherited its
        // velocity, so it ends close to where it started.
        let c = bodies.state("c").unwrap();
        assert!((c.twist.linear.x - 1.0).abs() < 1e-6);
        assert!(c.position().x.abs() < cfg.simulation_tolerance, "{c:?}");
    }

    #[test]
    fn container_displacement_carries_contents_from_corrected_pose() {
        let (mut objects, mut bodies) = registries();
        let cfg = ReasonerConfig::default();
        let box_at = |x: f32| KinematicState::at_rest(Pose::at(Vec3::new(x, 0.0, 0.1)));
        let cube_state = KinematicState::at_rest(Pose::at(Vec3::new(0.0, 0.0, 0.05)));

        observe(&mut objects, &mut bodies, &cfg, snapshot("b", "box", box_at(0.0)));
        observe(&mut objects, &mut bodies, &cfg, snapshot("c", "cube", cube_state));
        objects.get_mut("b").unwrap().corrected = Some(box_at(0.0));
        objects.get_mut("c").unwrap().corrected = Some(cube_state);
        objects.get_mut("b").unwrap().contains.insert("c".into());

        assert!(observe(&mut objects, &mut bodies, &cfg, snapshot("b", "box", box_at(0.3))));
        let c = bodies.state("c").unwrap();
        assert!(c.position().abs_diff_le(Vec3::new(0.3, 0.0, 0.05), 1e-6), "{c:?}");
    }
}
