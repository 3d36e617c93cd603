//! [`SimEngine`] – deterministic in-process physics backend for CI.
//!
//! Bodies are point masses with a box hull.  Each step integrates linear
//! velocity; when gravity is enabled, dynamic bodies also fall onto a flat
//! floor at z = 0 and slide to rest under Coulomb friction.  There is no
//! body–body contact and orientation is never integrated, which keeps every
//! trajectory easy to predict in a test.
//!
//! # Example
//!
//! ```rust
//! use gravitas_physics::{PhysicsEngine, ShapeAsset, ShapeLibrary, SimEngine};
//! use gravitas_types::{Pose, Vec3};
//!
//! let library = ShapeLibrary::in_memory().with_asset("cube", ShapeAsset::cuboid([0.05; 3], 0.1));
//! let mut engine = SimEngine::new(library).with_gravity(-10.0);
//! let cube = engine.instantiate_body("cube", &Pose::at(Vec3::new(0.0, 0.0, 0.5))).unwrap();
//!
//! for _ in 0..240 {
//!     engine.step(1.0 / 240.0);
//! }
//! let z = engine.body_state(cube).unwrap().pose.position.z;
//! assert!((z - 0.05).abs() < 1e-4);
//! ```

use std::collections::BTreeMap;

use gravitas_types::{KinematicState, Pose, Vec3};

use crate::assets::ShapeLibrary;
use crate::engine::{BodyHandle, FrictionParams, PhysicsEngine, PhysicsError};

struct SimBody {
    state: KinematicState,
    half_extents: Vec3,
    fixed: bool,
    friction: FrictionParams,
}

/// Deterministic [`PhysicsEngine`] used by tests and the replay tooling.
pub struct SimEngine {
    library: ShapeLibrary,
    gravity: f32,
    bodies: BTreeMap<BodyHandle, SimBody>,
    next_handle: u64,
    steps: u64,
}

impl SimEngine {
    /// A gravity-free engine: bodies only move with the velocity they are
    /// given.
    pub fn new(library: ShapeLibrary) -> Self {
        Self {
            library,
            gravity: 0.0,
            bodies: BTreeMap::new(),
            next_handle: 0,
            steps: 0,
        }
    }

    /// Enable vertical gravity `g` (negative pulls down) and the floor.
    pub fn with_gravity(mut self, g: f32) -> Self {
        self.gravity = g;
        self
    }

    /// Number of steps taken since construction.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    fn insert(&mut self, body: SimBody) -> BodyHandle {
        let handle = BodyHandle(self.next_handle);
        self.next_handle += 1;
        self.bodies.insert(handle, body);
        handle
    }

    fn body_mut(&mut self, handle: BodyHandle) -> Result<&mut SimBody, PhysicsError> {
        self.bodies.get_mut(&handle).ok_or(PhysicsError::UnknownBody(handle))
    }
}

impl PhysicsEngine for SimEngine {
    fn instantiate_ground(&mut self) -> Result<BodyHandle, PhysicsError> {
        let state = KinematicState::at_rest(Pose::at(Vec3::new(0.0, 0.0, -0.5)));
        Ok(self.insert(SimBody {
            state,
            half_extents: Vec3::new(50.0, 50.0, 0.5),
            fixed: true,
            friction: FrictionParams::default(),
        }))
    }

    fn instantiate_body(&mut self, asset_key: &str, pose: &Pose) -> Result<BodyHandle, PhysicsError> {
        let asset = self.library.load(asset_key)?;
        let half_extents = asset.bounding_half_extents(asset_key)?;
        Ok(self.insert(SimBody {
            state: KinematicState::at_rest(*pose),
            half_extents,
            fixed: asset.is_fixed(),
            friction: FrictionParams {
                sliding: asset.friction,
                ..FrictionParams::default()
            },
        }))
    }

    fn step(&mut self, dt: f32) {
        let g = self.gravity;
        for body in self.bodies.values_mut().filter(|b| !b.fixed) {
            let twist = &mut body.state.twist;
            let pose = &mut body.state.pose;

            twist.linear.z += g * dt;
            pose.position = pose.position.add(twist.linear.scale(dt));

            if g != 0.0 {
                let floor = body.half_extents.z;
                if pose.position.z <= floor {
                    pose.position.z = floor;
                    twist.linear.z = twist.linear.z.max(0.0);

                    // Coulomb friction decelerates horizontal motion.
                    let speed = (twist.linear.x * twist.linear.x + twist.linear.y * twist.linear.y).sqrt();
                    if speed > 0.0 {
                        let slowed = (speed - body.friction.sliding * g.abs() * dt).max(0.0);
                        twist.linear.x *= slowed / speed;
                        twist.linear.y *= slowed / speed;
                    }
                }
            }

            twist.angular = twist.angular.scale((1.0 - body.friction.rolling * dt).max(0.0));
        }
        self.steps += 1;
    }

    fn body_state(&self, handle: BodyHandle) -> Option<KinematicState> {
        self.bodies.get(&handle).map(|b| b.state)
    }

    fn set_body_state(&mut self, handle: BodyHandle, state: &KinematicState) -> Result<(), PhysicsError> {
        self.body_mut(handle)?.state = *state;
        Ok(())
    }

    fn set_friction(&mut self, handle: BodyHandle, params: FrictionParams) -> Result<(), PhysicsError> {
        self.body_mut(handle)?.friction = params;
        Ok(())
    }

    fn remove_body(&mut self, handle: BodyHandle) {
        self.bodies.remove(&handle);
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }
}
