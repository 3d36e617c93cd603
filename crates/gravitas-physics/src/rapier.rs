//! [`RapierEngine`] – production [`PhysicsEngine`] backed by `rapier3d`.
//!
//! The world is z-up.  The ground is a fixed slab whose top face lies at
//! z = 0.  Colliders are built from [`ShapeAsset`]s; cylinders are rotated so
//! their axis runs along world z and containers are compounds of a floor and
//! four walls.  `rapier3d` has no rolling-friction model,
//! so [`FrictionParams::rolling`] is applied as angular damping.

use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;

use gravitas_types::{KinematicState, Pose, Quaternion, Twist, Vec3};
use rapier3d::na::{Isometry3, Quaternion as NaQuaternion, Translation3, UnitQuaternion};
use rapier3d::prelude::*;
use tracing::debug;

use crate::assets::{ShapeAsset, ShapeLibrary, ShapeType};
use crate::engine::{BodyHandle, FrictionParams, PhysicsEngine, PhysicsError};

/// Half thickness of the ground slab.
const GROUND_HALF_THICKNESS: f32 = 0.5;
/// Half width of the ground slab.
const GROUND_HALF_WIDTH: f32 = 50.0;

pub struct RapierEngine {
    library: ShapeLibrary,
    gravity: Vector<Real>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    query_pipeline: QueryPipeline,
    handles: HashMap<BodyHandle, RigidBodyHandle>,
    next_handle: u64,
}

impl RapierEngine {
    /// Create an empty world with the given gravity and nominal time step.
    pub fn new(library: ShapeLibrary, gravity: Vec3, time_step: f32) -> Self {
        let params = IntegrationParameters {
            dt: time_step,
            ..IntegrationParameters::default()
        };
        Self {
            library,
            gravity: vector![gravity.x, gravity.y, gravity.z],
            params,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            handles: HashMap::new(),
            next_handle: 0,
        }
    }

    fn insert(&mut self, body: RigidBody, collider: Collider) -> BodyHandle {
        let rb = self.bodies.insert(body);
        self.colliders.insert_with_parent(collider, rb, &mut self.bodies);
        let handle = BodyHandle(self.next_handle);
        self.next_handle += 1;
        self.handles.insert(handle, rb);
        handle
    }

    fn rigid_body_mut(&mut self, handle: BodyHandle) -> Result<&mut RigidBody, PhysicsError> {
        self.handles
            .get(&handle)
            .and_then(|rb| self.bodies.get_mut(*rb))
            .ok_or(PhysicsError::UnknownBody(handle))
    }
}

fn build_collider(key: &str, asset: &ShapeAsset) -> Result<Collider, PhysicsError> {
    let he = asset.bounding_half_extents(key)?;
    let builder = match asset.shape {
        ShapeType::Cuboid => ColliderBuilder::cuboid(he.x, he.y, he.z),
        ShapeType::Ball => ColliderBuilder::ball(he.x),
        ShapeType::Cylinder => ColliderBuilder::cylinder(he.z, he.x).rotation(vector![FRAC_PI_2, 0.0, 0.0]),
        ShapeType::Container => ColliderBuilder::compound(container_parts(he, asset.wall_thickness())),
    };
    let builder = builder.friction(asset.friction).restitution(asset.restitution);
    let builder = if asset.is_fixed() { builder } else { builder.mass(asset.mass) };
    Ok(builder.build())
}

/// Floor and walls of an open-top container centred on the body origin.
fn container_parts(he: Vec3, wall: f32) -> Vec<(Isometry<Real>, SharedShape)> {
    let t = wall / 2.0;
    vec![
        (Isometry::translation(0.0, 0.0, -he.z + t), SharedShape::cuboid(he.x, he.y, t)),
        (Isometry::translation(he.x - t, 0.0, 0.0), SharedShape::cuboid(t, he.y, he.z)),
        (Isometry::translation(-he.x + t, 0.0, 0.0), SharedShape::cuboid(t, he.y, he.z)),
        (Isometry::translation(0.0, he.y - t, 0.0), SharedShape::cuboid(he.x - wall, t, he.z)),
        (Isometry::translation(0.0, -he.y + t, 0.0), SharedShape::cuboid(he.x - wall, t, he.z)),
    ]
}

fn to_isometry(pose: &Pose) -> Isometry3<Real> {
    let p = pose.position;
    let q = pose.orientation;
    Isometry3::from_parts(
        Translation3::new(p.x, p.y, p.z),
        UnitQuaternion::from_quaternion(NaQuaternion::new(q.w, q.x, q.y, q.z)),
    )
}

fn to_pose(iso: &Isometry3<Real>) -> Pose {
    let t = iso.translation.vector;
    let r = iso.rotation;
    Pose::new(Vec3::new(t.x, t.y, t.z), Quaternion::new(r.w, r.i, r.j, r.k))
}

impl PhysicsEngine for RapierEngine {
    fn instantiate_ground(&mut self) -> Result<BodyHandle, PhysicsError> {
        let body = RigidBodyBuilder::fixed()
            .translation(vector![0.0, 0.0, -GROUND_HALF_THICKNESS])
            .build();
        let collider = ColliderBuilder::cuboid(GROUND_HALF_WIDTH, GROUND_HALF_WIDTH, GROUND_HALF_THICKNESS).build();
        Ok(self.insert(body, collider))
    }

    fn instantiate_body(&mut self, asset_key: &str, pose: &Pose) -> Result<BodyHandle, PhysicsError> {
        let asset = self.library.load(asset_key)?;
        let collider = build_collider(asset_key, &asset)?;
        let builder = if asset.is_fixed() {
            RigidBodyBuilder::fixed()
        } else {
            RigidBodyBuilder::dynamic()
        };
        let handle = self.insert(builder.position(to_isometry(pose)).build(), collider);
        debug!(asset = asset_key, ?handle, "rapier body created");
        Ok(handle)
    }

    fn step(&mut self, dt: f32) {
        self.params.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    fn body_state(&self, handle: BodyHandle) -> Option<KinematicState> {
        let body = self.bodies.get(*self.handles.get(&handle)?)?;
        let lin = body.linvel();
        let ang = body.angvel();
        Some(KinematicState::new(
            to_pose(body.position()),
            Twist::new(Vec3::new(lin.x, lin.y, lin.z), Vec3::new(ang.x, ang.y, ang.z)),
        ))
    }

    fn set_body_state(&mut self, handle: BodyHandle, state: &KinematicState) -> Result<(), PhysicsError> {
        let body = self.rigid_body_mut(handle)?;
        let lin = state.twist.linear;
        let ang = state.twist.angular;
        body.set_position(to_isometry(&state.pose), true);
        body.set_linvel(vector![lin.x, lin.y, lin.z], true);
        body.set_angvel(vector![ang.x, ang.y, ang.z], true);
        Ok(())
    }

    fn set_friction(&mut self, handle: BodyHandle, params: FrictionParams) -> Result<(), PhysicsError> {
        let body = self.rigid_body_mut(handle)?;
        body.set_angular_damping(params.rolling);
        let attached: Vec<ColliderHandle> = body.colliders().to_vec();
        for ch in attached {
            if let Some(collider) = self.colliders.get_mut(ch) {
                collider.set_friction(params.sliding);
            }
        }
        Ok(())
    }

    fn remove_body(&mut self, handle: BodyHandle) {
        if let Some(rb) = self.handles.remove(&handle) {
            self.bodies.remove(
                rb,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            );
        }
    }

    fn body_count(&self) -> usize {
        self.handles.len()
    }
}
