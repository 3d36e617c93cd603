//! [`PhysicsEngine`] – capability interface of the rigid-body simulator.
//!
//! The reasoner needs very little from a physics engine: create a body from
//! a named shape asset, advance time by a fixed step, and read or overwrite a
//! body's pose and velocity.  Anything that implements this trait can drive
//! the reasoner; [`RapierEngine`][crate::rapier::RapierEngine] is the
//! production backend and [`SimEngine`][crate::sim::SimEngine] the
//! deterministic one used in tests.

use gravitas_types::{GravitasError, KinematicState, ObjectId, Pose};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque handle of a body inside an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub u64);

/// Contact friction applied to every object body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrictionParams {
    /// Coulomb (sliding) friction coefficient.
    pub sliding: f32,
    /// Resistance to rolling; backends without a rolling model map it to
    /// angular damping.
    pub rolling: f32,
    /// Resistance to spinning about the contact normal.
    pub spinning: f32,
}

impl Default for FrictionParams {
    fn default() -> Self {
        Self {
            sliding: 0.7,
            rolling: 0.9,
            spinning: 0.9,
        }
    }
}

/// Errors raised by engines and the body registry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    #[error("shape asset '{0}' not found on the asset search path")]
    AssetMissing(String),

    #[error("failed to instantiate shape asset '{key}': {details}")]
    Instantiation { key: String, details: String },

    #[error("object {0} has no simulated body")]
    Unavailable(ObjectId),

    #[error("unknown body handle {0:?}")]
    UnknownBody(BodyHandle),
}

impl From<PhysicsError> for GravitasError {
    fn from(e: PhysicsError) -> Self {
        match e {
            PhysicsError::AssetMissing(key) => GravitasError::AssetNotFound(key),
            PhysicsError::Instantiation { key, details } => {
                GravitasError::Instantiation { key, details }
            }
            PhysicsError::Unavailable(id) => GravitasError::UnknownObject(id),
            PhysicsError::UnknownBody(h) => {
                GravitasError::UnknownObject(format!("body #{}", h.0))
            }
        }
    }
}

/// The capability set the reasoner requires from a physics engine.
pub trait PhysicsEngine: Send {
    /// Create the static ground/support body.
    fn instantiate_ground(&mut self) -> Result<BodyHandle, PhysicsError>;

    /// Create a body from the shape asset `asset_key`, placed at `pose`.
    fn instantiate_body(&mut self, asset_key: &str, pose: &Pose) -> Result<BodyHandle, PhysicsError>;

    /// Advance the whole simulation by `dt` seconds.
    fn step(&mut self, dt: f32);

    /// Current pose and velocity of a body.
    fn body_state(&self, handle: BodyHandle) -> Option<KinematicState>;

    /// Teleport a body to `state`, overwriting its velocity.
    fn set_body_state(&mut self, handle: BodyHandle, state: &KinematicState) -> Result<(), PhysicsError>;

    /// Change the contact friction of a body.
    fn set_friction(&mut self, handle: BodyHandle, params: FrictionParams) -> Result<(), PhysicsError>;

    /// Remove a body.  Unknown handles are ignored.
    fn remove_body(&mut self, handle: BodyHandle);

    /// Number of bodies currently in the simulation, ground included.
    fn body_count(&self) -> usize;
}
