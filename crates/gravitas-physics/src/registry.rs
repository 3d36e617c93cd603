//! [`BodyRegistry`] – maps tracked objects to simulated bodies.
//!
//! Bodies are created lazily the first time an object is asked for one.  The
//! shape-asset key is derived from the object's display name with
//! [`asset_key`].  A failed instantiation is remembered as a permanent
//! [`BodySlot::Unavailable`] sentinel: the failure is logged once and never
//! retried, and the object is left to perception-only reporting.
//!
//! The ground/support body is created once, just before the first object
//! body.

use std::collections::HashMap;

use gravitas_types::{KinematicState, ObjectId, Pose};
use tracing::{debug, info, warn};

use crate::assets::asset_key;
use crate::engine::{BodyHandle, FrictionParams, PhysicsEngine, PhysicsError};

/// Body slot of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySlot {
    Simulated(BodyHandle),
    /// Instantiation failed; the object has no body for its lifetime.
    Unavailable,
}

/// Result of [`BodyRegistry::ensure_body`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyEntry {
    pub handle: BodyHandle,
    /// True when the body was instantiated by this call.
    pub created: bool,
}

/// Per-world table of simulated bodies.
pub struct BodyRegistry {
    engine: Box<dyn PhysicsEngine>,
    slots: HashMap<ObjectId, BodySlot>,
    simulated: Vec<ObjectId>,
    ground: Option<BodySlot>,
    friction: FrictionParams,
}

impl BodyRegistry {
    pub fn new(engine: Box<dyn PhysicsEngine>) -> Self {
        Self {
            engine,
            slots: HashMap::new(),
            simulated: Vec::new(),
            ground: None,
            friction: FrictionParams::default(),
        }
    }

    /// Friction applied to every body created from now on.
    pub fn with_friction(mut self, friction: FrictionParams) -> Self {
        self.friction = friction;
        self
    }

    /// Return the body of `object`, instantiating it at `pose` on first
    /// request.
    ///
    /// # Errors
    ///
    /// The engine's error on the failing call, [`PhysicsError::Unavailable`]
    /// on every later call for the same object.
    pub fn ensure_body(&mut self, object: &str, name: &str, pose: &Pose) -> Result<BodyEntry, PhysicsError> {
        match self.slots.get(object) {
            Some(BodySlot::Simulated(handle)) => {
                return Ok(BodyEntry {
                    handle: *handle,
                    created: false,
                });
            }
            Some(BodySlot::Unavailable) => return Err(PhysicsError::Unavailable(object.to_string())),
            None => {}
        }

        self.ensure_ground();

        let key = asset_key(name);
        match self.engine.instantiate_body(&key, pose) {
            Ok(handle) => {
                if let Err(e) = self.engine.set_friction(handle, self.friction) {
                    warn!(object, error = %e, "could not apply friction");
                }
                self.slots.insert(object.to_string(), BodySlot::Simulated(handle));
                self.simulated.push(object.to_string());
                info!(object, asset = %key, "body instantiated");
                Ok(BodyEntry { handle, created: true })
            }
            Err(e) => {
                warn!(
                    object,
                    asset = %key,
                    error = %e,
                    "no simulated body, object falls back to perception-only reporting"
                );
                self.slots.insert(object.to_string(), BodySlot::Unavailable);
                Err(e)
            }
        }
    }

    /// Ensure a body exists and force it to `state`.
    pub fn sync(&mut self, object: &str, name: &str, state: &KinematicState) -> Result<BodyEntry, PhysicsError> {
        let entry = self.ensure_body(object, name, &state.pose)?;
        self.engine.set_body_state(entry.handle, state)?;
        Ok(entry)
    }

    fn ensure_ground(&mut self) {
        if self.ground.is_some() {
            return;
        }
        let slot = match self.engine.instantiate_ground() {
            Ok(handle) => {
                debug!(?handle, "ground body instantiated");
                BodySlot::Simulated(handle)
            }
            Err(e) => {
                warn!(error = %e, "ground body unavailable");
                BodySlot::Unavailable
            }
        };
        self.ground = Some(slot);
    }

    pub fn ground(&self) -> Option<BodyHandle> {
        match self.ground {
            Some(BodySlot::Simulated(h)) => Some(h),
            _ => None,
        }
    }

    pub fn slot(&self, object: &str) -> Option<BodySlot> {
        self.slots.get(object).copied()
    }

    pub fn handle(&self, object: &str) -> Option<BodyHandle> {
        match self.slots.get(object) {
            Some(BodySlot::Simulated(h)) => Some(*h),
            _ => None,
        }
    }

    pub fn is_simulated(&self, object: &str) -> bool {
        self.handle(object).is_some()
    }

    /// Objects with a live body, in instantiation order.
    pub fn simulated_ids(&self) -> &[ObjectId] {
        &self.simulated
    }

    /// Simulated state of `object`.
    pub fn state(&self, object: &str) -> Option<KinematicState> {
        self.handle(object).and_then(|h| self.engine.body_state(h))
    }

    /// Force the body of `object` to `state`.
    pub fn set_state(&mut self, object: &str, state: &KinematicState) -> Result<(), PhysicsError> {
        let handle = self
            .handle(object)
            .ok_or_else(|| PhysicsError::Unavailable(object.to_string()))?;
        self.engine.set_body_state(handle, state)
    }

    /// Advance every body by `dt`.
    pub fn step(&mut self, dt: f32) {
        self.engine.step(dt);
    }

    /// Forget `object`, removing its body.  Returns whether a slot existed.
    pub fn remove(&mut self, object: &str) -> bool {
        match self.slots.remove(object) {
            Some(BodySlot::Simulated(handle)) => {
                self.engine.remove_body(handle);
                self.simulated.retain(|id| id != object);
                true
            }
            Some(BodySlot::Unavailable) => true,
            None => false,
        }
    }

    pub fn engine(&self) -> &dyn PhysicsEngine {
        self.engine.as_ref()
    }
}
