//! `gravitas-physics` – the simulated mirror of the scene.
//!
//! Wraps the rigid-body simulator behind a narrow capability interface so the
//! reasoner never talks to a physics library directly.
//!
//! # Modules
//!
//! - [`engine`] – [`PhysicsEngine`][engine::PhysicsEngine]: the capability
//!   trait (instantiate, step, read/write body state, friction).
//! - [`assets`] – [`ShapeLibrary`][assets::ShapeLibrary]: resolves a shape
//!   asset key (derived from an object's display name) to a collider
//!   description stored as TOML on the asset search path.
//! - [`registry`] – [`BodyRegistry`][registry::BodyRegistry]: maps tracked
//!   object ids to simulated bodies, lazily creating them and remembering
//!   permanent failures.
//! - [`rapier`] – [`RapierEngine`][rapier::RapierEngine]: production backend
//!   built on `rapier3d`.
//! - [`sim`] – [`SimEngine`][sim::SimEngine]: deterministic in-process
//!   backend for tests and CI.

pub mod assets;
pub mod engine;
pub mod rapier;
pub mod registry;
pub mod sim;

pub use assets::{DEFAULT_WALL, ShapeAsset, ShapeLibrary, ShapeType, asset_key};
pub use engine::{BodyHandle, FrictionParams, PhysicsEngine, PhysicsError};
pub use rapier::RapierEngine;
pub use registry::{BodyEntry, BodyRegistry, BodySlot};
pub use sim::SimEngine;
