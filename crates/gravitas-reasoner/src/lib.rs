//! `gravitas-reasoner` – physics-grounded scene reasoning.
//!
//! Keeps a simulated mirror of the perceived scene, uses it to decide which
//! perceived poses are physically plausible, and derives manipulation events
//! and spatial relations from the corrected scene.
//!
//! # Modules
//!
//! - [`config`] – [`ReasonerConfig`][config::ReasonerConfig]: tunables with
//!   serde defaults.
//! - [`world`] – [`ObjectRegistry`][world::ObjectRegistry]: one
//!   [`TrackedObject`][world::TrackedObject] per perceived mesh.
//! - [`stability`] – micro-step simulation, divergence detection and
//!   containment offset propagation.
//! - [`action`] – pick/place/release confidence state machine.
//! - [`relations`] – isIn / isOnTop detection with open/close bookkeeping.
//! - [`budget`] – [`CycleBudget`][budget::CycleBudget]: flags cycles running
//!   below half the target frequency.
//! - [`cycle`] – [`Reasoner`][cycle::Reasoner]: the per-tick orchestrator.
//! - [`service`] – [`ReasonerService`][service::ReasonerService]: Tokio task
//!   serialising ticks and world events.
//! - [`telemetry`] – tracing subscriber and optional OTLP export.

pub mod action;
pub mod budget;
pub mod config;
pub mod cycle;
pub mod relations;
pub mod service;
pub mod stability;
pub mod telemetry;
pub mod world;

pub use config::ReasonerConfig;
pub use cycle::Reasoner;
pub use service::ReasonerService;
