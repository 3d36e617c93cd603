//! `gravitas-perception` – what the cameras say.
//!
//! Holds the observation side of the reasoner and the geometry used to read
//! spatial relations off observed poses.
//!
//! # Modules
//!
//! - [`buffer`] – [`PerceptionBuffer`][buffer::PerceptionBuffer]: latest and
//!   previous observation of one object plus the staleness test that decides
//!   whether the object is currently perceived.
//! - [`spatial`] – [`BoundingBox`][spatial::BoundingBox] and the
//!   `is_above` / `is_on_top` / `is_in` predicates, the last one with
//!   asymmetric hysteresis margins so relations do not flicker under jitter.

pub mod buffer;
pub mod spatial;

pub use buffer::PerceptionBuffer;
pub use spatial::{BoundingBox, EPSILON, Footprint, is_above, is_in, is_on_top};
