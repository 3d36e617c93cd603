//! Per-object perception buffer.
//!
//! Stores the two most recent observations of an object together with the
//! time the latest one arrived.  The reasoner reads it to decide
//!
//! - whether the object is still *perceived* (observation fresher than the
//!   staleness window), and
//! - whether the new observation actually moved the object beyond sensor
//!   jitter, which is what triggers resynchronising its simulated body.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use chrono::Utc;
//! use gravitas_perception::buffer::PerceptionBuffer;
//! use gravitas_types::{KinematicState, Pose, Vec3};
//!
//! let mut buf = PerceptionBuffer::new();
//! let now = Utc::now();
//! buf.record(KinematicState::at_rest(Pose::at(Vec3::new(0.0, 0.0, 0.1))), now);
//!
//! assert!(buf.is_fresh(now, Duration::from_millis(900)));
//! assert!(buf.moved_beyond(0.01)); // first sighting always counts as motion
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use gravitas_types::KinematicState;

/// Latest and previous observation of a single object.
#[derive(Debug, Clone, Default)]
pub struct PerceptionBuffer {
    latest: Option<KinematicState>,
    previous: Option<KinematicState>,
    last_seen: Option<DateTime<Utc>>,
}

impl PerceptionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new observation received at `at`.  The former latest
    /// observation becomes the previous one.
    pub fn record(&mut self, state: KinematicState, at: DateTime<Utc>) {
        self.previous = self.latest.replace(state);
        self.last_seen = Some(at);
    }

    /// The most recent observation.
    pub fn latest(&self) -> Option<&KinematicState> {
        self.latest.as_ref()
    }

    /// The observation before the most recent one.
    pub fn previous(&self) -> Option<&KinematicState> {
        self.previous.as_ref()
    }

    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_seen
    }

    /// True when this is the first observation of the object.
    pub fn is_first_sighting(&self) -> bool {
        self.latest.is_some() && self.previous.is_none()
    }

    /// True while the latest observation is younger than `window`.
    ///
    /// Objects that were never stamped count as perceived; a timestamp in the
    /// future (clock skew between hosts) counts as age zero.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match self.last_seen {
            Some(seen) => {
                let age = now.signed_duration_since(seen).to_std().unwrap_or_default();
                age < window
            }
            None => true,
        }
    }

    /// True when the latest observation differs from the previous one by
    /// more than `tolerance` on any position or orientation component.
    ///
    /// A buffer with a single observation always reports motion.
    pub fn moved_beyond(&self, tolerance: f32) -> bool {
        match (&self.previous, &self.latest) {
            (Some(prev), Some(latest)) => {
                !(prev.pose.position.abs_diff_le(latest.pose.position, tolerance)
                    && prev
                        .pose
                        .orientation
                        .abs_diff_le(latest.pose.orientation, tolerance))
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gravitas_types::{Pose, Quaternion, Vec3};

    fn at(x: f32) -> KinematicState {
        KinematicState::at_rest(Pose::at(Vec3::new(x, 0.0, 0.0)))
    }

    #[test]
    fn empty_buffer_is_fresh_and_has_no_latest() {
        let buf = PerceptionBuffer::new();
        assert!(buf.latest().is_none());
        assert!(buf.is_fresh(Utc::now(), Duration::from_millis(10)));
    }

    #[test]
    fn record_shifts_latest_into_previous() {
        let mut buf = PerceptionBuffer::new();
        let now = Utc::now();
        buf.record(at(1.0), now);
        assert!(buf.is_first_sighting());
        buf.record(at(2.0), now);
        assert!(!buf.is_first_sighting());
        assert_eq!(buf.previous().unwrap().position().x, 1.0);
        assert_eq!(buf.latest().unwrap().position().x, 2.0);
    }

    #[test]
    fn staleness_window_expires() {
        let mut buf = PerceptionBuffer::new();
        let seen = Utc::now();
        buf.record(at(0.0), seen);

        let window = Duration::from_millis(900);
        assert!(buf.is_fresh(seen + chrono::Duration::milliseconds(899), window));
        assert!(!buf.is_fresh(seen + chrono::Duration::milliseconds(900), window));
    }

    #[test]
    fn future_timestamp_counts_as_fresh() {
        let mut buf = PerceptionBuffer::new();
        let now = Utc::now();
        buf.record(at(0.0), now + chrono::Duration::seconds(5));
        assert!(buf.is_fresh(now, Duration::from_millis(1)));
    }

    #[test]
    fn jitter_below_tolerance_is_not_motion() {
        let mut buf = PerceptionBuffer::new();
        let now = Utc::now();
        buf.record(at(0.0), now);
        buf.record(at(0.005), now);
        assert!(!buf.moved_beyond(0.01));
        buf.record(at(0.02), now);
        assert!(buf.moved_beyond(0.01));
    }

    #[test]
    fn rotation_alone_counts_as_motion() {
        let mut buf = PerceptionBuffer::new();
        let now = Utc::now();
        buf.record(at(0.0), now);
        let mut turned = at(0.0);
        turned.pose.orientation = Quaternion::new(0.9, 0.0, 0.0, 0.436).normalized();
        buf.record(turned, now);
        assert!(buf.moved_beyond(0.01));
    }
}
