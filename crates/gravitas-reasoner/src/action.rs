//! Pick/place/release inference.
//!
//! Each simulated object carries an [`ActionTracker`]: a discrete
//! [`ActionState`] plus three confidences that grow or decay geometrically
//! every cycle depending on what the stability evaluation saw.
//!
//! | Cycle observation | Confidence update | Transition |
//! |---|---|---|
//! | unstable and perceived | pick ×1.85, place ×0.15 | Placed/Released → Held when pick was already > 0.85 |
//! | Held, stable and perceived | place ×1.85, pick ×0.15, release ×0.15 | Held → Placed when place > 0.85 |
//! | Held, not perceived | release ×1.85, pick ×0.15, place ×0.15 | Held → Released when release > 0.85 |
//!
//! Confidences are clamped to `[0.1, 1.0]`.  The pick threshold is tested
//! before the update, so a pick is reported on the cycle after the
//! confidence first crosses it.

use gravitas_types::{ActionKind, ActionState};

/// Threshold (and growth rate) of the pick confidence.
pub const PICK_CONFIDENCE: f32 = 0.85;
/// Threshold (and growth rate) of the place confidence.
pub const PLACE_CONFIDENCE: f32 = 0.85;
/// Threshold (and growth rate) of the release confidence.
pub const RELEASE_CONFIDENCE: f32 = 0.85;

const MIN_CONFIDENCE: f32 = 0.1;
const MAX_CONFIDENCE: f32 = 1.0;

/// A confidence value kept inside `[0.1, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Confidence(f32);

impl Confidence {
    pub fn new(value: f32) -> Self {
        Self(value.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    fn grow(&mut self, rate: f32) {
        *self = Self::new(self.0 * (1.0 + rate));
    }

    fn decay(&mut self, rate: f32) {
        *self = Self::new(self.0 * (1.0 - rate));
    }
}

/// Manipulation state of one object.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionTracker {
    state: ActionState,
    pick: Confidence,
    place: Confidence,
    release: Confidence,
}

impl Default for ActionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionTracker {
    /// A freshly simulated object is assumed to be lying somewhere.
    pub fn new() -> Self {
        Self {
            state: ActionState::Placed,
            pick: Confidence::new(0.1),
            place: Confidence::new(1.0),
            release: Confidence::new(0.1),
        }
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    pub fn pick(&self) -> f32 {
        self.pick.value()
    }

    pub fn place(&self) -> f32 {
        self.place.value()
    }

    pub fn release(&self) -> f32 {
        self.release.value()
    }

    /// The object is perceived and its simulation diverged this cycle.
    pub fn on_disturbed(&mut self, infer: bool) -> Option<ActionKind> {
        let mut event = None;
        if infer
            && matches!(self.state, ActionState::Placed | ActionState::Released)
            && self.pick.value() > PICK_CONFIDENCE
        {
            self.state = ActionState::Held;
            event = Some(ActionKind::Pick);
        }
        self.pick.grow(PICK_CONFIDENCE);
        self.place.decay(PICK_CONFIDENCE);
        event
    }

    /// The object was stable this cycle, or is no longer perceived.
    pub fn on_settled(&mut self, perceived: bool, infer: bool) -> Option<ActionKind> {
        if !infer || self.state != ActionState::Held {
            return None;
        }
        if perceived {
            self.place.grow(PLACE_CONFIDENCE);
            self.pick.decay(PLACE_CONFIDENCE);
            self.release.decay(RELEASE_CONFIDENCE);
            if self.place.value() > PLACE_CONFIDENCE {
                self.state = ActionState::Placed;
                return Some(ActionKind::Place);
            }
        } else {
            self.release.grow(RELEASE_CONFIDENCE);
            self.pick.decay(PLACE_CONFIDENCE);
            self.place.decay(PICK_CONFIDENCE);
            if self.release.value() > RELEASE_CONFIDENCE {
                self.state = ActionState::Released;
                return Some(ActionKind::Release);
            }
        }
        None
    }
}

/// Confidence reported with an event of `kind`.
pub fn event_confidence(kind: ActionKind) -> f32 {
    match kind {
        ActionKind::Pick => PICK_CONFIDENCE,
        ActionKind::Place => PLACE_CONFIDENCE,
        ActionKind::Release => RELEASE_CONFIDENCE,
    }
}
