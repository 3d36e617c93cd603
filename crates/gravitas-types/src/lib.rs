//! `gravitas-types` – shared data model of the Gravitas scene reasoner.
//!
//! Holds the inbound world events, the outbound change sets, the relation
//! and action records the reasoner emits, and the workspace-wide
//! [`GravitasError`].

pub mod geometry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use geometry::{KinematicState, Pose, Quaternion, Twist, Vec3};

/// Opaque identifier of an object in the host world model.
pub type ObjectId = String;

/// Name of the object property carrying the local bounding-box extent.
pub const AABB_PROPERTY: &str = "aabb";

// ────────────────────────────────────────────────────────────────────────────
// Inbound world model
// ────────────────────────────────────────────────────────────────────────────

/// Type tag of a world-model node.  Only [`NodeKind::Mesh`] nodes are
/// physical objects that take part in reasoning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Entity,
    Mesh,
    Camera,
}

/// A name/value pair from the host's string-encoded property list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub data: String,
}

impl Property {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// Full state of an object as published by the world model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub id: ObjectId,
    /// Display name, also used to derive the shape-asset key.
    pub name: String,
    pub kind: NodeKind,
    pub state: KinematicState,
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl ObjectSnapshot {
    /// Look up a property by name.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.data.as_str())
    }

    /// Parse the `aabb` property (`"x,y,z"`, full sizes) into a local extent.
    ///
    /// # Errors
    ///
    /// [`GravitasError::MissingGeometry`] when the property is absent and
    /// [`GravitasError::MalformedGeometry`] when it is not three floats.
    pub fn extent(&self) -> Result<Vec3, GravitasError> {
        let raw = self
            .property(AABB_PROPERTY)
            .ok_or_else(|| GravitasError::MissingGeometry(self.id.clone()))?;
        let parts: Vec<f32> = raw
            .split(',')
            .map(|s| s.trim().parse::<f32>())
            .collect::<Result<_, _>>()
            .map_err(|e| GravitasError::MalformedGeometry {
                object: self.id.clone(),
                details: e.to_string(),
            })?;
        match parts.as_slice() {
            [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
            _ => Err(GravitasError::MalformedGeometry {
                object: self.id.clone(),
                details: format!("expected 3 components, got {}", parts.len()),
            }),
        }
    }
}

/// Change notification from the world model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum WorldEvent {
    /// An object was created or updated by perception.
    Upserted(ObjectSnapshot),
    /// An object was removed from the world.
    Deleted(ObjectId),
}

// ────────────────────────────────────────────────────────────────────────────
// Reasoning outputs
// ────────────────────────────────────────────────────────────────────────────

/// Discrete manipulation state of a tracked object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionState {
    Placed,
    Held,
    Released,
}

/// Kind of manipulation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Pick,
    Place,
    Release,
}

impl ActionKind {
    /// Verb phrase used in event descriptions.
    pub fn verb(self) -> &'static str {
        match self {
            ActionKind::Pick => "picked up",
            ActionKind::Place => "placed",
            ActionKind::Release => "released",
        }
    }
}

/// Static spatial relation between two objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// Subject rests inside object.
    In,
    /// Subject rests on top of object.
    OnTop,
}

impl RelationKind {
    /// Predicate name used on the wire.
    pub fn predicate(self) -> &'static str {
        match self {
            RelationKind::In => "isIn",
            RelationKind::OnTop => "isOn",
        }
    }

    fn phrase(self, ongoing: bool) -> &'static str {
        match (self, ongoing) {
            (RelationKind::In, true) => "is in",
            (RelationKind::In, false) => "was in",
            (RelationKind::OnTop, true) => "is on",
            (RelationKind::OnTop, false) => "was on",
        }
    }
}

/// A spatial relation observed over an interval.  `end` is `None` while the
/// relation still holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationFact {
    pub id: Uuid,
    pub kind: RelationKind,
    pub subject: ObjectId,
    pub object: ObjectId,
    pub confidence: f32,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl RelationFact {
    /// Open a new relation starting at `start`.
    pub fn open(
        kind: RelationKind,
        subject: (&str, &str),
        object: (&str, &str),
        confidence: f32,
        start: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            subject: subject.0.to_string(),
            object: object.0.to_string(),
            confidence,
            description: format!("{} {} {}", subject.1, kind.phrase(true), object.1),
            start,
            end: None,
        }
    }

    /// Close the relation at `end`, rewriting the description in the past
    /// tense.  Names are passed again because the record stores ids only.
    pub fn close(&mut self, subject_name: &str, object_name: &str, end: DateTime<Utc>) {
        self.end = Some(end);
        self.description = format!("{} {} {}", subject_name, self.kind.phrase(false), object_name);
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

/// An instantaneous manipulation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    pub id: Uuid,
    pub kind: ActionKind,
    pub subject: ObjectId,
    pub confidence: f32,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl ActionEvent {
    pub fn new(
        kind: ActionKind,
        subject: &str,
        subject_name: &str,
        confidence: f32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            subject: subject.to_string(),
            confidence,
            description: format!("{} {}", subject_name, kind.verb()),
            timestamp,
        }
    }
}

/// A situation record sent to the world model: either a fact or an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Situation {
    Fact(RelationFact),
    Action(ActionEvent),
}

impl Situation {
    pub fn id(&self) -> Uuid {
        match self {
            Situation::Fact(f) => f.id,
            Situation::Action(a) => a.id,
        }
    }

    /// `"fact"` or `"action"`.
    pub fn kind_tag(&self) -> &'static str {
        match self {
            Situation::Fact(_) => "fact",
            Situation::Action(_) => "action",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Situation::Fact(f) => &f.description,
            Situation::Action(a) => &a.description,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        match self {
            Situation::Fact(f) => f.start,
            Situation::Action(a) => a.timestamp,
        }
    }

    /// End of the interval; `None` for facts that still hold.
    pub fn end(&self) -> Option<DateTime<Utc>> {
        match self {
            Situation::Fact(f) => f.end,
            Situation::Action(a) => Some(a.timestamp),
        }
    }

    /// Flat property-list rendering for hosts that store situations as
    /// name/value bags.
    pub fn properties(&self) -> Vec<Property> {
        match self {
            Situation::Fact(f) => vec![
                Property::new("subject", f.subject.clone()),
                Property::new("object", f.object.clone()),
                Property::new("predicate", f.kind.predicate()),
            ],
            Situation::Action(a) => vec![
                Property::new("subject", a.subject.clone()),
                Property::new("action", format!("{:?}", a.kind)),
            ],
        }
    }
}

/// Corrected state of one object for the output world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectUpdate {
    pub id: ObjectId,
    pub state: KinematicState,
}

/// Everything one reasoning cycle produced, as a single batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Name of the output world the batch applies to.
    pub world: String,
    pub stamp: DateTime<Utc>,
    pub objects: Vec<ObjectUpdate>,
    pub situations: Vec<Situation>,
    /// Objects removed from the input world since the previous batch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deleted: Vec<ObjectId>,
}

impl ChangeSet {
    pub fn new(world: impl Into<String>, stamp: DateTime<Utc>) -> Self {
        Self {
            world: world.into(),
            stamp,
            objects: Vec::new(),
            situations: Vec::new(),
            deleted: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.situations.is_empty() && self.deleted.is_empty()
    }

    /// Action events contained in this batch.
    pub fn actions(&self) -> impl Iterator<Item = &ActionEvent> {
        self.situations.iter().filter_map(|s| match s {
            Situation::Action(a) => Some(a),
            Situation::Fact(_) => None,
        })
    }

    /// Relation facts (opened or closed) contained in this batch.
    pub fn facts(&self) -> impl Iterator<Item = &RelationFact> {
        self.situations.iter().filter_map(|s| match s {
            Situation::Fact(f) => Some(f),
            Situation::Action(_) => None,
        })
    }

    /// The reported state of `id`, if the batch carries one.
    pub fn object(&self, id: &str) -> Option<&ObjectUpdate> {
        self.objects.iter().find(|o| o.id == id)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Bus envelope
// ────────────────────────────────────────────────────────────────────────────

/// Unified event wrapper for the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "gravitas-reasoner::service"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` in a fresh envelope stamped now.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// Inbound change from the world model.
    World(WorldEvent),
    /// One reasoning cycle's output batch.
    Changes(ChangeSet),
    /// A reasoning cycle ran below half the target frequency.
    PerformanceWarning { achieved_hz: f32, target_hz: f32 },
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Workspace-wide error type.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GravitasError {
    #[error("object {0} has no `aabb` property")]
    MissingGeometry(ObjectId),

    #[error("object {object} has a malformed `aabb` property: {details}")]
    MalformedGeometry { object: ObjectId, details: String },

    #[error("shape asset '{0}' not found")]
    AssetNotFound(String),

    #[error("failed to instantiate shape asset '{key}': {details}")]
    Instantiation { key: String, details: String },

    #[error("unknown object: {0}")]
    UnknownObject(ObjectId),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("channel error: {0}")]
    Channel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(props: Vec<Property>) -> ObjectSnapshot {
        ObjectSnapshot {
            id: "cup_1".to_string(),
            name: "cup_1".to_string(),
            kind: NodeKind::Mesh,
            state: KinematicState::default(),
            properties: props,
        }
    }

    #[test]
    fn extent_parses_three_components() {
        let s = snapshot(vec![Property::new("aabb", "0.1, 0.2,0.3")]);
        let e = s.extent().unwrap();
        assert!((e.x - 0.1).abs() < 1e-6);
        assert!((e.y - 0.2).abs() < 1e-6);
        assert!((e.z - 0.3).abs() < 1e-6);
    }

    #[test]
    fn extent_missing_property_is_missing_geometry() {
        let s = snapshot(vec![Property::new("class", "Cup")]);
        assert_eq!(s.extent(), Err(GravitasError::MissingGeometry("cup_1".into())));
    }

    #[test]
    fn extent_wrong_arity_is_malformed() {
        let s = snapshot(vec![Property::new("aabb", "0.1,0.2")]);
        assert!(matches!(s.extent(), Err(GravitasError::MalformedGeometry { .. })));

        let s = snapshot(vec![Property::new("aabb", "a,b,c")]);
        assert!(matches!(s.extent(), Err(GravitasError::MalformedGeometry { .. })));
    }

    #[test]
    fn relation_close_rewrites_description() {
        let now = Utc::now();
        let mut fact = RelationFact::open(RelationKind::In, ("c", "cube"), ("b", "box"), 0.65, now);
        assert_eq!(fact.description, "cube is in box");
        assert!(fact.is_open());

        fact.close("cube", "box", now);
        assert_eq!(fact.description, "cube was in box");
        assert_eq!(fact.end, Some(now));
    }

    #[test]
    fn action_situation_is_instantaneous() {
        let now = Utc::now();
        let s = Situation::Action(ActionEvent::new(ActionKind::Pick, "c", "cube", 0.85, now));
        assert_eq!(s.kind_tag(), "action");
        assert_eq!(s.start(), now);
        assert_eq!(s.end(), Some(now));
        assert_eq!(s.description(), "cube picked up");
    }

    #[test]
    fn fact_properties_carry_predicate() {
        let fact = RelationFact::open(RelationKind::OnTop, ("a", "a"), ("b", "b"), 0.95, Utc::now());
        let props = Situation::Fact(fact).properties();
        assert!(props.contains(&Property::new("predicate", "isOn")));
        assert!(props.contains(&Property::new("object", "b")));
    }

    #[test]
    fn world_event_roundtrip() {
        let event = WorldEvent::Upserted(snapshot(vec![Property::new("aabb", "1,1,1")]));
        let json = serde_json::to_string(&event).unwrap();
        let back: WorldEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);

        let json = serde_json::to_string(&WorldEvent::Deleted("x".into())).unwrap();
        assert!(json.contains("deleted"));
    }

    #[test]
    fn gravitas_error_display() {
        let err = GravitasError::AssetNotFound("red_cube".into());
        assert!(err.to_string().contains("red_cube"));
    }
}
