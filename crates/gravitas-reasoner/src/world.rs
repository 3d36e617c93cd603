//! Tracked objects and their registry.
//!
//! A [`TrackedObject`] holds everything the reasoner knows about one mesh:
//! its latest snapshot, the perception buffer, the pose it last reported
//! (the *corrected* pose), the per-cycle stability flags, its action tracker
//! and the set of objects it currently contains.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use gravitas_perception::PerceptionBuffer;
use gravitas_types::{GravitasError, KinematicState, ObjectId, ObjectSnapshot, Vec3};

use crate::action::ActionTracker;

#[derive(Debug, Clone)]
pub struct TrackedObject {
    snapshot: ObjectSnapshot,
    pub perception: PerceptionBuffer,
    /// State reported in the most recent change set.
    pub corrected: Option<KinematicState>,
    pub is_perceived: bool,
    pub is_unstable: bool,
    /// Present once the object has a simulated body.
    pub action: Option<ActionTracker>,
    /// Objects currently resting inside this one.
    pub contains: BTreeSet<ObjectId>,
}

impl TrackedObject {
    fn new(snapshot: ObjectSnapshot) -> Self {
        Self {
            snapshot,
            perception: PerceptionBuffer::new(),
            corrected: None,
            is_perceived: true,
            is_unstable: false,
            action: None,
            contains: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.snapshot.id
    }

    pub fn name(&self) -> &str {
        &self.snapshot.name
    }

    pub fn snapshot(&self) -> &ObjectSnapshot {
        &self.snapshot
    }

    /// Local bounding-box extent from the `aabb` property.
    pub fn extent(&self) -> Result<Vec3, GravitasError> {
        self.snapshot.extent()
    }

    /// Latest observed state.
    pub fn perceived(&self) -> Option<KinematicState> {
        self.perception.latest().copied()
    }
}

/// All tracked objects of one input world, keyed by id.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    objects: BTreeMap<ObjectId, TrackedObject>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation, creating the object on first sight.
    pub fn observe(&mut self, snapshot: ObjectSnapshot, at: DateTime<Utc>) -> &mut TrackedObject {
        let state = snapshot.state;
        let object = self
            .objects
            .entry(snapshot.id.clone())
            .and_modify(|o| o.snapshot = snapshot.clone())
            .or_insert_with(|| TrackedObject::new(snapshot));
        object.perception.record(state, at);
        object
    }

    /// Remove an object and every containment entry that names it.
    pub fn remove(&mut self, id: &str) -> Option<TrackedObject> {
        let removed = self.objects.remove(id);
        for object in self.objects.values_mut() {
            object.contains.remove(id);
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<&TrackedObject> {
        self.objects.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut TrackedObject> {
        self.objects.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    /// Ids in ascending order.
    pub fn ids(&self) -> Vec<ObjectId> {
        self.objects.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedObject> {
        self.objects.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TrackedObject> {
        self.objects.values_mut()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gravitas_types::{NodeKind, Pose, Property};

    fn mesh(id: &str, x: f32) -> ObjectSnapshot {
        ObjectSnapshot {
            id: id.to_string(),
            name: format!("{id}_mesh"),
            kind: NodeKind::Mesh,
            state: KinematicState::at_rest(Pose::at(Vec3::new(x, 0.0, 0.0))),
            properties: vec![Property::new("aabb", "0.1,0.1,0.1")],
        }
    }

    #[test]
    fn observe_creates_then_updates() {
        let mut reg = ObjectRegistry::new();
        let now = Utc::now();
        reg.observe(mesh("a", 0.0), now);
        assert!(reg.get("a").unwrap().perception.is_first_sighting());

        let obj = reg.observe(mesh("a", 1.0), now);
        assert!(!obj.perception.is_first_sighting());
        assert_eq!(obj.perceived().unwrap().position().x, 1.0);
        assert_eq!(obj.snapshot().state.position().x, 1.0);
        assert!(obj.is_perceived);
        assert!(obj.action.is_none());
    }

    #[test]
    fn remove_purges_containment_entries() {
        let mut reg = ObjectRegistry::new();
        let now = Utc::now();
        reg.observe(mesh("box", 0.0), now);
        reg.observe(mesh("cube", 0.0), now);
        reg.get_mut("box").unwrap().contains.insert("cube".into());

        assert!(reg.remove("cube").is_some());
        assert!(reg.get("box").unwrap().contains.is_empty());
        assert_eq!(reg.ids(), vec!["box".to_string()]);
        assert!(reg.remove("cube").is_none());
    }

    #[test]
    fn extent_comes_from_latest_snapshot() {
        let mut reg = ObjectRegistry::new();
        let mut snap = mesh("a", 0.0);
        snap.properties.clear();
        reg.observe(snap, Utc::now());
        assert!(reg.get("a").unwrap().extent().is_err());

        reg.observe(mesh("a", 0.0), Utc::now());
        assert!(reg.get("a").unwrap().extent().is_ok());
    }
}
