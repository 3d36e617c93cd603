//! isIn / isOnTop detection.
//!
//! [`RelationDetector`] evaluates every ordered pair of simulated objects on
//! their corrected poses and keeps at most one open [`RelationFact`] per
//! (subject, object, kind).  A relation that starts holding opens a fact; one
//! that stops holding closes it.  Both are returned for the change set.
//! An open isIn relation is mirrored into the container's `contains` set,
//! which is what the stability evaluator uses to carry contents along.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use gravitas_perception::{BoundingBox, is_in, is_on_top};
use gravitas_types::{ObjectId, RelationFact, RelationKind};
use tracing::{debug, info, warn};

use crate::world::ObjectRegistry;

/// Confidence attached to isIn facts.
pub const IN_CONFIDENCE: f32 = 0.65;
/// Confidence attached to isOnTop facts.
pub const ONTOP_CONFIDENCE: f32 = 0.95;

type RelationKey = (ObjectId, ObjectId, RelationKind);

#[derive(Debug, Clone)]
struct OpenRelation {
    fact: RelationFact,
    subject_name: String,
    object_name: String,
}

impl OpenRelation {
    fn close(mut self, now: DateTime<Utc>) -> RelationFact {
        self.fact.close(&self.subject_name, &self.object_name, now);
        self.fact
    }
}

/// Bookkeeping of the relations currently holding.
#[derive(Debug, Default)]
pub struct RelationDetector {
    open: HashMap<RelationKey, OpenRelation>,
    missing_geometry: HashSet<ObjectId>,
}

struct Candidate<'a> {
    id: &'a str,
    name: &'a str,
    bounds: BoundingBox,
}

impl RelationDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate all ordered pairs among `order` and return the facts opened
    /// or closed by this evaluation.
    pub fn evaluate(&mut self, objects: &mut ObjectRegistry, order: &[ObjectId], now: DateTime<Utc>) -> Vec<RelationFact> {
        let candidates = self.candidates(objects, order);

        let mut changed = Vec::new();
        let mut contain: Vec<(ObjectId, ObjectId)> = Vec::new();
        let mut release: Vec<(ObjectId, ObjectId)> = Vec::new();

        for a in &candidates {
            for b in &candidates {
                if a.id == b.id {
                    continue;
                }
                let in_key = (a.id.to_string(), b.id.to_string(), RelationKind::In);
                let was_in = self.open.contains_key(&in_key);
                match (is_in(&a.bounds, &b.bounds, was_in), was_in) {
                    (true, false) => {
                        changed.push(self.open_relation(in_key, a, b, now));
                        contain.push((b.id.to_string(), a.id.to_string()));
                    }
                    (false, true) => {
                        if let Some(fact) = self.close_relation(&in_key, now) {
                            changed.push(fact);
                        }
                        release.push((b.id.to_string(), a.id.to_string()));
                    }
                    _ => {}
                }

                let top_key = (a.id.to_string(), b.id.to_string(), RelationKind::OnTop);
                let was_on = self.open.contains_key(&top_key);
                match (is_on_top(&a.bounds, &b.bounds), was_on) {
                    (true, false) => changed.push(self.open_relation(top_key, a, b, now)),
                    (false, true) => {
                        if let Some(fact) = self.close_relation(&top_key, now) {
                            changed.push(fact);
                        }
                    }
                    _ => {}
                }
            }
        }

        for (container, content) in contain {
            if let Some(object) = objects.get_mut(&container) {
                object.contains.insert(content);
            }
        }
        for (container, content) in release {
            if let Some(object) = objects.get_mut(&container) {
                object.contains.remove(&content);
            }
        }
        changed
    }

    /// Close every open relation that mentions `id`.
    pub fn purge(&mut self, id: &str, now: DateTime<Utc>) -> Vec<RelationFact> {
        let keys: Vec<RelationKey> = self
            .open
            .keys()
            .filter(|(subject, object, _)| subject == id || object == id)
            .cloned()
            .collect();
        self.missing_geometry.remove(id);
        keys.iter().filter_map(|key| self.close_relation(key, now)).collect()
    }

    pub fn is_open(&self, subject: &str, object: &str, kind: RelationKind) -> bool {
        self.open.contains_key(&(subject.to_string(), object.to_string(), kind))
    }

    /// Facts currently holding, in no particular order.
    pub fn open_facts(&self) -> impl Iterator<Item = &RelationFact> {
        self.open.values().map(|r| &r.fact)
    }

    fn candidates<'a>(&mut self, objects: &'a ObjectRegistry, order: &'a [ObjectId]) -> Vec<Candidate<'a>> {
        let mut out = Vec::with_capacity(order.len());
        for id in order {
            let Some(object) = objects.get(id) else {
                debug!(object = %id, "relation candidate unknown, skipped");
                continue;
            };
            let extent = match object.extent() {
                Ok(extent) => extent,
                Err(e) => {
                    if self.missing_geometry.insert(id.clone()) {
                        warn!(object = %id, error = %e, "no usable geometry, relations skipped");
                    }
                    continue;
                }
            };
            let Some(state) = object.corrected.or_else(|| object.perceived()) else {
                continue;
            };
            out.push(Candidate {
                id,
                name: object.name(),
                bounds: BoundingBox::from_extent(extent, &state.pose),
            });
        }
        out
    }

    fn open_relation(&mut self, key: RelationKey, subject: &Candidate<'_>, object: &Candidate<'_>, now: DateTime<Utc>) -> RelationFact {
        let kind = key.2;
        let confidence = match kind {
            RelationKind::In => IN_CONFIDENCE,
            RelationKind::OnTop => ONTOP_CONFIDENCE,
        };
        let fact = RelationFact::open(kind, (subject.id, subject.name), (object.id, object.name), confidence, now);
        info!(relation = kind.predicate(), description = %fact.description, "relation started");
        self.open.insert(
            key,
            OpenRelation {
                fact: fact.clone(),
                subject_name: subject.name.to_string(),
                object_name: object.name.to_string(),
            },
        );
        fact
    }

    fn close_relation(&mut self, key: &RelationKey, now: DateTime<Utc>) -> Option<RelationFact> {
        let fact = self.open.remove(key)?.close(now);
        info!(relation = key.2.predicate(), description = %fact.description, "relation ended");
        Some(fact)
    }
}
