//! [`SceneStore`] – in-memory world-model store.
//!
//! Keeps one object table per named world.  Perception writes into the input
//! world through [`SceneStore::apply_event`]; the reasoner's batches are
//! mirrored into the derived output world with
//! [`SceneStore::apply_changes`], where each corrected object inherits name,
//! type tag and properties from its input-world counterpart.
//!
//! Open relations are kept for as long as they stay open.  Finished
//! situations (closed relations and actions) form a rolling window of at
//! most [`DEFAULT_HISTORY_LIMIT`] records per world; the oldest are dropped
//! first.

use std::collections::{BTreeMap, HashMap};

use gravitas_types::{ChangeSet, ObjectSnapshot, Situation, WorldEvent};
use tracing::debug;
use uuid::Uuid;

/// Finished situations kept per world.
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

#[derive(Debug, Default)]
struct WorldTable {
    objects: BTreeMap<String, ObjectSnapshot>,
    situations: Vec<Situation>,
    situation_index: HashMap<Uuid, usize>,
}

impl WorldTable {
    /// Drop the oldest finished situations beyond `limit`.  Returns how many
    /// were dropped.
    fn prune(&mut self, limit: usize) -> usize {
        let finished = self.situations.iter().filter(|s| s.end().is_some()).count();
        let mut excess = finished.saturating_sub(limit);
        if excess == 0 {
            return 0;
        }
        let dropped = excess;
        self.situations.retain(|s| {
            if excess > 0 && s.end().is_some() {
                excess -= 1;
                false
            } else {
                true
            }
        });
        self.situation_index = self.situations.iter().enumerate().map(|(idx, s)| (s.id(), idx)).collect();
        dropped
    }
}

/// Named worlds and their objects.
#[derive(Debug)]
pub struct SceneStore {
    worlds: HashMap<String, WorldTable>,
    history_limit: usize,
}

impl Default for SceneStore {
    fn default() -> Self {
        Self {
            worlds: HashMap::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl SceneStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` finished situations per world.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Apply a perception change to `world`.
    pub fn apply_event(&mut self, world: &str, event: &WorldEvent) {
        let table = self.worlds.entry(world.to_string()).or_default();
        match event {
            WorldEvent::Upserted(snapshot) => {
                table.objects.insert(snapshot.id.clone(), snapshot.clone());
            }
            WorldEvent::Deleted(id) => {
                table.objects.remove(id);
            }
        }
    }

    /// Mirror a reasoning batch into `changes.world`, taking object metadata
    /// from `source_world`.  Situations are upserted by id so a closed
    /// relation replaces its open record.
    pub fn apply_changes(&mut self, source_world: &str, changes: &ChangeSet) {
        let metadata: Vec<ObjectSnapshot> = changes
            .objects
            .iter()
            .filter_map(|update| {
                let source = self.worlds.get(source_world)?.objects.get(&update.id)?;
                Some(ObjectSnapshot {
                    state: update.state,
                    ..source.clone()
                })
            })
            .collect();

        let limit = self.history_limit;
        let table = self.worlds.entry(changes.world.clone()).or_default();
        for snapshot in metadata {
            table.objects.insert(snapshot.id.clone(), snapshot);
        }
        for id in &changes.deleted {
            table.objects.remove(id);
        }
        for situation in &changes.situations {
            match table.situation_index.get(&situation.id()) {
                Some(&idx) => table.situations[idx] = situation.clone(),
                None => {
                    table.situation_index.insert(situation.id(), table.situations.len());
                    table.situations.push(situation.clone());
                }
            }
        }
        let pruned = table.prune(limit);
        debug!(
            world = %changes.world,
            objects = changes.objects.len(),
            situations = changes.situations.len(),
            pruned,
            "change set mirrored"
        );
    }

    /// Every object currently known in `world`, ordered by id.
    pub fn objects(&self, world: &str) -> Vec<ObjectSnapshot> {
        self.worlds
            .get(world)
            .map(|t| t.objects.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn object(&self, world: &str, id: &str) -> Option<&ObjectSnapshot> {
        self.worlds.get(world)?.objects.get(id)
    }

    /// Situations recorded in `world`, in first-seen order: every open
    /// relation plus the most recent finished ones.
    pub fn situations(&self, world: &str) -> &[Situation] {
        self.worlds.get(world).map(|t| t.situations.as_slice()).unwrap_or(&[])
    }
}
