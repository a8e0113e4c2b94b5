//! Entity-component store.
//!
//! Every file, directory, tag and dependency edge is an entity; facts about
//! it are typed components upserted one definition at a time.
//!
//! ```text
//! Store (trait)
//! ├── EntityStore      in-memory store, the only writer during a build
//! └── CapturingStore   diverts selected definitions into a buffer
//! ```
//!
//! Dense entity ids start at 1 and stay below [`EDGE_ID_FLAG`]; dependency
//! edges use hashed ids with that bit set (see [`crate::graph::edge_id`]).

mod bitset;
mod component;
mod entity;
mod proxy;
mod query;

pub use bitset::ComponentDefSet;
pub use component::{Component, ComponentData, ComponentDef, JsonMap};
pub use entity::Entity;
pub use proxy::CapturingStore;
pub use query::{Query, Statement};

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;
use thiserror::Error;

pub type EntityId = u64;

/// Top bit reserved for hashed (edge) ids.
pub const EDGE_ID_FLAG: EntityId = 1 << 63;

/// Data-integrity errors. Writes that fail with these are skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("entity {0} does not exist")]
    MissingEntity(EntityId),

    #[error("entity id {0:#x} is already used by a different dependency edge")]
    IdCollision(EntityId),

    #[error("unknown component definition `{0}`")]
    UnknownComponentDef(String),
}

/// Outcome of [`Store::add_components`].
#[derive(Debug, Default)]
pub struct Applied {
    /// Components that changed store state (or were captured by a proxy).
    pub components: Vec<Component>,
    /// Writes rejected for integrity reasons.
    pub rejected: Vec<StoreError>,
}

impl Applied {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn merge(&mut self, other: Applied) {
        self.components.extend(other.components);
        self.rejected.extend(other.rejected);
    }
}

/// Edge direction relative to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Edges whose `src` is the entity.
    Outgoing,
    /// Edges whose `dst` is the entity.
    Incoming,
}

/// Store capability shared by the real store and its decorators.
pub trait Store: Send + Sync {
    fn create_entity(&mut self) -> EntityId;

    /// Create an entity under a caller-chosen id. Returns `false` if the id
    /// is already taken.
    fn create_entity_with_id(&mut self, id: EntityId) -> bool;

    fn has_entity(&self, id: EntityId) -> bool;

    /// Upsert components. Identical rewrites are no-ops and are not reported
    /// as applied; writes to missing entities are rejected.
    fn add_components(&mut self, components: Vec<Component>) -> Applied;

    /// Remove the given definitions from an entity. Returns how many existed.
    fn remove_components(&mut self, id: EntityId, defs: ComponentDefSet) -> usize;

    fn get_component(&self, id: EntityId, def: ComponentDef) -> Option<ComponentData>;

    /// Look up an entity, optionally hydrating its components.
    fn get_entity(&self, id: EntityId, resolve_components: bool) -> Option<Entity>;

    /// Delete entities and their components. Edges pointing at them stay.
    fn remove_entities(&mut self, ids: &[EntityId]) -> usize;

    /// Ids matching `query`, in stable order.
    fn select(&self, query: &Query) -> Vec<EntityId>;

    /// Ids of edge entities touching `id`, in creation order.
    fn edges(&self, id: EntityId, direction: Direction) -> Vec<EntityId>;

    /// Entities created or changed since the last reset, ascending.
    fn updated_entity_ids(&self) -> Vec<EntityId>;

    fn mark_updated(&mut self, id: EntityId);

    fn reset_updated(&mut self);

    fn len(&self) -> usize;

    fn resolve_component_def_ids(&self, names: &[&str]) -> Result<ComponentDefSet, StoreError> {
        names
            .iter()
            .map(|name| {
                ComponentDef::from_name(name)
                    .ok_or_else(|| StoreError::UnknownComponentDef((*name).to_string()))
            })
            .collect()
    }

    fn prepare(&self, query: Query) -> Statement {
        Statement::new(query)
    }
}

#[derive(Debug)]
struct Record {
    seq: u64,
    components: BTreeMap<ComponentDef, ComponentData>,
}

impl Record {
    fn defs(&self) -> ComponentDefSet {
        self.components.keys().copied().collect()
    }
}

/// In-memory entity-component store.
///
/// Iteration is ordered by id. Adjacency lists for dependency edges are kept
/// alongside the records so traversals do not scan the whole store.
#[derive(Debug, Default)]
pub struct EntityStore {
    last_id: EntityId,
    next_seq: u64,
    entities: BTreeMap<EntityId, Record>,
    /// entity → (edge seq → edge id) where the entity is the edge's src
    outgoing: FxHashMap<EntityId, BTreeMap<u64, EntityId>>,
    /// entity → (edge seq → edge id) where the entity is the edge's dst
    incoming: FxHashMap<EntityId, BTreeMap<u64, EntityId>>,
    updated: BTreeSet<EntityId>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creation sequence number of an entity.
    pub fn seq(&self, id: EntityId) -> Option<u64> {
        self.entities.get(&id).map(|r| r.seq)
    }

    fn insert_record(&mut self, id: EntityId) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entities.insert(
            id,
            Record {
                seq,
                components: BTreeMap::new(),
            },
        );
        self.updated.insert(id);
    }

    fn link_edge(&mut self, edge: EntityId, seq: u64, src: EntityId, dst: EntityId) {
        self.outgoing.entry(src).or_default().insert(seq, edge);
        self.incoming.entry(dst).or_default().insert(seq, edge);
    }

    fn unlink_edge(&mut self, seq: u64, src: EntityId, dst: EntityId) {
        for (map, key) in [(&mut self.outgoing, src), (&mut self.incoming, dst)] {
            if let Some(list) = map.get_mut(&key) {
                list.remove(&seq);
                if list.is_empty() {
                    map.remove(&key);
                }
            }
        }
    }
}

impl Store for EntityStore {
    fn create_entity(&mut self) -> EntityId {
        self.last_id += 1;
        let id = self.last_id;
        debug_assert!(id < EDGE_ID_FLAG);
        self.insert_record(id);
        id
    }

    fn create_entity_with_id(&mut self, id: EntityId) -> bool {
        if self.entities.contains_key(&id) {
            return false;
        }
        if id < EDGE_ID_FLAG {
            self.last_id = self.last_id.max(id);
        }
        self.insert_record(id);
        true
    }

    fn has_entity(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    fn add_components(&mut self, components: Vec<Component>) -> Applied {
        let mut applied = Applied::default();

        for component in components {
            let Some(record) = self.entities.get_mut(&component.eid) else {
                applied.rejected.push(StoreError::MissingEntity(component.eid));
                continue;
            };

            let def = component.def();
            let seq = record.seq;
            let previous = record.components.get(&def);
            if previous == Some(&component.data) {
                continue;
            }

            let stale_edge = match previous {
                Some(ComponentData::Dependency { src, dst, .. }) => Some((*src, *dst)),
                _ => None,
            };
            record.components.insert(def, component.data.clone());

            if let Some((src, dst)) = stale_edge {
                self.unlink_edge(seq, src, dst);
            }
            if let ComponentData::Dependency { src, dst, .. } = component.data {
                self.link_edge(component.eid, seq, src, dst);
            }

            self.updated.insert(component.eid);
            applied.components.push(component);
        }

        applied
    }

    fn remove_components(&mut self, id: EntityId, defs: ComponentDefSet) -> usize {
        let Some(record) = self.entities.get_mut(&id) else {
            return 0;
        };
        let seq = record.seq;
        let mut removed = Vec::new();
        for def in defs.iter() {
            if let Some(data) = record.components.remove(&def) {
                removed.push(data);
            }
        }

        for data in &removed {
            if let ComponentData::Dependency { src, dst, .. } = data {
                self.unlink_edge(seq, *src, *dst);
            }
        }
        if !removed.is_empty() {
            self.updated.insert(id);
        }
        removed.len()
    }

    fn get_component(&self, id: EntityId, def: ComponentDef) -> Option<ComponentData> {
        self.entities.get(&id)?.components.get(&def).cloned()
    }

    fn get_entity(&self, id: EntityId, resolve_components: bool) -> Option<Entity> {
        let record = self.entities.get(&id)?;
        Some(Entity {
            id,
            seq: record.seq,
            defs: record.defs(),
            components: if resolve_components {
                record.components.values().cloned().collect()
            } else {
                Vec::new()
            },
        })
    }

    fn remove_entities(&mut self, ids: &[EntityId]) -> usize {
        let mut count = 0;
        for id in ids {
            let Some(record) = self.entities.remove(id) else {
                continue;
            };
            if let Some(ComponentData::Dependency { src, dst, .. }) =
                record.components.get(&ComponentDef::Dependency)
            {
                self.unlink_edge(record.seq, *src, *dst);
            }
            self.updated.remove(id);
            count += 1;
        }
        count
    }

    fn select(&self, query: &Query) -> Vec<EntityId> {
        let matches = |id: EntityId, record: &Record| {
            if !query.matches_defs(record.defs()) {
                return false;
            }
            if !query.needs_entity() {
                return true;
            }
            self.get_entity(id, true)
                .is_some_and(|entity| query.matches_entity(&entity))
        };

        match query.candidate_ids() {
            Some(ids) => {
                let mut ids: Vec<_> = ids
                    .iter()
                    .copied()
                    .filter(|id| self.entities.get(id).is_some_and(|r| matches(*id, r)))
                    .collect();
                ids.sort_unstable();
                ids
            }
            None => self
                .entities
                .iter()
                .filter(|(id, record)| matches(**id, record))
                .map(|(id, _)| *id)
                .collect(),
        }
    }

    fn edges(&self, id: EntityId, direction: Direction) -> Vec<EntityId> {
        let map = match direction {
            Direction::Outgoing => &self.outgoing,
            Direction::Incoming => &self.incoming,
        };
        map.get(&id)
            .map(|list| list.values().copied().collect())
            .unwrap_or_default()
    }

    fn updated_entity_ids(&self) -> Vec<EntityId> {
        self.updated.iter().copied().collect()
    }

    fn mark_updated(&mut self, id: EntityId) {
        if self.entities.contains_key(&id) {
            self.updated.insert(id);
        }
    }

    fn reset_updated(&mut self) {
        self.updated.clear();
    }

    fn len(&self) -> usize {
        self.entities.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DepKind;

    fn title(eid: EntityId, text: &str) -> Component {
        Component::new(eid, ComponentData::Title { text: text.into() })
    }

    #[test]
    fn test_dense_ids_start_at_one() {
        let mut store = EntityStore::new();
        assert_eq!(store.create_entity(), 1);
        assert_eq!(store.create_entity(), 2);
        assert!(store.has_entity(2));
        assert!(!store.has_entity(3));
    }

    #[test]
    fn test_upsert_replaces() {
        let mut store = EntityStore::new();
        let id = store.create_entity();

        assert_eq!(store.add_components(vec![title(id, "a")]).len(), 1);
        assert_eq!(store.add_components(vec![title(id, "b")]).len(), 1);
        assert_eq!(
            store.get_component(id, ComponentDef::Title),
            Some(ComponentData::Title { text: "b".into() })
        );
        assert_eq!(store.get_entity(id, true).unwrap().components.len(), 1);
    }

    #[test]
    fn test_identical_upsert_is_not_an_update() {
        let mut store = EntityStore::new();
        let id = store.create_entity();
        store.add_components(vec![title(id, "a")]);
        store.reset_updated();

        let applied = store.add_components(vec![title(id, "a")]);
        assert!(applied.is_empty());
        assert!(store.updated_entity_ids().is_empty());
    }

    #[test]
    fn test_missing_entity_is_rejected_not_fatal() {
        let mut store = EntityStore::new();
        let id = store.create_entity();
        let applied = store.add_components(vec![title(99, "ghost"), title(id, "real")]);

        assert_eq!(applied.rejected, vec![StoreError::MissingEntity(99)]);
        assert_eq!(applied.len(), 1);
        assert!(store.get_component(id, ComponentDef::Title).is_some());
    }

    #[test]
    fn test_updated_tracking() {
        let mut store = EntityStore::new();
        let a = store.create_entity();
        let b = store.create_entity();
        assert_eq!(store.updated_entity_ids(), vec![a, b]);

        store.reset_updated();
        store.add_components(vec![title(b, "x")]);
        assert_eq!(store.updated_entity_ids(), vec![b]);

        store.reset_updated();
        store.remove_components(b, ComponentDef::Title.into());
        assert_eq!(store.updated_entity_ids(), vec![b]);
    }

    #[test]
    fn test_remove_entities_keeps_edges_pointing_at_them() {
        let mut store = EntityStore::new();
        let a = store.create_entity();
        let b = store.create_entity();
        let edge = EDGE_ID_FLAG | 7;
        assert!(store.create_entity_with_id(edge));
        store.add_components(vec![Component::new(
            edge,
            ComponentData::Dependency {
                src: a,
                dst: b,
                kind: DepKind::Link,
            },
        )]);

        assert_eq!(store.remove_entities(&[b]), 1);
        assert!(store.has_entity(edge));
        assert_eq!(store.edges(a, Direction::Outgoing), vec![edge]);

        store.remove_entities(&[edge]);
        assert!(store.edges(a, Direction::Outgoing).is_empty());
        assert!(store.edges(b, Direction::Incoming).is_empty());
    }

    #[test]
    fn test_select_with_predicate() {
        let mut store = EntityStore::new();
        let a = store.create_entity();
        let b = store.create_entity();
        store.add_components(vec![title(a, "keep"), title(b, "drop")]);

        let ids = store
            .prepare(
                Query::new()
                    .with(ComponentDef::Title)
                    .filter(|e| e.title() == Some("keep")),
            )
            .ids(&store);
        assert_eq!(ids, vec![a]);
    }

    #[test]
    fn test_resolve_component_def_ids() {
        let store = EntityStore::new();
        let set = store
            .resolve_component_def_ids(&["source", "rendered-output"])
            .unwrap();
        assert!(set.contains(ComponentDef::Source));
        assert!(set.contains(ComponentDef::Output));
        assert_eq!(
            store.resolve_component_def_ids(&["bogus"]),
            Err(StoreError::UnknownComponentDef("bogus".into()))
        );
    }
}
