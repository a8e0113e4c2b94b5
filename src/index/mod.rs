//! Reverse-lookup indices from URL to entity.
//!
//! Indices are rebuilt wholesale by dedicated passes (`source-index`,
//! `destination-index`) and never patched in place, so an entity removed
//! from the store cannot linger in an index.

mod resolve;
mod unresolved;

pub use resolve::{Resolution, resolve_reference};
pub use unresolved::Unresolved;

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::store::{ComponentDef, ComponentDefSet, EntityId, Query, Store};
use crate::utils::mime;

/// Source URL index name.
pub const SOURCE_INDEX: &str = "src";
/// Destination URL index name.
pub const DESTINATION_INDEX: &str = "dst";

/// What lives at an indexed URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub eid: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    pub defs: ComponentDefSet,
}

/// A single named URL → entity mapping with reverse lookup.
#[derive(Debug, Clone, Default)]
pub struct Index {
    name: String,
    by_key: BTreeMap<String, IndexEntry>,
    by_eid: FxHashMap<EntityId, String>,
}

impl Index {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clear(&mut self) {
        self.by_key.clear();
        self.by_eid.clear();
    }

    /// Insert `key`. Returns the entity previously stored under it, if a
    /// different one was.
    pub fn insert(&mut self, key: impl Into<String>, entry: IndexEntry) -> Option<EntityId> {
        let key = key.into();
        if let Some(old_key) = self.by_eid.insert(entry.eid, key.clone())
            && old_key != key
        {
            self.by_key.remove(&old_key);
        }
        let previous = self.by_key.insert(key, entry.clone())?;
        if previous.eid == entry.eid {
            return None;
        }
        self.by_eid.remove(&previous.eid);
        Some(previous.eid)
    }

    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        self.by_key.get(key)
    }

    pub fn get_eid(&self, key: &str) -> Option<EntityId> {
        self.get(key).map(|e| e.eid)
    }

    pub fn get_by_eid(&self, eid: EntityId) -> Option<&str> {
        self.by_eid.get(&eid).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexEntry)> {
        self.by_key.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// First key whose extension-less form equals `stem`.
    pub fn find_by_stem(&self, stem: &str) -> Option<(&str, &IndexEntry)> {
        let prefix = format!("{stem}.");
        self.by_key
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .find(|(key, _)| !key[prefix.len()..].contains('/'))
            .map(|(k, v)| (k.as_str(), v))
    }
}

/// Free-function form of [`Index::get_by_eid`].
pub fn get_by_eid(index: &Index, eid: EntityId) -> Option<&str> {
    index.get_by_eid(eid)
}

/// All named indices of a build.
#[derive(Debug, Default)]
pub struct IndexSet {
    indices: FxHashMap<String, Index>,
}

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Named index, created empty on demand when `create_if_missing`.
    pub fn get_index(&mut self, name: &str, create_if_missing: bool) -> Option<&mut Index> {
        if create_if_missing && !self.indices.contains_key(name) {
            self.indices.insert(name.to_string(), Index::new(name));
        }
        self.indices.get_mut(name)
    }

    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indices.get(name)
    }

    pub fn replace(&mut self, index: Index) -> Option<Index> {
        self.indices.insert(index.name.clone(), index)
    }

    pub fn sources(&self) -> Option<&Index> {
        self.index(SOURCE_INDEX)
    }

    pub fn destinations(&self) -> Option<&Index> {
        self.index(DESTINATION_INDEX)
    }
}

/// Rebuild the source index from every entity with a `source` component.
pub fn rebuild_source_index(store: &dyn Store) -> Index {
    let mut index = Index::new(SOURCE_INDEX);
    for entity in store
        .prepare(Query::new().with(ComponentDef::Source))
        .entities(store)
    {
        let Some(url) = entity.source_url() else {
            continue;
        };
        let mime = if entity.is_dir() {
            mime::types::DIRECTORY
        } else {
            mime::essence(mime::from_url(url))
        };
        index.insert(
            url,
            IndexEntry {
                eid: entity.id,
                mime: Some(mime.to_string()),
                defs: entity.defs,
            },
        );
    }
    index
}

/// Rebuild the destination index. Returns the index and the URLs claimed by
/// more than one entity (the lowest id keeps the URL).
pub fn rebuild_destination_index(store: &dyn Store) -> (Index, Vec<(String, EntityId)>) {
    let mut index = Index::new(DESTINATION_INDEX);
    let mut conflicts = Vec::new();
    for entity in store
        .prepare(Query::new().with(ComponentDef::Destination))
        .entities(store)
    {
        let Some(url) = entity.destination() else {
            continue;
        };
        if index.contains(url) {
            conflicts.push((url.to_string(), entity.id));
            continue;
        }
        let mime = entity.output().map(|(_, mime)| mime.to_string());
        index.insert(
            url,
            IndexEntry {
                eid: entity.id,
                mime,
                defs: entity.defs,
            },
        );
    }
    (index, conflicts)
}
