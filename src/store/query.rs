//! Prepared queries over component definitions.
//!
//! ```ignore
//! let pages = store
//!     .prepare(Query::new().with([ComponentDef::Source, ComponentDef::Markup]).without(ComponentDef::Error))
//!     .ids(store);
//! ```

use std::fmt;

use rustc_hash::FxHashSet;

use super::{ComponentDefSet, Entity, EntityId, Store};

type Predicate = Box<dyn Fn(&Entity) -> bool + Send + Sync>;

/// Selection over entities.
///
/// All `with` definitions must be present, at least one `with_any` definition
/// (when any are given), no `without` definition. `among` restricts the
/// candidates to a fixed id set and `filter` runs against the hydrated entity.
#[derive(Default)]
pub struct Query {
    all: ComponentDefSet,
    any: ComponentDefSet,
    none: ComponentDefSet,
    ids: Option<FxHashSet<EntityId>>,
    predicate: Option<Predicate>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, defs: impl Into<ComponentDefSet>) -> Self {
        self.all = self.all.union(defs.into());
        self
    }

    pub fn with_any(mut self, defs: impl Into<ComponentDefSet>) -> Self {
        self.any = self.any.union(defs.into());
        self
    }

    pub fn without(mut self, defs: impl Into<ComponentDefSet>) -> Self {
        self.none = self.none.union(defs.into());
        self
    }

    /// Restrict to the given ids. Repeated calls intersect.
    pub fn among(mut self, ids: impl IntoIterator<Item = EntityId>) -> Self {
        let ids: FxHashSet<_> = ids.into_iter().collect();
        self.ids = Some(match self.ids.take() {
            Some(prev) => prev.intersection(&ids).copied().collect(),
            None => ids,
        });
        self
    }

    pub fn filter(mut self, predicate: impl Fn(&Entity) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Box::new(predicate));
        self
    }

    pub fn candidate_ids(&self) -> Option<&FxHashSet<EntityId>> {
        self.ids.as_ref()
    }

    pub fn matches_defs(&self, defs: ComponentDefSet) -> bool {
        defs.contains_all(self.all)
            && (self.any.is_empty() || defs.intersects(self.any))
            && !defs.intersects(self.none)
    }

    pub fn needs_entity(&self) -> bool {
        self.predicate.is_some()
    }

    pub fn matches_entity(&self, entity: &Entity) -> bool {
        self.predicate.as_ref().is_none_or(|p| p(entity))
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("with", &self.all)
            .field("with_any", &self.any)
            .field("without", &self.none)
            .field("among", &self.ids.as_ref().map(FxHashSet::len))
            .field("filter", &self.predicate.is_some())
            .finish()
    }
}

/// A query prepared once and replayable against any store.
#[derive(Debug)]
pub struct Statement {
    query: Query,
}

impl Statement {
    pub const fn new(query: Query) -> Self {
        Self { query }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn ids(&self, store: &dyn Store) -> Vec<EntityId> {
        store.select(&self.query)
    }

    pub fn entities(&self, store: &dyn Store) -> Vec<Entity> {
        self.ids(store)
            .into_iter()
            .filter_map(|id| store.get_entity(id, true))
            .collect()
    }

    pub fn first(&self, store: &dyn Store) -> Option<Entity> {
        self.ids(store)
            .into_iter()
            .find_map(|id| store.get_entity(id, true))
    }
}
