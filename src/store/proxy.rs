//! Output-capturing store decorator.
//!
//! Writes of the captured definitions land in an in-memory buffer; every
//! other call goes to the wrapped store. Reads of a captured definition see
//! the buffer first, so later passes in the same run observe the captured
//! values as if they had been stored.

use super::{
    Applied, Component, ComponentData, ComponentDef, ComponentDefSet, Direction, Entity, EntityId,
    Query, Store,
};

pub struct CapturingStore<'s> {
    inner: &'s mut dyn Store,
    capture: ComponentDefSet,
    captured: Vec<Component>,
}

impl<'s> CapturingStore<'s> {
    pub fn new(inner: &'s mut dyn Store, capture: impl Into<ComponentDefSet>) -> Self {
        Self {
            inner,
            capture: capture.into(),
            captured: Vec::new(),
        }
    }

    pub fn captured(&self) -> &[Component] {
        &self.captured
    }

    pub fn captured_for(&self, eid: EntityId) -> impl Iterator<Item = &Component> {
        self.captured.iter().filter(move |c| c.eid == eid)
    }

    pub fn into_captured(self) -> Vec<Component> {
        self.captured
    }

    fn buffered(&self, id: EntityId, def: ComponentDef) -> Option<&ComponentData> {
        self.captured
            .iter()
            .find(|c| c.eid == id && c.def() == def)
            .map(|c| &c.data)
    }
}

impl Store for CapturingStore<'_> {
    fn create_entity(&mut self) -> EntityId {
        self.inner.create_entity()
    }

    fn create_entity_with_id(&mut self, id: EntityId) -> bool {
        self.inner.create_entity_with_id(id)
    }

    fn has_entity(&self, id: EntityId) -> bool {
        self.inner.has_entity(id)
    }

    fn add_components(&mut self, components: Vec<Component>) -> Applied {
        let (diverted, passed): (Vec<_>, Vec<_>) = components
            .into_iter()
            .partition(|c| self.capture.contains(c.def()));

        let mut applied = self.inner.add_components(passed);
        for component in diverted {
            if !self.inner.has_entity(component.eid) {
                applied
                    .rejected
                    .push(super::StoreError::MissingEntity(component.eid));
                continue;
            }
            match self
                .captured
                .iter_mut()
                .find(|c| c.eid == component.eid && c.def() == component.def())
            {
                Some(slot) => *slot = component.clone(),
                None => self.captured.push(component.clone()),
            }
            applied.components.push(component);
        }
        applied
    }

    fn remove_components(&mut self, id: EntityId, defs: ComponentDefSet) -> usize {
        let before = self.captured.len();
        self.captured
            .retain(|c| !(c.eid == id && defs.contains(c.def())));
        let dropped = before - self.captured.len();
        self.inner.remove_components(id, defs) + dropped
    }

    fn get_component(&self, id: EntityId, def: ComponentDef) -> Option<ComponentData> {
        if self.capture.contains(def)
            && let Some(data) = self.buffered(id, def)
        {
            return Some(data.clone());
        }
        self.inner.get_component(id, def)
    }

    fn get_entity(&self, id: EntityId, resolve_components: bool) -> Option<Entity> {
        let mut entity = self.inner.get_entity(id, resolve_components)?;
        for component in self.captured_for(id) {
            entity.defs.insert(component.def());
            if resolve_components {
                entity.components.retain(|c| c.def() != component.def());
                entity.components.push(component.data.clone());
            }
        }
        Some(entity)
    }

    fn remove_entities(&mut self, ids: &[EntityId]) -> usize {
        self.captured.retain(|c| !ids.contains(&c.eid));
        self.inner.remove_entities(ids)
    }

    fn select(&self, query: &Query) -> Vec<EntityId> {
        if self.captured.is_empty() {
            return self.inner.select(query);
        }
        // Captured components can change which entities match, so evaluate
        // against the overlaid view.
        let mut ids: Vec<_> = self
            .inner
            .select(&Query::new().among(candidates(self, query)))
            .into_iter()
            .filter(|id| {
                self.get_entity(*id, query.needs_entity()).is_some_and(|e| {
                    query.matches_defs(e.defs) && query.matches_entity(&e)
                })
            })
            .collect();
        ids.sort_unstable();
        ids
    }

    fn edges(&self, id: EntityId, direction: Direction) -> Vec<EntityId> {
        self.inner.edges(id, direction)
    }

    fn updated_entity_ids(&self) -> Vec<EntityId> {
        self.inner.updated_entity_ids()
    }

    fn mark_updated(&mut self, id: EntityId) {
        self.inner.mark_updated(id);
    }

    fn reset_updated(&mut self) {
        self.inner.reset_updated();
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

/// Candidate ids for a query run through the proxy: the query's own id
/// restriction, or every entity of the wrapped store.
fn candidates(proxy: &CapturingStore<'_>, query: &Query) -> Vec<EntityId> {
    match query.candidate_ids() {
        Some(ids) => ids.iter().copied().collect(),
        None => proxy.inner.select(&Query::new()),
    }
}
