//! Dependency graph on top of the entity store.
//!
//! An edge is an ordinary entity carrying a `dependency-edge` component. Its
//! id is derived from `(src, dst, kind)`, so re-declaring an edge on every
//! build never grows the graph.
//!
//! ```text
//! dir:    directory ──▶ child           (climb with get_dependency_parents)
//! layout: page      ──▶ layout template
//! tag:    entity    ──▶ tag entity
//! link / import / css / script: referrer ──▶ referenced entity
//! ```

mod meta;
mod tags;

pub use meta::{merge_meta, resolve_dir_meta};
pub use tags::{TagSets, propagate_tags};

use std::fmt;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::store::{
    Component, ComponentData, ComponentDef, Direction, EDGE_ID_FLAG, Entity, EntityId, Store,
    StoreError,
};

/// Relation type of a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepKind {
    Dir,
    Tag,
    Layout,
    Link,
    Import,
    Css,
    Script,
}

impl DepKind {
    pub const ALL: [DepKind; 7] = [
        Self::Dir,
        Self::Tag,
        Self::Layout,
        Self::Link,
        Self::Import,
        Self::Css,
        Self::Script,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dir => "dir",
            Self::Tag => "tag",
            Self::Layout => "layout",
            Self::Link => "link",
            Self::Import => "import",
            Self::Css => "css",
            Self::Script => "script",
        }
    }

    /// Whether a change to the edge's `src` invalidates its `dst`.
    ///
    /// Directory metadata flows down to children; for every other relation
    /// the referrer depends on the referenced entity.
    pub const fn flows_downward(self) -> bool {
        matches!(self, Self::Dir)
    }
}

impl fmt::Display for DepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub id: EntityId,
    pub src: EntityId,
    pub dst: EntityId,
    pub kind: DepKind,
}

/// Stable 64-bit id for an edge triple.
///
/// blake3 over the little-endian ids and the relation name, truncated to 64
/// bits with [`EDGE_ID_FLAG`] set so edge ids never meet dense ids. Distinct
/// triples colliding is treated as negligible and reported as
/// [`StoreError::IdCollision`] when it happens.
pub fn edge_id(src: EntityId, dst: EntityId, kind: DepKind) -> EntityId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&src.to_le_bytes());
    hasher.update(&dst.to_le_bytes());
    hasher.update(kind.as_str().as_bytes());
    let hash = hasher.finalize();

    let mut head = [0u8; 8];
    head.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(head) | EDGE_ID_FLAG
}

#[inline]
pub const fn is_edge_id(id: EntityId) -> bool {
    id & EDGE_ID_FLAG != 0
}

/// Insert (or confirm) the edge `src ─kind─▶ dst` with optional extra
/// components. Returns the edge id; repeated calls return the same id.
pub fn insert_dependency(
    store: &mut dyn Store,
    src: EntityId,
    dst: EntityId,
    kind: DepKind,
    extra: Vec<ComponentData>,
) -> Result<EntityId, StoreError> {
    for id in [src, dst] {
        if !store.has_entity(id) {
            return Err(StoreError::MissingEntity(id));
        }
    }

    let eid = edge_id(src, dst, kind);
    if !store.create_entity_with_id(eid) {
        match store.get_component(eid, ComponentDef::Dependency) {
            Some(ComponentData::Dependency {
                src: s,
                dst: d,
                kind: k,
            }) if (s, d, k) == (src, dst, kind) => {}
            None => {}
            Some(_) => return Err(StoreError::IdCollision(eid)),
        }
    }

    let mut components = Vec::with_capacity(extra.len() + 1);
    components.push(Component::new(
        eid,
        ComponentData::Dependency { src, dst, kind },
    ));
    components.extend(extra.into_iter().map(|data| Component::new(eid, data)));

    let applied = store.add_components(components);
    match applied.rejected.into_iter().next() {
        Some(err) => Err(err),
        None => Ok(eid),
    }
}

/// Edges touching `eid` in `direction`, in insertion order, optionally
/// filtered by relation.
pub fn dependency_edges(
    store: &dyn Store,
    eid: EntityId,
    kinds: &[DepKind],
    direction: Direction,
) -> Vec<Edge> {
    store
        .edges(eid, direction)
        .into_iter()
        .filter_map(|id| match store.get_component(id, ComponentDef::Dependency) {
            Some(ComponentData::Dependency { src, dst, kind })
                if kinds.is_empty() || kinds.contains(&kind) =>
            {
                Some(Edge { id, src, dst, kind })
            }
            _ => None,
        })
        .collect()
}

/// Entities `eid` depends on via the given relations (all when empty),
/// hydrated, in edge insertion order. Targets that no longer exist are
/// skipped.
pub fn get_dependency_entities(store: &dyn Store, eid: EntityId, kinds: &[DepKind]) -> Vec<Entity> {
    dependency_edges(store, eid, kinds, Direction::Outgoing)
        .into_iter()
        .filter_map(|edge| store.get_entity(edge.dst, true))
        .collect()
}

/// Entities pointing at `eid` with relation `kind`.
pub fn get_dependency_parents(store: &dyn Store, eid: EntityId, kind: DepKind) -> Vec<EntityId> {
    dependency_edges(store, eid, &[kind], Direction::Incoming)
        .into_iter()
        .map(|edge| edge.src)
        .filter(|src| store.has_entity(*src))
        .collect()
}

/// Options for [`get_dependency_leaf_entity_ids`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LeafOptions {
    /// Only directories count, both as leaves and as children.
    pub directories_only: bool,
}

/// Participants of relation `kind` that have no children of that relation.
pub fn get_dependency_leaf_entity_ids(
    store: &dyn Store,
    kind: DepKind,
    options: LeafOptions,
) -> Vec<EntityId> {
    let qualifies = |id: EntityId| {
        !options.directories_only
            || matches!(
                store.get_component(id, ComponentDef::Source),
                Some(ComponentData::Source { is_dir: true, .. })
            )
    };

    let mut participants = FxHashSet::default();
    for edge_id in store.select(&crate::store::Query::new().with(ComponentDef::Dependency)) {
        if let Some(ComponentData::Dependency { src, dst, kind: k }) =
            store.get_component(edge_id, ComponentDef::Dependency)
            && k == kind
        {
            participants.insert(src);
            participants.insert(dst);
        }
    }

    let mut leaves: Vec<_> = participants
        .into_iter()
        .filter(|id| store.has_entity(*id) && qualifies(*id))
        .filter(|id| {
            !dependency_edges(store, *id, &[kind], Direction::Outgoing)
                .iter()
                .any(|edge| store.has_entity(edge.dst) && qualifies(edge.dst))
        })
        .collect();
    leaves.sort_unstable();
    leaves
}

/// Result of [`sync_dependencies`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub inserted: usize,
    pub removed: usize,
    pub kept: usize,
    /// Edges that could not be written. The rest of the set still was.
    pub rejected: Vec<StoreError>,
}

/// Make the `kind` edges leaving `src` exactly `desired`.
///
/// Edges not re-declared are deleted, new ones inserted, and existing ones
/// refreshed with their extra components. A failed insert is recorded in
/// [`SyncReport::rejected`] and does not stop the others.
pub fn sync_dependencies(
    store: &mut dyn Store,
    src: EntityId,
    kind: DepKind,
    desired: Vec<(EntityId, Vec<ComponentData>)>,
) -> SyncReport {
    let wanted: FxHashSet<EntityId> = desired.iter().map(|(dst, _)| *dst).collect();
    let current = dependency_edges(store, src, &[kind], Direction::Outgoing);

    let stale: Vec<EntityId> = current
        .iter()
        .filter(|edge| !wanted.contains(&edge.dst))
        .map(|edge| edge.id)
        .collect();
    let existing: FxHashSet<EntityId> = current.iter().map(|edge| edge.dst).collect();

    let mut report = SyncReport {
        removed: store.remove_entities(&stale),
        ..SyncReport::default()
    };

    let mut seen = FxHashSet::default();
    for (dst, extra) in desired {
        if !seen.insert(dst) {
            continue;
        }
        match insert_dependency(store, src, dst, kind, extra) {
            Ok(_) if existing.contains(&dst) => report.kept += 1,
            Ok(_) => report.inserted += 1,
            Err(err) => report.rejected.push(err),
        }
    }
    report
}

/// Entities affected by a change to `eid`: referrers for most relations,
/// children for `dir`.
pub fn dependents(store: &dyn Store, eid: EntityId) -> Vec<EntityId> {
    let mut out = Vec::new();
    for edge in dependency_edges(store, eid, &[], Direction::Incoming) {
        if !edge.kind.flows_downward() {
            out.push(edge.src);
        }
    }
    for edge in dependency_edges(store, eid, &[DepKind::Dir], Direction::Outgoing) {
        out.push(edge.dst);
    }
    out.retain(|id| store.has_entity(*id));
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::{EntityStore, Query};

    pub(crate) fn source(store: &mut EntityStore, url: &str, is_dir: bool) -> EntityId {
        let id = store.create_entity();
        store.add_components(vec![Component::new(
            id,
            ComponentData::Source {
                url: url.into(),
                is_dir,
                mtime: 0,
                ctime: 0,
            },
        )]);
        id
    }

    fn edge_count(store: &EntityStore) -> usize {
        store
            .select(&Query::new().with(ComponentDef::Dependency))
            .len()
    }

    #[test]
    fn test_edge_id_is_deterministic_and_flagged() {
        let a = edge_id(1, 2, DepKind::Link);
        assert_eq!(a, edge_id(1, 2, DepKind::Link));
        assert_ne!(a, edge_id(2, 1, DepKind::Link));
        assert_ne!(a, edge_id(1, 2, DepKind::Import));
        assert!(is_edge_id(a));
    }

    #[test]
    fn test_insert_dependency_is_idempotent() {
        let mut store = EntityStore::new();
        let a = source(&mut store, "/a.md", false);
        let b = source(&mut store, "/b.md", false);

        let first = insert_dependency(&mut store, a, b, DepKind::Link, vec![]).unwrap();
        let second = insert_dependency(&mut store, a, b, DepKind::Link, vec![]).unwrap();

        assert_eq!(first, second);
        assert_eq!(edge_count(&store), 1);
    }

    #[test]
    fn test_insert_dependency_requires_endpoints() {
        let mut store = EntityStore::new();
        let a = source(&mut store, "/a.md", false);
        assert_eq!(
            insert_dependency(&mut store, a, 42, DepKind::Link, vec![]),
            Err(StoreError::MissingEntity(42))
        );
    }

    #[test]
    fn test_dependency_entities_keep_insertion_order() {
        let mut store = EntityStore::new();
        let page = source(&mut store, "/page.md", false);
        let targets: Vec<_> = ["/c.js", "/a.js", "/b.js"]
            .iter()
            .map(|url| source(&mut store, url, false))
            .collect();
        for target in &targets {
            insert_dependency(&mut store, page, *target, DepKind::Import, vec![]).unwrap();
        }
        let other = source(&mut store, "/x.css", false);
        insert_dependency(&mut store, page, other, DepKind::Css, vec![]).unwrap();

        let ids: Vec<_> = get_dependency_entities(&store, page, &[DepKind::Import])
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, targets);
        assert_eq!(get_dependency_entities(&store, page, &[]).len(), 4);
    }

    #[test]
    fn test_parents_and_leaves() {
        let mut store = EntityStore::new();
        let root = source(&mut store, "/", true);
        let posts = source(&mut store, "/posts", true);
        let drafts = source(&mut store, "/posts/drafts", true);
        let post = source(&mut store, "/posts/hello.md", false);
        let about = source(&mut store, "/about.md", false);
        for (parent, child) in [(root, posts), (posts, drafts), (posts, post), (root, about)] {
            insert_dependency(&mut store, parent, child, DepKind::Dir, vec![]).unwrap();
        }

        assert_eq!(get_dependency_parents(&store, post, DepKind::Dir), vec![posts]);
        assert!(get_dependency_parents(&store, root, DepKind::Dir).is_empty());

        let dirs = get_dependency_leaf_entity_ids(
            &store,
            DepKind::Dir,
            LeafOptions {
                directories_only: true,
            },
        );
        assert_eq!(dirs, vec![drafts]);

        let all = get_dependency_leaf_entity_ids(&store, DepKind::Dir, LeafOptions::default());
        assert_eq!(all, vec![drafts, post, about]);
    }

    #[test]
    fn test_sync_prunes_exactly_the_undeclared_edges() {
        let mut store = EntityStore::new();
        let page = source(&mut store, "/page.md", false);
        let targets: Vec<_> = (0..5)
            .map(|i| source(&mut store, &format!("/t{i}.md"), false))
            .collect();

        let all = targets.iter().map(|t| (*t, vec![])).collect();
        let report = sync_dependencies(&mut store, page, DepKind::Link, all);
        assert_eq!(report.inserted, 5);

        let keep = [targets[1], targets[3]];
        let kept_ids: Vec<_> = keep
            .iter()
            .map(|t| edge_id(page, *t, DepKind::Link))
            .collect();
        let report = sync_dependencies(
            &mut store,
            page,
            DepKind::Link,
            keep.iter().map(|t| (*t, vec![])).collect(),
        );

        assert_eq!(
            report,
            SyncReport {
                inserted: 0,
                removed: 3,
                kept: 2,
                rejected: vec![],
            }
        );
        let remaining: Vec<_> = dependency_edges(&store, page, &[DepKind::Link], Direction::Outgoing)
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(remaining, kept_ids);
    }

    #[test]
    fn test_sync_only_touches_its_relation() {
        let mut store = EntityStore::new();
        let page = source(&mut store, "/page.md", false);
        let layout = source(&mut store, "/_layouts/base.html", false);
        insert_dependency(&mut store, page, layout, DepKind::Layout, vec![]).unwrap();

        sync_dependencies(&mut store, page, DepKind::Link, vec![]);
        assert_eq!(edge_count(&store), 1);
    }

    #[test]
    fn test_sync_keeps_going_past_a_rejected_edge() {
        let mut store = EntityStore::new();
        let page = source(&mut store, "/page.md", false);
        let first = source(&mut store, "/first.md", false);
        let last = source(&mut store, "/last.md", false);
        let ghost = 999;

        let report = sync_dependencies(
            &mut store,
            page,
            DepKind::Link,
            vec![(first, vec![]), (ghost, vec![]), (last, vec![])],
        );

        assert_eq!(report.inserted, 2);
        assert_eq!(report.rejected, vec![StoreError::MissingEntity(ghost)]);
        let targets: Vec<_> = dependency_edges(&store, page, &[DepKind::Link], Direction::Outgoing)
            .into_iter()
            .map(|e| e.dst)
            .collect();
        assert_eq!(targets, vec![first, last]);
    }

    #[test]
    fn test_dependents_follow_flow_direction() {
        let mut store = EntityStore::new();
        let dir = source(&mut store, "/posts", true);
        let page = source(&mut store, "/posts/a.md", false);
        let layout = source(&mut store, "/_layouts/base.html", false);
        insert_dependency(&mut store, dir, page, DepKind::Dir, vec![]).unwrap();
        insert_dependency(&mut store, page, layout, DepKind::Layout, vec![]).unwrap();

        assert_eq!(dependents(&store, dir), vec![page]);
        assert_eq!(dependents(&store, layout), vec![page]);
        assert!(dependents(&store, page).is_empty());
    }
}
