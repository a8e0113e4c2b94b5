//! `dir-deps`: a `dir` edge from every directory to each direct child.

use std::collections::BTreeSet;

use rustc_hash::{FxHashMap, FxHashSet};

use super::{report_rejected, working_set};
use crate::graph::{DepKind, sync_dependencies};
use crate::pipeline::{BuildContext, Options, ProcessorFuture};
use crate::store::{ComponentDef, EntityId, Query, Store};
use crate::utils::url;

const PASS: &str = "dir-deps";

pub fn run<'a>(
    store: &'a mut dyn Store,
    ctx: &'a BuildContext,
    _options: &'a Options,
) -> ProcessorFuture<'a> {
    Box::pin(async move {
        let sources = store
            .prepare(Query::new().with(ComponentDef::Source))
            .entities(store);

        let mut by_url: FxHashMap<&str, EntityId> = FxHashMap::default();
        let mut directories = FxHashSet::default();
        for entity in &sources {
            if let Some(url) = entity.source_url() {
                by_url.insert(url, entity.id);
            }
            if entity.is_dir() {
                directories.insert(entity.id);
            }
        }

        let mut children: FxHashMap<EntityId, Vec<EntityId>> = FxHashMap::default();
        let mut parent_of: FxHashMap<EntityId, EntityId> = FxHashMap::default();
        for entity in &sources {
            let Some(parent) = entity.source_url().and_then(url::parent) else {
                continue;
            };
            if let Some(pid) = by_url.get(parent).filter(|pid| directories.contains(*pid)) {
                children.entry(*pid).or_default().push(entity.id);
                parent_of.insert(entity.id, *pid);
            }
        }

        // Directories whose child list may have changed.
        let mut dirs = BTreeSet::new();
        for eid in working_set(store, ctx, Query::new().with(ComponentDef::Source)) {
            if directories.contains(&eid) {
                dirs.insert(eid);
            }
            if let Some(parent) = parent_of.get(&eid) {
                dirs.insert(*parent);
            }
        }

        for dir in dirs {
            let desired = children
                .get(&dir)
                .map(|kids| kids.iter().map(|kid| (*kid, Vec::new())).collect())
                .unwrap_or_default();
            let synced = sync_dependencies(store, dir, DepKind::Dir, desired);
            report_rejected(ctx, PASS, synced.rejected);
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::get_dependency_parents;
    use crate::processors::scan;
    use crate::processors::testing::{Fixture, eid};
    use crate::store::EntityStore;

    #[tokio::test]
    async fn test_children_point_back_to_parent() {
        let fixture = Fixture::new(&[("a.md", "a"), ("posts/b.md", "b")]);
        let ctx = fixture.context();
        let options = Options::new();
        let mut store = EntityStore::new();
        scan::run(&mut store, &ctx, &options).await.unwrap();
        run(&mut store, &ctx, &options).await.unwrap();

        let root = eid(&store, "/");
        let posts = eid(&store, "/posts");
        assert_eq!(get_dependency_parents(&store, eid(&store, "/a.md"), DepKind::Dir), vec![root]);
        assert_eq!(get_dependency_parents(&store, posts, DepKind::Dir), vec![root]);
        assert_eq!(
            get_dependency_parents(&store, eid(&store, "/posts/b.md"), DepKind::Dir),
            vec![posts]
        );
        assert!(get_dependency_parents(&store, root, DepKind::Dir).is_empty());

        // Rerunning declares nothing new.
        store.reset_updated();
        run(&mut store, &ctx, &options).await.unwrap();
        assert!(store.updated_entity_ids().is_empty());
    }
}
