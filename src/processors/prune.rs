//! `prune-edges`: delete edges whose `src` or `dst` is gone.
//!
//! Removing an entity leaves edges pointing at it in place. The surviving
//! `src` of a pruned reference edge is marked updated so its references are
//! redone. A parent directory losing a `dir` edge stays as it is: marking it
//! would flow down to every sibling.

use crate::pipeline::{BuildContext, Options, ProcessorFuture};
use crate::store::{ComponentDef, Query, Store};
use crate::debug;

pub fn run<'a>(
    store: &'a mut dyn Store,
    _ctx: &'a BuildContext,
    _options: &'a Options,
) -> ProcessorFuture<'a> {
    Box::pin(async move {
        let mut stale = Vec::new();
        let mut survivors = Vec::new();
        for edge in store
            .prepare(Query::new().with(ComponentDef::Dependency))
            .entities(store)
        {
            let Some((src, dst, kind)) = edge.dependency() else {
                continue;
            };
            let (has_src, has_dst) = (store.has_entity(src), store.has_entity(dst));
            if has_src && has_dst {
                continue;
            }
            stale.push(edge.id);
            if has_src && !kind.flows_downward() {
                survivors.push(src);
            }
        }

        if !stale.is_empty() {
            store.remove_entities(&stale);
            for src in survivors {
                store.mark_updated(src);
            }
            debug!("prune-edges"; "pruned {} edges", stale.len());
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::source;
    use crate::graph::{DepKind, insert_dependency};
    use crate::processors::testing::Fixture;
    use crate::store::EntityStore;

    #[tokio::test]
    async fn test_prunes_dangling_edges_and_marks_referrer() {
        let fixture = Fixture::new(&[]);
        let mut store = EntityStore::new();
        let page = source(&mut store, "/page.md", false);
        let gone = source(&mut store, "/gone.md", false);
        let kept = source(&mut store, "/kept.md", false);
        let dangling = insert_dependency(&mut store, page, gone, DepKind::Link, vec![]).unwrap();
        let fine = insert_dependency(&mut store, page, kept, DepKind::Link, vec![]).unwrap();

        store.remove_entities(&[gone]);
        store.reset_updated();
        run(&mut store, &fixture.context(), &Options::new()).await.unwrap();

        assert!(!store.has_entity(dangling));
        assert!(store.has_entity(fine));
        assert_eq!(store.updated_entity_ids(), vec![page]);
    }

    #[tokio::test]
    async fn test_pruned_dir_edge_leaves_parent_alone() {
        let fixture = Fixture::new(&[]);
        let mut store = EntityStore::new();
        let root = source(&mut store, "/", true);
        let gone = source(&mut store, "/gone.md", false);
        let child = insert_dependency(&mut store, root, gone, DepKind::Dir, vec![]).unwrap();

        store.remove_entities(&[gone]);
        store.reset_updated();
        run(&mut store, &fixture.context(), &Options::new()).await.unwrap();

        assert!(!store.has_entity(child));
        assert!(store.updated_entity_ids().is_empty());
    }
}
