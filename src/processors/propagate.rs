//! `propagate`: mark every transitive dependent of an updated entity.
//!
//! Runs before the derived passes so the dependents join their working
//! sets. Full builds process everything anyway and skip this.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::graph::{dependents, is_edge_id};
use crate::pipeline::{BuildContext, Options, ProcessorFuture};
use crate::store::Store;
use crate::debug;

pub fn run<'a>(
    store: &'a mut dyn Store,
    ctx: &'a BuildContext,
    _options: &'a Options,
) -> ProcessorFuture<'a> {
    Box::pin(async move {
        if !ctx.only_updated {
            return Ok(());
        }

        let seeds: Vec<_> = store
            .updated_entity_ids()
            .into_iter()
            .filter(|id| !is_edge_id(*id))
            .collect();
        let mut seen: FxHashSet<_> = seeds.iter().copied().collect();
        let mut queue: VecDeque<_> = seeds.into_iter().collect();
        let mut marked = 0usize;

        while let Some(id) = queue.pop_front() {
            for dependent in dependents(store, id) {
                if seen.insert(dependent) {
                    store.mark_updated(dependent);
                    queue.push_back(dependent);
                    marked += 1;
                }
            }
        }

        debug!("propagate"; "{} dependents marked", marked);
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
    async fn test_marks_transitive_dependents_only() {
        let fixture = Fixture::new(&[]);
        let mut store = EntityStore::new();
        let base = source(&mut store, "/_layouts/base.html", false);
        let post = source(&mut store, "/_layouts/post.html", false);
        let page = source(&mut store, "/a.md", false);
        let linker = source(&mut store, "/b.md", false);
        let unrelated = source(&mut store, "/c.md", false);
        insert_dependency(&mut store, post, base, DepKind::Layout, vec![]).unwrap();
        insert_dependency(&mut store, page, post, DepKind::Layout, vec![]).unwrap();
        insert_dependency(&mut store, linker, page, DepKind::Link, vec![]).unwrap();

        store.reset_updated();
        store.mark_updated(base);
        let ctx = fixture.context().with_changes(Vec::new());
        run(&mut store, &ctx, &Options::new()).await.unwrap();

        let updated = store.updated_entity_ids();
        for id in [base, post, page, linker] {
            assert!(updated.contains(&id));
        }
        assert!(!updated.contains(&unrelated));
    }
}
