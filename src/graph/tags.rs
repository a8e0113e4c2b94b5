//! Tag propagation through the directory hierarchy.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use super::{DepKind, LeafOptions, get_dependency_leaf_entity_ids, get_dependency_parents};
use crate::store::{ComponentDef, EntityId, Query, Store};

/// Tag entity ids per entity.
pub type TagSets = FxHashMap<EntityId, BTreeSet<EntityId>>;

/// Effective tag set of every source entity.
///
/// Starting at each leaf directory, the ancestor chain is collected with an
/// explicit stack and walked from the top down, accumulating the union of
/// tags declared so far. Directories get the accumulated union; files get
/// their own tags plus the union of their directory.
pub fn propagate_tags(store: &dyn Store, own: &TagSets) -> TagSets {
    let mut dirs: TagSets = FxHashMap::default();

    let leaves = get_dependency_leaf_entity_ids(
        store,
        DepKind::Dir,
        LeafOptions {
            directories_only: true,
        },
    );

    for leaf in leaves {
        let mut chain = vec![leaf];
        let mut current = leaf;
        while let Some(parent) = get_dependency_parents(store, current, DepKind::Dir)
            .into_iter()
            .next()
        {
            if chain.contains(&parent) {
                break;
            }
            chain.push(parent);
            if dirs.contains_key(&parent) {
                break;
            }
            current = parent;
        }

        let mut acc = BTreeSet::new();
        for node in chain.into_iter().rev() {
            match dirs.get(&node) {
                Some(done) => acc = done.clone(),
                None => {
                    if let Some(tags) = own.get(&node) {
                        acc.extend(tags.iter().copied());
                    }
                    dirs.insert(node, acc.clone());
                }
            }
        }
    }

    let mut result = dirs.clone();
    for eid in store.select(&Query::new().with(ComponentDef::Source)) {
        if result.contains_key(&eid) {
            continue;
        }
        let mut tags = own.get(&eid).cloned().unwrap_or_default();
        if let Some(parent) = get_dependency_parents(store, eid, DepKind::Dir)
            .into_iter()
            .next()
            && let Some(inherited) = dirs.get(&parent)
        {
            tags.extend(inherited.iter().copied());
        }
        result.insert(eid, tags);
    }

    result.retain(|_, tags| !tags.is_empty());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::insert_dependency;
    use crate::graph::tests::source;
    use crate::store::EntityStore;

    #[test]
    fn test_tags_accumulate_downward() {
        let mut store = EntityStore::new();
        let root = source(&mut store, "/", true);
        let blog = source(&mut store, "/blog", true);
        let rust = source(&mut store, "/blog/rust", true);
        let post = source(&mut store, "/blog/rust/ownership.md", false);
        let about = source(&mut store, "/about.md", false);
        for (parent, child) in [(root, blog), (blog, rust), (rust, post), (root, about)] {
            insert_dependency(&mut store, parent, child, DepKind::Dir, vec![]).unwrap();
        }

        let (t_blog, t_rust, t_post) = (100, 101, 102);
        let mut own = TagSets::default();
        own.insert(blog, BTreeSet::from([t_blog]));
        own.insert(rust, BTreeSet::from([t_rust, t_blog]));
        own.insert(post, BTreeSet::from([t_post]));

        let tags = propagate_tags(&store, &own);
        assert_eq!(tags[&blog], BTreeSet::from([t_blog]));
        assert_eq!(tags[&rust], BTreeSet::from([t_blog, t_rust]));
        assert_eq!(tags[&post], BTreeSet::from([t_blog, t_rust, t_post]));
        assert!(!tags.contains_key(&about));
        assert!(!tags.contains_key(&root));
    }

    #[test]
    fn test_sibling_branches_do_not_leak() {
        let mut store = EntityStore::new();
        let root = source(&mut store, "/", true);
        let a = source(&mut store, "/a", true);
        let b = source(&mut store, "/b", true);
        let in_b = source(&mut store, "/b/x.md", false);
        for (parent, child) in [(root, a), (root, b), (b, in_b)] {
            insert_dependency(&mut store, parent, child, DepKind::Dir, vec![]).unwrap();
        }

        let mut own = TagSets::default();
        own.insert(a, BTreeSet::from([1]));

        let tags = propagate_tags(&store, &own);
        assert_eq!(tags[&a], BTreeSet::from([1]));
        assert!(!tags.contains_key(&in_b));
    }
}
