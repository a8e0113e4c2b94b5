//! Directory metadata resolution.

use rustc_hash::FxHashSet;
use serde_json::Value;

use super::{DepKind, get_dependency_parents};
use crate::store::{ComponentData, ComponentDef, EntityId, JsonMap, Store};

/// Metadata keys that stop the upward walk at the node declaring them.
/// `resolve-parent` is accepted as the TOML-style spelling.
pub const RESOLVE_PARENT_KEYS: [&str; 2] = ["resolveParent", "resolve-parent"];

/// Deep-merge `overlay` into `base`. Nested objects merge recursively, any
/// other value in `overlay` replaces the one in `base`.
pub fn merge_meta(base: &mut JsonMap, overlay: &JsonMap) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Object(target)), Value::Object(source)) => merge_meta(target, source),
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

fn own_meta(store: &dyn Store, eid: EntityId) -> Option<JsonMap> {
    match store.get_component(eid, ComponentDef::Metadata) {
        Some(ComponentData::Metadata { meta }) => Some(meta),
        _ => None,
    }
}

fn stops_walk(meta: Option<&JsonMap>) -> bool {
    meta.is_some_and(|m| {
        RESOLVE_PARENT_KEYS
            .iter()
            .any(|key| m.get(*key) == Some(&Value::Bool(false)))
    })
}

/// Effective metadata of `eid`: its ancestors' metadata merged top-down with
/// nearer values winning, ending with the entity's own.
///
/// The walk climbs `dir` edges and stops at the root or at the first node
/// whose own metadata sets `resolveParent = false` (that node is still
/// included).
pub fn resolve_dir_meta(store: &dyn Store, eid: EntityId) -> JsonMap {
    let mut stack = vec![(eid, own_meta(store, eid))];
    let mut visited = FxHashSet::default();
    visited.insert(eid);

    loop {
        let Some((current, meta)) = stack.last() else {
            break;
        };
        if stops_walk(meta.as_ref()) {
            break;
        }
        let Some(parent) = get_dependency_parents(store, *current, DepKind::Dir)
            .into_iter()
            .next()
        else {
            break;
        };
        if !visited.insert(parent) {
            break;
        }
        stack.push((parent, own_meta(store, parent)));
    }

    let mut resolved = JsonMap::new();
    while let Some((_, meta)) = stack.pop() {
        if let Some(meta) = meta {
            merge_meta(&mut resolved, &meta);
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::insert_dependency;
    use crate::graph::tests::source;
    use crate::store::{Component, EntityStore};
    use serde_json::json;

    fn set_meta(store: &mut EntityStore, eid: EntityId, value: Value) {
        let Value::Object(meta) = value else {
            panic!("metadata must be an object");
        };
        store.add_components(vec![Component::new(eid, ComponentData::Metadata { meta })]);
    }

    /// `/a` ─▶ `/a/b` ─▶ `/a/b/c.md`
    fn chain(store: &mut EntityStore) -> (EntityId, EntityId, EntityId) {
        let a = source(store, "/a", true);
        let b = source(store, "/a/b", true);
        let c = source(store, "/a/b/c.md", false);
        insert_dependency(store, a, b, DepKind::Dir, vec![]).unwrap();
        insert_dependency(store, b, c, DepKind::Dir, vec![]).unwrap();
        (a, b, c)
    }

    #[test]
    fn test_merge_is_deep_and_overlay_wins() {
        let mut base = json!({"a": 1, "nested": {"x": 1, "y": 1}}).as_object().unwrap().clone();
        let overlay = json!({"a": 2, "nested": {"y": 2}}).as_object().unwrap().clone();
        merge_meta(&mut base, &overlay);
        assert_eq!(Value::Object(base), json!({"a": 2, "nested": {"x": 1, "y": 2}}));
    }

    #[test]
    fn test_chain_merges_top_down() {
        let mut store = EntityStore::new();
        let (a, b, c) = chain(&mut store);
        set_meta(&mut store, a, json!({"layout": "/base.html", "lang": "en", "site": {"name": "A"}}));
        set_meta(&mut store, b, json!({"lang": "de", "site": {"section": "B"}}));
        set_meta(&mut store, c, json!({"title": "C"}));

        let resolved = resolve_dir_meta(&store, c);
        assert_eq!(
            Value::Object(resolved),
            json!({
                "layout": "/base.html",
                "lang": "de",
                "site": {"name": "A", "section": "B"},
                "title": "C"
            })
        );
    }

    #[test]
    fn test_own_value_overrides_ancestor() {
        let mut store = EntityStore::new();
        let (_, b, c) = chain(&mut store);
        set_meta(&mut store, b, json!({"isEnabled": false}));
        set_meta(&mut store, c, json!({"isEnabled": true}));

        assert_eq!(resolve_dir_meta(&store, c)["isEnabled"], json!(true));
    }

    #[test]
    fn test_resolve_parent_false_stops_walk() {
        let mut store = EntityStore::new();
        let (a, b, c) = chain(&mut store);
        set_meta(&mut store, a, json!({"from_a": true}));
        set_meta(&mut store, b, json!({"resolveParent": false, "from_b": true}));

        let resolved = resolve_dir_meta(&store, c);
        assert_eq!(resolved.get("from_b"), Some(&json!(true)));
        assert!(resolved.get("from_a").is_none());

        set_meta(&mut store, b, json!({"resolve-parent": false, "from_b": true}));
        assert!(resolve_dir_meta(&store, c).get("from_a").is_none());

        set_meta(&mut store, b, json!({"resolveParent": true, "from_b": true}));
        assert_eq!(resolve_dir_meta(&store, c).get("from_a"), Some(&json!(true)));
    }

    #[test]
    fn test_entity_without_metadata() {
        let mut store = EntityStore::new();
        let (_, _, c) = chain(&mut store);
        assert!(resolve_dir_meta(&store, c).is_empty());
    }
}
