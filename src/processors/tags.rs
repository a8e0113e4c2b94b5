//! `tags`: one entity per tag name, and `tag` edges from every source to
//! the tags it carries, including those declared by its directories.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use serde_json::Value;

use super::{report_rejected, working_set};
use crate::graph::{DepKind, TagSets, get_dependency_parents, propagate_tags, sync_dependencies};
use crate::pipeline::{BuildContext, Options, ProcessorFuture};
use crate::store::{Component, ComponentData, ComponentDef, EntityId, JsonMap, Query, Store};

const PASS: &str = "tags";

/// Metadata key listing an entity's own tags.
pub const TAGS_KEY: &str = "tags";

pub fn run<'a>(
    store: &'a mut dyn Store,
    ctx: &'a BuildContext,
    _options: &'a Options,
) -> ProcessorFuture<'a> {
    Box::pin(async move {
        let mut tag_ids: FxHashMap<String, EntityId> = store
            .prepare(Query::new().with(ComponentDef::Tag))
            .entities(store)
            .into_iter()
            .filter_map(|e| match e.get(ComponentDef::Tag) {
                Some(ComponentData::Tag { name }) => Some((name.clone(), e.id)),
                _ => None,
            })
            .collect();

        let mut own = TagSets::default();
        for entity in store
            .prepare(Query::new().with([ComponentDef::Source, ComponentDef::Metadata]))
            .entities(store)
        {
            let names = entity.meta().map(tag_names).unwrap_or_default();
            if names.is_empty() {
                continue;
            }
            let mut ids = BTreeSet::new();
            for name in names {
                let id = match tag_ids.get(&name) {
                    Some(id) => *id,
                    None => {
                        let id = store.create_entity();
                        let applied = store.add_components(vec![Component::new(
                            id,
                            ComponentData::Tag { name: name.clone() },
                        )]);
                        report_rejected(ctx, PASS, applied.rejected);
                        tag_ids.insert(name, id);
                        id
                    }
                };
                ids.insert(id);
            }
            own.insert(entity.id, ids);
        }

        let effective = propagate_tags(store, &own);
        for eid in working_set(store, ctx, Query::new().with(ComponentDef::Source)) {
            let desired = effective
                .get(&eid)
                .map(|tags| tags.iter().map(|tag| (*tag, Vec::new())).collect())
                .unwrap_or_default();
            let synced = sync_dependencies(store, eid, DepKind::Tag, desired);
            report_rejected(ctx, PASS, synced.rejected);
        }

        let orphans: Vec<EntityId> = tag_ids
            .into_values()
            .filter(|id| get_dependency_parents(store, *id, DepKind::Tag).is_empty())
            .collect();
        store.remove_entities(&orphans);
        Ok(())
    })
}

/// Tag names from a `tags` value: a list, or one comma-separated string.
fn tag_names(meta: &JsonMap) -> Vec<String> {
    let raw: Vec<&str> = match meta.get(TAGS_KEY) {
        Some(Value::String(s)) => s.split(',').collect(),
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    raw.into_iter()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::get_dependency_entities;
    use crate::pipeline::ProcessorFn;
    use crate::processors::testing::{Fixture, eid};
    use crate::processors::{dirs, meta, read, scan};
    use crate::store::EntityStore;
    use serde_json::json;

    fn names(store: &EntityStore, id: EntityId) -> Vec<String> {
        let mut names: Vec<_> = get_dependency_entities(store, id, &[DepKind::Tag])
            .into_iter()
            .filter_map(|e| match e.get(ComponentDef::Tag) {
                Some(ComponentData::Tag { name }) => Some(name.clone()),
                _ => None,
            })
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_tags_flow_down_directories() {
        let fixture = Fixture::new(&[
            ("blog/_meta.toml", "tags = [\"blog\"]"),
            ("blog/rust/_meta.toml", "tags = \"rust, lang\""),
            ("blog/rust/a.md", "---\ntags: ownership\n---\n"),
            ("about.md", "about"),
        ]);
        let ctx = fixture.context();
        let options = Options::new();
        let mut store = EntityStore::new();
        let passes: [ProcessorFn; 5] = [scan::run, read::run, meta::run, dirs::run, run];
        for pass in passes {
            pass(&mut store, &ctx, &options).await.unwrap();
        }

        assert_eq!(names(&store, eid(&store, "/blog")), vec!["blog"]);
        assert_eq!(
            names(&store, eid(&store, "/blog/rust/a.md")),
            vec!["blog", "lang", "ownership", "rust"]
        );
        assert!(names(&store, eid(&store, "/about.md")).is_empty());
    }

    #[test]
    fn test_tag_names() {
        let meta = json!({"tags": ["a", " b ", ""]});
        assert_eq!(tag_names(meta.as_object().unwrap()), vec!["a", "b"]);
        let meta = json!({"tags": "x,y"});
        assert_eq!(tag_names(meta.as_object().unwrap()), vec!["x", "y"]);
    }
}
