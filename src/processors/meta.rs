//! `meta`: own metadata of every source entity.
//!
//! Markup files take their front matter, directories their metadata file,
//! everything else an empty map. Keys a transformer exported during the
//! last render are carried over so an unchanged file stays quiet.

use serde_json::Value;

use super::{record_error, report_rejected, working_set};
use crate::pipeline::{BuildContext, Options, ProcessorFuture};
use crate::store::{Component, ComponentData, ComponentDef, Entity, JsonMap, Query, Store};
use crate::transform::{EXPORTED_KEYS, TransformError, frontmatter};
use crate::utils::path::source_path;

const PASS: &str = "meta";

pub fn run<'a>(
    store: &'a mut dyn Store,
    ctx: &'a BuildContext,
    _options: &'a Options,
) -> ProcessorFuture<'a> {
    Box::pin(async move {
        let entities: Vec<Entity> = working_set(store, ctx, Query::new().with(ComponentDef::Source))
            .into_iter()
            .filter_map(|eid| store.get_entity(eid, true))
            .collect();

        for entity in entities {
            let parsed = if entity.is_dir() {
                dir_meta(ctx, &entity).await
            } else {
                file_meta(&entity)
            };

            let mut meta = match parsed {
                Ok(meta) => meta,
                Err(err) => {
                    let url = entity.source_url().unwrap_or_default();
                    record_error(store, ctx, PASS, entity.id, format!("{url}: {err}"));
                    continue;
                }
            };

            if let Some(previous) = entity.meta() {
                carry_exported(&mut meta, previous);
            }
            let applied = store.add_components(vec![Component::new(
                entity.id,
                ComponentData::Metadata { meta },
            )]);
            report_rejected(ctx, PASS, applied.rejected);
        }
        Ok(())
    })
}

fn file_meta(entity: &Entity) -> Result<JsonMap, TransformError> {
    match entity.get(ComponentDef::Markup) {
        Some(ComponentData::Markup { text, .. }) => Ok(frontmatter::extract(text)?.0),
        _ => Ok(JsonMap::new()),
    }
}

async fn dir_meta(ctx: &BuildContext, entity: &Entity) -> Result<JsonMap, TransformError> {
    let url = entity.source_url().unwrap_or("/");
    let path = source_path(ctx.content_dir(), url).join(ctx.meta_file());
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => frontmatter::parse_toml(&text),
        Err(_) => Ok(JsonMap::new()),
    }
}

fn carry_exported(meta: &mut JsonMap, previous: &JsonMap) {
    for key in EXPORTED_KEYS {
        if meta.contains_key(key) {
            continue;
        }
        if let Some(value) = previous.get(key) {
            meta.insert(key.to_string(), Value::clone(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::testing::{Fixture, eid};
    use crate::processors::{read, scan};
    use crate::store::EntityStore;
    use serde_json::json;

    async fn prepare(fixture: &Fixture) -> EntityStore {
        let ctx = fixture.context();
        let options = Options::new();
        let mut store = EntityStore::new();
        scan::run(&mut store, &ctx, &options).await.unwrap();
        read::run(&mut store, &ctx, &options).await.unwrap();
        run(&mut store, &ctx, &options).await.unwrap();
        store
    }

    fn meta(store: &EntityStore, url: &str) -> JsonMap {
        store
            .get_entity(eid(store, url), true)
            .and_then(|e| e.meta().cloned())
            .unwrap()
    }

    #[tokio::test]
    async fn test_front_matter_and_dir_files() {
        let fixture = Fixture::new(&[
            ("posts/_meta.toml", "isEnabled = false\ntags = [\"blog\"]"),
            ("posts/a.md", "---\ntitle: A\nisEnabled: true\n---\n# A"),
            ("logo.png", "png"),
        ]);
        let store = prepare(&fixture).await;

        assert_eq!(meta(&store, "/posts")["isEnabled"], json!(false));
        assert_eq!(meta(&store, "/posts/a.md")["isEnabled"], json!(true));
        assert_eq!(meta(&store, "/posts/a.md")["title"], json!("A"));
        assert!(meta(&store, "/logo.png").is_empty());
    }

    #[tokio::test]
    async fn test_broken_meta_file_becomes_error() {
        let fixture = Fixture::new(&[("docs/_meta.toml", "not = [valid"), ("docs/a.md", "a")]);
        let store = prepare(&fixture).await;

        let docs = eid(&store, "/docs");
        assert!(matches!(
            store.get_component(docs, ComponentDef::Error),
            Some(ComponentData::Error { pass, .. }) if pass == PASS
        ));
        assert!(store.get_component(eid(&store, "/docs/a.md"), ComponentDef::Error).is_none());
    }

    #[test]
    fn test_exported_keys_survive() {
        let mut meta = JsonMap::new();
        meta.insert("title".into(), json!("new"));
        let mut previous = JsonMap::new();
        previous.insert("title".into(), json!("old"));
        previous.insert("first_heading".into(), json!("Heading"));

        carry_exported(&mut meta, &previous);
        assert_eq!(meta["title"], json!("new"));
        assert_eq!(meta["first_heading"], json!("Heading"));
    }
}
