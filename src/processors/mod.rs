//! The built-in passes.
//!
//! Every pass has the [`ProcessorFn`](crate::pipeline::ProcessorFn) shape and
//! restricts itself to updated entities when the context asks for it. A
//! failure that concerns one entity becomes an `error` component on that
//! entity; only failures that leave the store unusable are returned.
//!
//! ```text
//! bookkeeping   clear-updates, clear-errors
//! scan          content tree / watcher changes → source entities
//! prune         edges with a vanished endpoint
//! read          file text → markup / style / script text
//! meta          front matter and directory metadata files
//! dirs          dir edges
//! indices       src and dst index rebuilds
//! propagate     dependents of updated entities
//! destination   output URLs
//! tags          tag entities and propagated tag edges
//! layout        layout edges
//! references    link / import / css / script edges
//! title         titles
//! render        transformers and layout chains
//! write, copy   the output directory
//! ```

pub mod bookkeeping;
pub mod copy;
pub mod destination;
pub mod dirs;
pub mod indices;
pub mod layout;
pub mod meta;
pub mod propagate;
pub mod prune;
pub mod read;
pub mod references;
pub mod render;
pub mod scan;
pub mod tags;
pub mod title;
pub mod write;

use rustc_hash::FxHashMap;

use crate::pipeline::{BuildContext, Options};
use crate::store::{Component, ComponentData, ComponentDef, EntityId, Query, Store};

/// Entities matching `query`, limited to updated ones in incremental runs.
pub(crate) fn working_set(store: &dyn Store, ctx: &BuildContext, query: Query) -> Vec<EntityId> {
    let query = if ctx.only_updated {
        query.among(store.updated_entity_ids())
    } else {
        query
    };
    store.select(&query)
}

/// Attach an `error` component to `eid` and report it.
pub(crate) fn record_error(
    store: &mut dyn Store,
    ctx: &BuildContext,
    pass: &str,
    eid: EntityId,
    message: impl Into<String>,
) {
    let message = message.into();
    ctx.reporter.error(pass, Some(eid), message.clone());
    let applied = store.add_components(vec![Component::new(
        eid,
        ComponentData::Error {
            pass: pass.to_string(),
            message,
        },
    )]);
    report_rejected(ctx, pass, applied.rejected);
}

/// Log integrity errors from a store write. The writes themselves were
/// skipped by the store.
pub(crate) fn report_rejected(
    ctx: &BuildContext,
    pass: &str,
    rejected: Vec<crate::store::StoreError>,
) {
    for err in rejected {
        ctx.reporter.warn(pass, None, format!("skipped write: {err}"));
    }
}

/// Source URL → entity for every source entity.
pub(crate) fn source_urls(store: &dyn Store) -> FxHashMap<String, EntityId> {
    store
        .prepare(Query::new().with(ComponentDef::Source))
        .entities(store)
        .into_iter()
        .filter_map(|entity| Some((entity.source_url()?.to_string(), entity.id)))
        .collect()
}

/// Boolean processor option, `false` when absent.
pub(crate) fn flag(options: &Options, key: &str) -> bool {
    options
        .get(key)
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false)
}

/// Text components: markup, style or script.
pub(crate) const TEXT_DEFS: [ComponentDef; 3] =
    [ComponentDef::Markup, ComponentDef::Style, ComponentDef::Script];

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by the pass tests.

    use std::path::Path;
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::config::SiteConfig;
    use crate::pipeline::{self, BuildContext, Reporter};
    use crate::store::{EntityId, EntityStore, Store};

    /// A temporary project with a `content/` tree.
    pub(crate) struct Fixture {
        pub dir: TempDir,
        pub config: Arc<SiteConfig>,
    }

    impl Fixture {
        pub(crate) fn new(files: &[(&str, &str)]) -> Self {
            let dir = TempDir::new().unwrap();
            std::fs::create_dir_all(dir.path().join("content")).unwrap();
            let fixture = Self {
                config: Arc::new(SiteConfig::for_root(dir.path())),
                dir,
            };
            for (path, text) in files {
                fixture.write(path, text);
            }
            fixture
        }

        pub(crate) fn content(&self) -> &Path {
            self.config.content_dir()
        }

        pub(crate) fn write(&self, rel: &str, text: &str) {
            let path = self.content().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, text).unwrap();
        }

        pub(crate) fn context(&self) -> BuildContext {
            BuildContext::new(self.config.clone()).with_reporter(Reporter::silent())
        }

        /// Run the default pipeline once over `store`.
        pub(crate) async fn build(&self, store: &mut EntityStore, ctx: &BuildContext) {
            let pipeline = pipeline::from_config(&self.config.pipeline).unwrap();
            pipeline.run(store, ctx).await.unwrap();
        }
    }

    pub(crate) fn eid(store: &dyn Store, url: &str) -> EntityId {
        *super::source_urls(store)
            .get(url)
            .unwrap_or_else(|| panic!("no entity for {url}"))
    }
}
