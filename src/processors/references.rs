//! `references`: `link`, `import`, `css` and `script` edges from the
//! references each transformer discovers in a source.
//!
//! Every edge carries the literal as written in a `url` component.
//! References that resolve to nothing are reported, left out, and remembered
//! so `scan` can revisit the referrer once the target is added.

use rustc_hash::FxHashMap;

use super::{TEXT_DEFS, report_rejected, working_set};
use crate::graph::{DepKind, sync_dependencies};
use crate::index::{Resolution, resolve_reference};
use crate::pipeline::{BuildContext, Options, ProcessorFuture};
use crate::store::{ComponentData, ComponentDef, EntityId, Query, Store};
use crate::transform::Discovered;

const PASS: &str = "references";

/// Relations owned by this pass.
pub const KINDS: [DepKind; 4] = [DepKind::Link, DepKind::Import, DepKind::Css, DepKind::Script];

type Desired = Vec<(EntityId, Vec<ComponentData>)>;

pub fn run<'a>(
    store: &'a mut dyn Store,
    ctx: &'a BuildContext,
    _options: &'a Options,
) -> ProcessorFuture<'a> {
    Box::pin(async move {
        let ids = working_set(
            store,
            ctx,
            Query::new().with(ComponentDef::Source).with_any(TEXT_DEFS),
        );

        for eid in ids {
            let Some(entity) = store.get_entity(eid, true) else {
                continue;
            };
            let (Some(url), Some((text, mime))) = (entity.source_url(), entity.text()) else {
                continue;
            };
            let Some(transformer) = ctx.transformers.for_mime(mime) else {
                continue;
            };

            let found = transformer.discover(text);
            let (desired, missing) = resolve_all(ctx, eid, url, &found);
            ctx.unresolved.lock().set(eid, missing);
            for kind in KINDS {
                let edges = desired.get(&kind).cloned().unwrap_or_default();
                let synced = sync_dependencies(store, eid, kind, edges);
                report_rejected(ctx, PASS, synced.rejected);
            }
        }
        Ok(())
    })
}

fn resolve_all(
    ctx: &BuildContext,
    eid: EntityId,
    url: &str,
    found: &[Discovered],
) -> (FxHashMap<DepKind, Desired>, Vec<String>) {
    let indices = ctx.indices.read();
    let mut desired: FxHashMap<DepKind, Desired> = FxHashMap::default();
    let mut missing = Vec::new();
    for reference in found {
        match resolve_reference(&indices, url, false, &reference.literal) {
            Resolution::Found { eid: target, .. } if target != eid => {
                desired.entry(reference.kind).or_default().push((
                    target,
                    vec![ComponentData::Url {
                        url: reference.literal.clone(),
                    }],
                ));
            }
            Resolution::Missing { target } => {
                ctx.reporter.warn(
                    PASS,
                    Some(eid),
                    format!("{url}: unresolved reference `{}` ({target})", reference.literal),
                );
                missing.push(target);
            }
            _ => {}
        }
    }
    (desired, missing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::get_dependency_entities;
    use crate::pipeline::{Level, ProcessorFn};
    use crate::processors::testing::{Fixture, eid};
    use crate::processors::{indices, read, scan};
    use crate::store::EntityStore;

    #[tokio::test]
    async fn test_edges_by_kind_with_literals() {
        let fixture = Fixture::new(&[
            (
                "index.html",
                r#"<link rel="stylesheet" href="style.css"><script src="app.js"></script><a href="about">About</a><a href="ghost.md">?</a><a href="https://example.com">x</a>"#,
            ),
            ("about.md", "[home](/index.html)"),
            ("style.css", "@import \"base.css\";"),
            ("base.css", ""),
            ("app.js", "import { x } from './lib.js';"),
            ("lib.js", "export const x = 1;"),
        ]);
        let ctx = fixture.context();
        let options = Options::new();
        let mut store = EntityStore::new();
        let passes: [ProcessorFn; 4] = [scan::run, read::run, indices::source, run];
        for pass in passes {
            pass(&mut store, &ctx, &options).await.unwrap();
        }

        let targets = |url: &str, kind: DepKind| -> Vec<(String, String)> {
            crate::graph::dependency_edges(&store, eid(&store, url), &[kind], crate::store::Direction::Outgoing)
                .into_iter()
                .map(|edge| {
                    let dst = store.get_entity(edge.dst, true).unwrap();
                    let literal = store.get_entity(edge.id, true).unwrap();
                    (
                        dst.source_url().unwrap().to_string(),
                        literal.literal().unwrap().to_string(),
                    )
                })
                .collect()
        };

        assert_eq!(targets("/index.html", DepKind::Css), vec![("/style.css".into(), "style.css".into())]);
        assert_eq!(targets("/index.html", DepKind::Script), vec![("/app.js".into(), "app.js".into())]);
        assert_eq!(targets("/index.html", DepKind::Link), vec![("/about.md".into(), "about".into())]);
        assert_eq!(targets("/style.css", DepKind::Import), vec![("/base.css".into(), "base.css".into())]);
        assert_eq!(targets("/app.js", DepKind::Import), vec![("/lib.js".into(), "./lib.js".into())]);
        assert_eq!(get_dependency_entities(&store, eid(&store, "/about.md"), &[DepKind::Link]).len(), 1);

        let warnings = ctx.reporter.at(Level::Warn);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("ghost.md"));

        let index = eid(&store, "/index.html");
        assert_eq!(ctx.unresolved.lock().waiting_on("/ghost.md"), vec![index]);
    }
}
