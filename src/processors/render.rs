//! `render`: transformer output wrapped in the page's layout chain.
//!
//! ```text
//! page.md ─layout─▶ post.html ─layout─▶ base.html
//!
//! output = base( post( transform(page.md) ) )
//! ```
//!
//! The result is a `rendered-output` component on the page itself; the
//! layouts are only read. References are rewritten to the destination URLs
//! of their targets.

use rustc_hash::{FxHashMap, FxHashSet};

use super::{TEXT_DEFS, record_error, report_rejected, working_set};
use crate::debug;
use crate::graph::{DepKind, get_dependency_entities, merge_meta, resolve_dir_meta};
use crate::index::{Resolution, get_by_eid, resolve_reference};
use crate::pipeline::{BuildContext, Options, ProcessorFuture};
use crate::store::{Component, ComponentData, ComponentDef, Entity, EntityId, JsonMap, Query, Store};
use crate::transform::layout::{apply_layout, has_slot};
use crate::transform::{EXPORTED_KEYS, TransformError, TransformInput, TransformOutput, import_target};

const PASS: &str = "render";

pub fn run<'a>(
    store: &'a mut dyn Store,
    ctx: &'a BuildContext,
    _options: &'a Options,
) -> ProcessorFuture<'a> {
    Box::pin(async move {
        let ids = working_set(
            store,
            ctx,
            Query::new().with(ComponentDef::Destination).with_any(TEXT_DEFS),
        );
        let mut rendered = 0usize;
        for eid in ids {
            match render_entity(store, ctx, eid) {
                Ok(()) => rendered += 1,
                Err(err) => record_error(store, ctx, PASS, eid, err.to_string()),
            }
        }
        debug!("render"; "{} entities rendered", rendered);
        Ok(())
    })
}

/// Render one entity into its `rendered-output` component.
///
/// Writes go through `store`, so a capturing store can take the output
/// without touching the real one. On error nothing is written.
pub fn render_entity(
    store: &mut dyn Store,
    ctx: &BuildContext,
    eid: EntityId,
) -> Result<(), TransformError> {
    let Some(entity) = store.get_entity(eid, true) else {
        return Ok(());
    };
    let url = entity.source_url().unwrap_or_default().to_string();
    let page = transform_one(store, ctx, &entity)?;
    let title = entity.title().unwrap_or_default().to_string();

    let mut meta = page.meta;
    merge_meta(&mut meta, &page.output.exported_meta);

    let mut text = page.output.output_text;
    let mut visited: FxHashSet<EntityId> = FxHashSet::default();
    visited.insert(eid);
    let mut current = eid;
    while let Some(layout) = get_dependency_entities(store, current, &[DepKind::Layout])
        .into_iter()
        .next()
    {
        let layout_url = layout.source_url().unwrap_or_default().to_string();
        if !visited.insert(layout.id) {
            return Err(TransformError::LayoutCycle(layout_url));
        }
        let template = transform_one(store, ctx, &layout)?.output.output_text;
        if !has_slot(&template) {
            ctx.reporter.warn(
                PASS,
                Some(eid),
                format!("{url}: layout {layout_url} has no {{{{ children }}}} slot"),
            );
        }
        text = apply_layout(&template, &text, &title, &meta);
        current = layout.id;
    }

    let mut own = entity.meta().cloned().unwrap_or_default();
    own.retain(|key, _| !EXPORTED_KEYS.contains(&key.as_str()));
    merge_meta(&mut own, &page.output.exported_meta);

    let applied = store.add_components(vec![
        Component::new(
            eid,
            ComponentData::Output {
                text,
                mime: page.mime.to_string(),
            },
        ),
        Component::new(eid, ComponentData::Metadata { meta: own }),
    ]);
    report_rejected(ctx, PASS, applied.rejected);
    Ok(())
}

struct Transformed {
    output: TransformOutput,
    /// Resolved metadata the transformer saw.
    meta: JsonMap,
    mime: &'static str,
}

fn transform_one(
    store: &dyn Store,
    ctx: &BuildContext,
    entity: &Entity,
) -> Result<Transformed, TransformError> {
    let url = entity.source_url().unwrap_or_default();
    let (text, mime) = entity
        .text()
        .ok_or_else(|| TransformError::Unsupported(url.to_string()))?;
    let transformer = ctx
        .transformers
        .for_mime(mime)
        .ok_or_else(|| TransformError::Unsupported(mime.to_string()))?;

    let meta = resolve_dir_meta(store, entity.id);
    let imports = imports(ctx, url, &transformer.discover(text));
    let output = transformer.transform(TransformInput {
        source_text: text,
        path: url,
        meta: &meta,
        imports: &imports,
    })?;
    Ok(Transformed {
        output,
        meta,
        mime: transformer.output_mime(),
    })
}

/// Literal → output URL for every reference whose target is published.
fn imports(
    ctx: &BuildContext,
    url: &str,
    found: &[crate::transform::Discovered],
) -> FxHashMap<String, String> {
    let indices = ctx.indices.read();
    let Some(dst) = indices.destinations() else {
        return FxHashMap::default();
    };
    found
        .iter()
        .filter_map(|reference| {
            let Resolution::Found { eid, .. } =
                resolve_reference(&indices, url, false, &reference.literal)
            else {
                return None;
            };
            let target = get_by_eid(dst, eid)?;
            Some((reference.literal.clone(), import_target(&reference.literal, target)))
        })
        .collect()
}
