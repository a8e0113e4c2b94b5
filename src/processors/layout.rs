//! `layout`: a `layout` edge from each page to the template named by its
//! resolved `layout` metadata.
//!
//! Names resolve like any reference, falling back to `/_layouts/<name>`.

use serde_json::Value;

use super::{report_rejected, working_set};
use crate::graph::{DepKind, resolve_dir_meta, sync_dependencies};
use crate::index::{Resolution, resolve_reference};
use crate::pipeline::{BuildContext, Options, ProcessorFuture};
use crate::store::{ComponentData, ComponentDef, EntityId, Query, Store};

const PASS: &str = "layout";

/// Metadata key naming the layout.
pub const LAYOUT_KEY: &str = "layout";

/// Directory searched for bare layout names.
pub const LAYOUT_DIR: &str = "/_layouts";

pub fn run<'a>(
    store: &'a mut dyn Store,
    ctx: &'a BuildContext,
    _options: &'a Options,
) -> ProcessorFuture<'a> {
    Box::pin(async move {
        let pages = working_set(
            store,
            ctx,
            Query::new().with([ComponentDef::Source, ComponentDef::Markup]),
        );

        for eid in pages {
            let Some(url) = store
                .get_entity(eid, true)
                .and_then(|e| e.source_url().map(str::to_string))
            else {
                continue;
            };
            let meta = resolve_dir_meta(store, eid);
            let literal = match meta.get(LAYOUT_KEY) {
                Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
                _ => {
                    sync(store, ctx, eid, None);
                    continue;
                }
            };

            let target = match find_layout(ctx, &url, &literal) {
                Ok(target) if target == eid => None,
                Ok(target) => Some((target, literal)),
                Err(message) => {
                    ctx.reporter.warn(PASS, Some(eid), format!("{url}: {message}"));
                    None
                }
            };
            sync(store, ctx, eid, target);
        }
        Ok(())
    })
}

fn sync(store: &mut dyn Store, ctx: &BuildContext, eid: EntityId, target: Option<(EntityId, String)>) {
    let desired = target
        .map(|(dst, literal)| vec![(dst, vec![ComponentData::Url { url: literal }])])
        .unwrap_or_default();
    let synced = sync_dependencies(store, eid, DepKind::Layout, desired);
    report_rejected(ctx, PASS, synced.rejected);
}

fn find_layout(ctx: &BuildContext, from: &str, literal: &str) -> Result<EntityId, String> {
    let indices = ctx.indices.read();
    let first = resolve_reference(&indices, from, false, literal);
    if let Some(eid) = first.eid() {
        return Ok(eid);
    }
    if !literal.starts_with(['/', '.']) {
        let fallback = format!("{LAYOUT_DIR}/{literal}");
        if let Some(eid) = resolve_reference(&indices, from, false, &fallback).eid() {
            return Ok(eid);
        }
    }
    Err(match first {
        Resolution::Missing { target } => format!("layout `{literal}` not found (looked for {target})"),
        _ => format!("`{literal}` is not a layout"),
    })
}
