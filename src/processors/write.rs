//! `write`: persist rendered output and delete outputs that lost their
//! source.

use std::io::ErrorKind;

use super::{record_error, working_set};
use crate::debug;
use crate::pipeline::{BuildContext, Options, ProcessorFuture};
use crate::store::{ComponentDef, Entity, Query, Store};
use crate::utils::path::output_path;

const PASS: &str = "write";

pub fn run<'a>(
    store: &'a mut dyn Store,
    ctx: &'a BuildContext,
    _options: &'a Options,
) -> ProcessorFuture<'a> {
    Box::pin(async move {
        let removed = ctx.take_removed_outputs();
        if !ctx.write_output {
            return Ok(());
        }

        // A URL given up by one entity may already belong to another.
        let stale: Vec<String> = {
            let indices = ctx.indices.read();
            removed
                .into_iter()
                .filter(|url| !indices.destinations().is_some_and(|dst| dst.contains(url)))
                .collect()
        };
        for url in stale {
            let path = output_path(ctx.output_dir(), &url);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("write"; "removed {}", url),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => ctx
                    .reporter
                    .warn(PASS, None, format!("cannot remove {}: {err}", path.display())),
            }
        }

        let pages: Vec<Entity> = working_set(
            store,
            ctx,
            Query::new().with([ComponentDef::Destination, ComponentDef::Output]),
        )
        .into_iter()
        .filter_map(|eid| store.get_entity(eid, true))
        .collect();

        let mut written = 0usize;
        for page in pages {
            let (Some(url), Some((text, _))) = (page.destination(), page.output()) else {
                continue;
            };
            if !owns_destination(ctx, url, page.id) {
                continue;
            }
            let path = output_path(ctx.output_dir(), url);
            let result = async {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&path, text).await
            }
            .await;
            match result {
                Ok(()) => written += 1,
                Err(err) => record_error(
                    store,
                    ctx,
                    PASS,
                    page.id,
                    format!("cannot write {}: {err}", path.display()),
                ),
            }
        }
        debug!("write"; "{} files written", written);
        Ok(())
    })
}

/// Whether the destination index maps `url` to `eid`. Conflicting entities
/// other than the owner are not written.
pub(super) fn owns_destination(ctx: &BuildContext, url: &str, eid: crate::store::EntityId) -> bool {
    ctx.indices
        .read()
        .destinations()
        .and_then(|dst| dst.get_eid(url))
        .is_none_or(|owner| owner == eid)
}
