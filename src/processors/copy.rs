//! `copy`: static files go to the output directory unchanged.

use std::path::Path;
use std::time::SystemTime;

use super::{TEXT_DEFS, record_error, working_set};
use crate::debug;
use crate::pipeline::{BuildContext, Options, ProcessorFuture};
use crate::store::{ComponentDef, Query, Store};
use crate::utils::path::{output_path, source_path};

const PASS: &str = "copy";

pub fn run<'a>(
    store: &'a mut dyn Store,
    ctx: &'a BuildContext,
    _options: &'a Options,
) -> ProcessorFuture<'a> {
    Box::pin(async move {
        if !ctx.write_output {
            return Ok(());
        }

        let files: Vec<(u64, String, String)> = working_set(
            store,
            ctx,
            Query::new()
                .with([ComponentDef::Source, ComponentDef::Destination])
                .without(TEXT_DEFS),
        )
        .into_iter()
        .filter_map(|eid| store.get_entity(eid, true))
        .filter(|entity| !entity.is_dir())
        .filter_map(|entity| {
            let src = entity.source_url()?.to_string();
            let dst = entity.destination()?.to_string();
            Some((entity.id, src, dst))
        })
        .collect();

        let mut copied = 0usize;
        for (eid, src, dst) in files {
            if !super::write::owns_destination(ctx, &dst, eid) {
                continue;
            }
            let from = source_path(ctx.content_dir(), &src);
            let to = output_path(ctx.output_dir(), &dst);
            if is_fresh(&from, &to).await {
                continue;
            }
            let result = async {
                if let Some(parent) = to.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::copy(&from, &to).await
            }
            .await;
            match result {
                Ok(_) => copied += 1,
                Err(err) => record_error(
                    store,
                    ctx,
                    PASS,
                    eid,
                    format!("cannot copy {} to {}: {err}", from.display(), to.display()),
                ),
            }
        }
        debug!("copy"; "{} files copied", copied);
        Ok(())
    })
}

/// Same size and not older than the source.
async fn is_fresh(from: &Path, to: &Path) -> bool {
    let (Ok(src), Ok(dst)) = (tokio::fs::metadata(from).await, tokio::fs::metadata(to).await)
    else {
        return false;
    };
    let modified = |m: &std::fs::Metadata| m.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    src.len() == dst.len() && modified(&dst) >= modified(&src)
}
