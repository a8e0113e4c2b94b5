//! `read`: load the text of markup, style and script sources.

use super::{record_error, report_rejected, working_set};
use crate::pipeline::{BuildContext, Options, ProcessorFuture};
use crate::store::{Component, ComponentData, ComponentDef, Query, Store};
use crate::utils::mime::{self, SourceKind};
use crate::utils::path::source_path;

const PASS: &str = "read";

pub fn run<'a>(
    store: &'a mut dyn Store,
    ctx: &'a BuildContext,
    _options: &'a Options,
) -> ProcessorFuture<'a> {
    Box::pin(async move {
        let files: Vec<_> = working_set(store, ctx, Query::new().with(ComponentDef::Source))
            .into_iter()
            .filter_map(|eid| store.get_entity(eid, true))
            .filter(|entity| !entity.is_dir())
            .filter_map(|entity| Some((entity.id, entity.source_url()?.to_string())))
            .collect();

        for (eid, url) in files {
            let kind = mime::source_kind(&url);
            if kind == SourceKind::Static {
                continue;
            }

            let path = source_path(ctx.content_dir(), &url);
            let text = match tokio::fs::read_to_string(&path).await {
                Ok(text) => text,
                Err(err) => {
                    record_error(store, ctx, PASS, eid, format!("cannot read {url}: {err}"));
                    continue;
                }
            };

            let data = match kind {
                SourceKind::Markup => ComponentData::Markup {
                    text,
                    mime: mime::essence(mime::from_url(&url)).to_string(),
                },
                SourceKind::Style => ComponentData::Style { text },
                SourceKind::Script => ComponentData::Script { text },
                SourceKind::Static => continue,
            };
            let applied = store.add_components(vec![Component::new(eid, data)]);
            report_rejected(ctx, PASS, applied.rejected);
        }
        Ok(())
    })
}
