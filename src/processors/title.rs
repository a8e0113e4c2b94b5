//! `title`: a `title` component for every markup page.
//!
//! The first of: `title` metadata, the heading the transformer finds, the
//! file stem.

use serde_json::Value;

use super::{report_rejected, working_set};
use crate::pipeline::{BuildContext, Options, ProcessorFuture};
use crate::store::{Component, ComponentData, ComponentDef, Entity, Query, Store};
use crate::transform::TransformerSet;
use crate::utils::url;

const PASS: &str = "title";

pub fn run<'a>(
    store: &'a mut dyn Store,
    ctx: &'a BuildContext,
    _options: &'a Options,
) -> ProcessorFuture<'a> {
    Box::pin(async move {
        let ids = working_set(
            store,
            ctx,
            Query::new().with([ComponentDef::Source, ComponentDef::Markup]),
        );

        let components: Vec<Component> = ids
            .into_iter()
            .filter_map(|eid| store.get_entity(eid, true))
            .filter_map(|entity| {
                let text = title_of(&entity, &ctx.transformers)?;
                Some(Component::new(entity.id, ComponentData::Title { text }))
            })
            .collect();

        let applied = store.add_components(components);
        report_rejected(ctx, PASS, applied.rejected);
        Ok(())
    })
}

fn title_of(entity: &Entity, transformers: &TransformerSet) -> Option<String> {
    let explicit = entity
        .meta()
        .and_then(|meta| meta.get("title"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|title| !title.is_empty());
    if let Some(title) = explicit {
        return Some(title.to_string());
    }

    let (text, mime) = entity.text()?;
    transformers
        .for_mime(mime)
        .and_then(|t| t.title(text))
        .or_else(|| {
            let stem = url::file_name(url::strip_extension(entity.source_url()?));
            (!stem.is_empty()).then(|| stem.to_string())
        })
}
