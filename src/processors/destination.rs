//! `destination`: where each source entity is written.
//!
//! | source                         | destination                         |
//! |--------------------------------|-------------------------------------|
//! | directory, `_`-prefixed path   | none                                |
//! | `dst` in own metadata          | that URL (relative to the file)     |
//! | `/a.md`                        | `/a.html` (`/a/index.html` pretty)  |
//! | anything else                  | unchanged                           |
//!
//! Option `pretty_urls` switches markdown pages to directory-style URLs.

use super::{flag, report_rejected, working_set};
use crate::pipeline::{BuildContext, Options, ProcessorFuture};
use crate::store::{Component, ComponentData, ComponentDef, Entity, Query, Store};
use crate::utils::url;

const PASS: &str = "destination";

/// Metadata key overriding the computed destination.
pub const DST_KEY: &str = "dst";

pub fn run<'a>(
    store: &'a mut dyn Store,
    ctx: &'a BuildContext,
    options: &'a Options,
) -> ProcessorFuture<'a> {
    Box::pin(async move {
        let pretty = flag(options, "pretty_urls");
        let entities: Vec<Entity> =
            working_set(store, ctx, Query::new().with(ComponentDef::Source))
                .into_iter()
                .filter_map(|eid| store.get_entity(eid, true))
                .collect();

        for entity in entities {
            let old = entity.destination().map(str::to_string);
            let new = destination_of(&entity, pretty);
            if old == new {
                continue;
            }

            if let Some(old) = old {
                ctx.record_removed_output(old);
            }
            match new {
                Some(url) => {
                    let applied = store.add_components(vec![Component::new(
                        entity.id,
                        ComponentData::Destination { url },
                    )]);
                    report_rejected(ctx, PASS, applied.rejected);
                }
                None => {
                    store.remove_components(entity.id, ComponentDef::Destination.into());
                }
            }
        }
        Ok(())
    })
}

/// Destination URL for a source entity, `None` when it is not published.
pub fn destination_of(entity: &Entity, pretty_urls: bool) -> Option<String> {
    let src = entity.source_url()?;
    if entity.is_dir() || url::is_unpublished(src) {
        return None;
    }

    if let Some(dst) = entity
        .meta()
        .and_then(|meta| meta.get(DST_KEY))
        .and_then(serde_json::Value::as_str)
        .filter(|dst| !dst.is_empty())
    {
        let mut target = url::join(url::base_dir(src, false), dst);
        if target.ends_with('/') {
            target.push_str("index.html");
        }
        return Some(target);
    }

    match url::extension(src) {
        Some("md" | "markdown") => {
            let stem = url::strip_extension(src);
            if pretty_urls && url::file_name(stem) != "index" {
                Some(format!("{stem}/index.html"))
            } else {
                Some(format!("{stem}.html"))
            }
        }
        _ => Some(src.to_string()),
    }
}
