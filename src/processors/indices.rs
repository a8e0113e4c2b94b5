//! `source-index` and `destination-index`: rebuild the URL indices.
//!
//! Both always rebuild from scratch, whatever `only_updated` says.

use crate::index::{rebuild_destination_index, rebuild_source_index};
use crate::pipeline::{BuildContext, Options, ProcessorFuture};
use crate::store::Store;

pub fn source<'a>(
    store: &'a mut dyn Store,
    ctx: &'a BuildContext,
    _options: &'a Options,
) -> ProcessorFuture<'a> {
    Box::pin(async move {
        let index = rebuild_source_index(store);
        ctx.indices.write().replace(index);
        Ok(())
    })
}

/// A URL claimed twice is kept by the lower entity id; the other claimant
/// gets a warning.
pub fn destination<'a>(
    store: &'a mut dyn Store,
    ctx: &'a BuildContext,
    _options: &'a Options,
) -> ProcessorFuture<'a> {
    Box::pin(async move {
        let (index, conflicts) = rebuild_destination_index(store);
        for (url, eid) in conflicts {
            let owner = index.get_eid(&url).unwrap_or_default();
            ctx.reporter.warn(
                "destination-index",
                Some(eid),
                format!("`{url}` is already written by entity {owner}"),
            );
        }
        ctx.indices.write().replace(index);
        Ok(())
    })
}
