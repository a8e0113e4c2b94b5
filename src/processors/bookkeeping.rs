//! Passes that open every run.

use crate::pipeline::{BuildContext, Options, ProcessorFuture};
use crate::store::{ComponentDef, Query, Store};

/// Forget which entities the previous run touched.
pub fn clear_updates<'a>(
    store: &'a mut dyn Store,
    _ctx: &'a BuildContext,
    _options: &'a Options,
) -> ProcessorFuture<'a> {
    Box::pin(async move {
        store.reset_updated();
        Ok(())
    })
}

/// Drop error components left by the previous run.
///
/// Removing the component marks the entity updated, so entities that
/// failed last time are retried even in an incremental run.
pub fn clear_errors<'a>(
    store: &'a mut dyn Store,
    _ctx: &'a BuildContext,
    _options: &'a Options,
) -> ProcessorFuture<'a> {
    Box::pin(async move {
        for eid in store.select(&Query::new().with(ComponentDef::Error)) {
            store.remove_components(eid, ComponentDef::Error.into());
        }
        Ok(())
    })
}
