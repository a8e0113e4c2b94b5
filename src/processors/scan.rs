//! `scan`: keep one source entity per file and directory of the content tree.
//!
//! A full run walks the whole tree and reconciles the store with it. An
//! incremental run applies the watcher's pending changes instead.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use jwalk::WalkDir;
use rustc_hash::{FxHashMap, FxHashSet};

use super::{report_rejected, source_urls};
use crate::graph::dependents;
use crate::pipeline::{BuildContext, Options, ProcessorFuture};
use crate::store::{Component, ComponentData, EntityId, Store};
use crate::utils::path::{is_ignored, source_path, to_source_url};
use crate::utils::url;
use crate::watch::{ChangeOp, PendingChange};
use crate::debug;

const PASS: &str = "scan";

/// A file or directory found on disk.
#[derive(Debug, Clone)]
struct Found {
    url: String,
    source: ComponentData,
}

pub fn run<'a>(
    store: &'a mut dyn Store,
    ctx: &'a BuildContext,
    _options: &'a Options,
) -> ProcessorFuture<'a> {
    Box::pin(async move {
        if ctx.only_updated {
            apply_changes(store, ctx).await
        } else {
            full_scan(store, ctx).await
        }
    })
}

async fn full_scan(store: &mut dyn Store, ctx: &BuildContext) -> Result<()> {
    let root = ctx.content_dir().to_path_buf();
    anyhow::ensure!(
        root.is_dir(),
        "content directory `{}` does not exist",
        root.display()
    );

    let found = walk(ctx, &root).await?;
    let mut known = source_urls(store);
    let mut seen = FxHashSet::default();

    for entry in found {
        seen.insert(entry.url.clone());
        upsert(store, ctx, &mut known, entry);
    }

    let gone: Vec<EntityId> = known
        .iter()
        .filter(|(url, _)| !seen.contains(*url))
        .map(|(_, eid)| *eid)
        .collect();
    remove_sources(store, ctx, &gone);

    debug!(PASS; "{} source entities, {} removed", seen.len(), gone.len());
    Ok(())
}

async fn apply_changes(store: &mut dyn Store, ctx: &BuildContext) -> Result<()> {
    let root = ctx.content_dir().to_path_buf();
    let mut known = source_urls(store);

    for change in &ctx.changes {
        match change.op {
            ChangeOp::None => {}
            ChangeOp::Remove => {
                let ids = subtree(&known, &change.url);
                remove_sources(store, ctx, &ids);
                known.retain(|_, eid| !ids.contains(eid));
            }
            ChangeOp::Add | ChangeOp::Update => {
                let path = source_path(&root, &change.url);
                let Some(entry) = stat(ctx, &root, &path).await else {
                    // Gone again before the build ran.
                    let ids = subtree(&known, &change.url);
                    remove_sources(store, ctx, &ids);
                    known.retain(|_, eid| !ids.contains(eid));
                    continue;
                };

                for ancestor in missing_ancestors(&known, &change.url) {
                    let path = source_path(&root, &ancestor);
                    if let Some(found) = stat(ctx, &root, &path).await {
                        upsert(store, ctx, &mut known, found);
                    }
                }

                let is_new = !known.contains_key(&change.url);
                let is_dir = matches!(entry.source, ComponentData::Source { is_dir: true, .. });
                let eid = upsert(store, ctx, &mut known, entry);
                if let Some(eid) = eid {
                    store.mark_updated(eid);
                }
                if is_new {
                    wake_referrers(store, ctx, &change.url);
                }
                if is_new && is_dir {
                    for found in walk(ctx, &path).await? {
                        let url = found.url.clone();
                        let added = !known.contains_key(&url);
                        upsert(store, ctx, &mut known, found);
                        if added {
                            wake_referrers(store, ctx, &url);
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// Create or refresh the entity for `entry`. Unchanged sources stay quiet.
fn upsert(
    store: &mut dyn Store,
    ctx: &BuildContext,
    known: &mut FxHashMap<String, EntityId>,
    entry: Found,
) -> Option<EntityId> {
    let eid = match known.get(&entry.url) {
        Some(eid) => *eid,
        None => {
            let eid = store.create_entity();
            known.insert(entry.url.clone(), eid);
            eid
        }
    };
    let applied = store.add_components(vec![Component::new(eid, entry.source)]);
    if applied.is_clean() {
        Some(eid)
    } else {
        report_rejected(ctx, PASS, applied.rejected);
        None
    }
}

/// Mark referrers whose references were waiting on the new `url`.
fn wake_referrers(store: &mut dyn Store, ctx: &BuildContext, url: &str) {
    let waiting = ctx.unresolved.lock().waiting_on(url);
    for referrer in waiting {
        if store.has_entity(referrer) {
            debug!(PASS; "{url} resolves a reference of entity {referrer}");
            store.mark_updated(referrer);
        }
    }
}

/// Remove entities, first marking what depends on them and queuing their
/// output files for deletion.
fn remove_sources(store: &mut dyn Store, ctx: &BuildContext, ids: &[EntityId]) {
    if ids.is_empty() {
        return;
    }
    let removing: FxHashSet<EntityId> = ids.iter().copied().collect();
    for eid in ids {
        for dependent in dependents(store, *eid) {
            if !removing.contains(&dependent) {
                store.mark_updated(dependent);
            }
        }
        if let Some(entity) = store.get_entity(*eid, true)
            && let Some(dst) = entity.destination()
        {
            ctx.record_removed_output(dst);
        }
    }
    {
        let mut unresolved = ctx.unresolved.lock();
        for eid in ids {
            unresolved.forget(*eid);
        }
    }
    let removed = store.remove_entities(ids);
    debug!(PASS; "removed {} entities", removed);
}

/// `url` itself and every known URL below it.
fn subtree(known: &FxHashMap<String, EntityId>, url: &str) -> Vec<EntityId> {
    let prefix = if url == "/" {
        "/".to_string()
    } else {
        format!("{url}/")
    };
    let mut ids: Vec<EntityId> = known
        .iter()
        .filter(|(k, _)| k.as_str() == url || k.starts_with(&prefix))
        .map(|(_, eid)| *eid)
        .collect();
    ids.sort_unstable();
    ids
}

/// Ancestor URLs of `url` without an entity, outermost first.
fn missing_ancestors(known: &FxHashMap<String, EntityId>, url: &str) -> Vec<String> {
    let mut missing = Vec::new();
    let mut current = url::parent(url);
    while let Some(parent) = current {
        if known.contains_key(parent) {
            break;
        }
        missing.push(parent.to_string());
        current = url::parent(parent);
    }
    missing.reverse();
    missing
}

/// Whether a path below the content root becomes an entity.
fn eligible(ctx: &BuildContext, root: &Path, path: &Path, is_dir: bool) -> bool {
    let Ok(rel) = path.strip_prefix(root) else {
        return false;
    };
    if is_ignored(rel) || path.starts_with(ctx.output_dir()) {
        return false;
    }
    is_dir || rel.file_name().is_none_or(|name| name != ctx.meta_file())
}

/// Every eligible entry at or below `dir`, in path order.
async fn walk(ctx: &BuildContext, dir: &Path) -> Result<Vec<Found>> {
    let root = ctx.content_dir().to_path_buf();
    let dir = dir.to_path_buf();
    let output = ctx.output_dir().to_path_buf();
    let meta_file = ctx.meta_file().to_string();

    let paths: Vec<(PathBuf, bool)> = tokio::task::spawn_blocking(move || {
        WalkDir::new(&dir)
            .sort(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| !e.path().starts_with(&output))
            .map(|e| (e.path(), e.file_type().is_dir()))
            .collect()
    })
    .await
    .context("content walk panicked")?;

    let mut found = Vec::with_capacity(paths.len());
    for (path, is_dir) in paths {
        if !eligible(ctx, &root, &path, is_dir) {
            continue;
        }
        if let Some(entry) = describe(&root, &path, is_dir, &meta_file) {
            found.push(entry);
        }
    }
    Ok(found)
}

async fn stat(ctx: &BuildContext, root: &Path, path: &Path) -> Option<Found> {
    let is_dir = tokio::fs::metadata(path).await.ok()?.is_dir();
    if !eligible(ctx, root, path, is_dir) {
        return None;
    }
    describe(root, path, is_dir, ctx.meta_file())
}

/// Source component for a path. A directory's mtime is that of its
/// metadata file, or 0 without one.
fn describe(root: &Path, path: &Path, is_dir: bool, meta_file: &str) -> Option<Found> {
    let url = to_source_url(root, path)?;
    let metadata = std::fs::metadata(path).ok()?;
    let mtime = if is_dir {
        std::fs::metadata(path.join(meta_file))
            .and_then(|m| m.modified())
            .map_or(0, millis)
    } else {
        metadata.modified().map_or(0, millis)
    };
    let ctime = metadata.created().map_or(mtime, millis);

    Some(Found {
        source: ComponentData::Source {
            url: url.clone(),
            is_dir,
            mtime,
            ctime,
        },
        url,
    })
}

fn millis(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}
