//! Debounced filesystem changes → [`PendingChange`]s for the `scan` pass.
//!
//! ```text
//! correct_by_existence → map to source URLs → recover directory events → order
//! ```
//!
//! | seen                    | tracked in `src` | op     |
//! |-------------------------|------------------|--------|
//! | created / modified file | no               | Add    |
//! | created / modified file | yes              | Update |
//! | removed                 | yes              | Remove |
//! | removed                 | no               | None   |
//! | directory metadata file | -                | Update of the directory |
//! | modified directory      | yes              | None, children recovered |

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use super::{ChangeKind, ChangeOp, PendingChange};
use crate::config::SiteConfig;
use crate::debug;
use crate::index::Index;
use crate::utils::path::{is_ignored_url, normalize_path, to_source_url};
use crate::utils::url;

pub(super) fn classify(
    raw: FxHashMap<PathBuf, ChangeKind>,
    config: &SiteConfig,
    sources: Option<&Index>,
) -> Vec<PendingChange> {
    let mut changes = raw;
    correct_by_existence(&mut changes);

    let content = config.content_dir();
    let meta_file = config.build.meta_file.as_str();
    let tracked = |url: &str| sources.and_then(|src| src.get_eid(url));

    let mut by_url: FxHashMap<String, PendingChange> = FxHashMap::default();
    let mut push = |change: PendingChange| {
        let keep = by_url
            .get(&change.url)
            .is_none_or(|current| rank(change.op) > rank(current.op));
        if keep {
            by_url.insert(change.url.clone(), change);
        }
    };

    for (path, kind) in changes {
        if path.starts_with(config.output_dir()) {
            continue;
        }
        let Some(src_url) = to_source_url(content, &path) else {
            continue;
        };
        if is_ignored_url(&src_url) {
            continue;
        }

        if url::file_name(&src_url) == meta_file {
            let (Some(dir), Some(dir_url)) = (path.parent(), url::parent(&src_url)) else {
                continue;
            };
            if dir.is_dir() {
                let op = if tracked(dir_url).is_some() {
                    ChangeOp::Update
                } else {
                    ChangeOp::Add
                };
                push(PendingChange::new(dir, dir_url, op).with_existing(tracked(dir_url)));
            }
            continue;
        }

        let existing = tracked(&src_url);
        if kind == ChangeKind::Modified && existing.is_some() && path.is_dir() {
            for change in recover_children(&path, &src_url, meta_file, sources) {
                push(change);
            }
            continue;
        }

        let op = match (kind, existing) {
            (ChangeKind::Removed, Some(_)) => ChangeOp::Remove,
            (ChangeKind::Removed, None) => ChangeOp::None,
            (_, None) => ChangeOp::Add,
            (_, Some(_)) => ChangeOp::Update,
        };
        push(PendingChange::new(path, src_url, op).with_existing(existing));
    }

    let mut out: Vec<PendingChange> = by_url.into_values().collect();
    // Removals first, then parents before children.
    out.sort_by(|a, b| {
        (a.op != ChangeOp::Remove)
            .cmp(&(b.op != ChangeOp::Remove))
            .then_with(|| a.url.cmp(&b.url))
    });
    out
}

/// Which of two changes to the same URL wins.
fn rank(op: ChangeOp) -> u8 {
    match op {
        ChangeOp::None => 0,
        ChangeOp::Update => 1,
        ChangeOp::Add => 2,
        ChangeOp::Remove => 3,
    }
}

/// Reconcile event kinds with what is on disk now.
///
/// Watchers report stale events: Created for a file already deleted again,
/// Removed for a file an atomic save has just put back.
fn correct_by_existence(changes: &mut FxHashMap<PathBuf, ChangeKind>) {
    changes.retain(|path, kind| {
        let exists = path.exists();
        match *kind {
            ChangeKind::Created if !exists => {
                debug!("watch"; "discard created (gone): {}", path.display());
                return false;
            }
            ChangeKind::Modified if !exists => *kind = ChangeKind::Removed,
            ChangeKind::Removed if exists => *kind = ChangeKind::Modified,
            _ => {}
        }
        true
    });
}

/// Some platforms only report a directory modification when a file inside
/// is replaced. Compare the directory listing with the index instead.
fn recover_children(
    dir: &Path,
    dir_url: &str,
    meta_file: &str,
    sources: Option<&Index>,
) -> Vec<PendingChange> {
    let Some(src) = sources else {
        return Vec::new();
    };
    let mut out = Vec::new();

    for (child_url, entry) in src.iter() {
        if url::parent(child_url) == Some(dir_url) && child_url != dir_url {
            let path = dir.join(url::file_name(child_url));
            if !path.exists() {
                debug!("watch"; "dir-scan found missing: {}", child_url);
                out.push(
                    PendingChange::new(path, child_url, ChangeOp::Remove)
                        .with_existing(Some(entry.eid)),
                );
            }
        }
    }

    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let child_url = if dir_url == "/" {
                format!("/{name}")
            } else {
                format!("{dir_url}/{name}")
            };
            if name == meta_file || is_ignored_url(&child_url) || src.contains(&child_url) {
                continue;
            }
            debug!("watch"; "dir-scan found untracked: {}", child_url);
            out.push(PendingChange::new(
                normalize_path(&entry.path()),
                child_url,
                ChangeOp::Add,
            ));
        }
    }
    out
}
