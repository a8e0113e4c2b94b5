//! References that resolved to nothing, kept until their target appears.
//!
//! Targets are compared by stem so every spelling of a page matches the
//! source that later provides it: `new.md`, `new.html`, `new` and `new/`
//! all wait on `/new`.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::store::EntityId;
use crate::utils::url;

#[derive(Debug, Default)]
pub struct Unresolved {
    by_referrer: FxHashMap<EntityId, FxHashSet<String>>,
}

impl Unresolved {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything `referrer` waits on.
    pub fn set(&mut self, referrer: EntityId, targets: impl IntoIterator<Item = String>) {
        let stems: FxHashSet<String> = targets.into_iter().map(|t| stem(&t)).collect();
        if stems.is_empty() {
            self.by_referrer.remove(&referrer);
        } else {
            self.by_referrer.insert(referrer, stems);
        }
    }

    pub fn forget(&mut self, referrer: EntityId) {
        self.by_referrer.remove(&referrer);
    }

    /// Referrers waiting on the source that now lives at `source_url`.
    pub fn waiting_on(&self, source_url: &str) -> Vec<EntityId> {
        let key = stem(source_url);
        let mut ids: Vec<EntityId> = self
            .by_referrer
            .iter()
            .filter(|(_, stems)| stems.contains(&key))
            .map(|(eid, _)| *eid)
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// `/a/b.md`, `/a/b.html`, `/a/b/`, `/a/b/index.md` → `/a/b`.
fn stem(target: &str) -> String {
    let trimmed = target.trim_end_matches('/');
    let bare = url::strip_extension(trimmed);
    let bare = bare.strip_suffix("/index").unwrap_or(bare);
    if bare.is_empty() {
        "/".to_string()
    } else {
        bare.to_string()
    }
}
