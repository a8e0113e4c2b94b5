//! Coalesces raw notify events per path and decides when a batch may go out.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use super::ChangeKind;
use crate::debug;
use crate::utils::path::{is_ignored_name, normalize_path};

/// Quiet time after the last event before a batch goes out.
pub(super) const SETTLE: Duration = Duration::from_millis(300);
/// Minimum time between two batches.
pub(super) const COOLDOWN: Duration = Duration::from_millis(800);
/// Sleep while nothing is pending.
const IDLE: Duration = Duration::from_secs(86400);

/// Fold a later event for a path into the pending one.
///
/// `None` drops the path: it was created and removed within one window.
pub(super) fn merge(pending: ChangeKind, later: ChangeKind) -> Option<ChangeKind> {
    use ChangeKind::{Created, Modified, Removed};
    match (pending, later) {
        (Created, Removed) => None,
        (Modified, Removed) | (Removed, Created | Modified) => Some(later),
        _ => Some(pending),
    }
}

#[derive(Debug, Default)]
pub(super) struct Debouncer {
    pub(super) pending: FxHashMap<PathBuf, ChangeKind>,
    pub(super) last_event: Option<Instant>,
    pub(super) last_release: Option<Instant>,
}

impl Debouncer {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn add_event(&mut self, event: &notify::Event) {
        let Some(kind) = ChangeKind::from_event(&event.kind) else {
            return;
        };
        for path in &event.paths {
            if path
                .file_name()
                .is_some_and(|name| is_ignored_name(&name.to_string_lossy()))
            {
                continue;
            }
            let path = normalize_path(path);
            debug!("watch"; "{} {}", kind.label(), path.display());

            match self.pending.get(&path).copied().map(|pending| merge(pending, kind)) {
                None => {
                    self.pending.insert(path, kind);
                }
                Some(Some(merged)) => {
                    self.pending.insert(path, merged);
                }
                Some(None) => {
                    self.pending.remove(&path);
                }
            }
            self.last_event = Some(Instant::now());
        }
    }

    /// Earliest release time of the pending batch, if there is one.
    fn ready_at(&self) -> Option<Instant> {
        if self.pending.is_empty() {
            return None;
        }
        let settled = self.last_event? + SETTLE;
        Some(match self.last_release {
            Some(released) => settled.max(released + COOLDOWN),
            None => settled,
        })
    }

    pub(super) fn is_ready(&self) -> bool {
        self.ready_at().is_some_and(|at| at <= Instant::now())
    }

    pub(super) fn take_if_ready(&mut self) -> Option<FxHashMap<PathBuf, ChangeKind>> {
        if !self.is_ready() {
            return None;
        }
        self.last_event = None;
        self.last_release = Some(Instant::now());
        Some(std::mem::take(&mut self.pending))
    }

    /// Time until the pending batch could be released.
    pub(super) fn sleep_duration(&self) -> Duration {
        self.ready_at().map_or(IDLE, |at| {
            at.saturating_duration_since(Instant::now())
                .max(Duration::from_millis(1))
        })
    }
}
