use std::path::PathBuf;

use serde::Serialize;

use crate::store::EntityId;

/// What the watcher saw happen to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    /// Kind of a notify event. Metadata-only modifications (atime, chmod)
    /// are skipped.
    pub fn from_event(kind: &notify::EventKind) -> Option<Self> {
        use notify::EventKind;
        use notify::event::ModifyKind;
        match kind {
            EventKind::Create(_) => Some(Self::Created),
            EventKind::Remove(_) => Some(Self::Removed),
            EventKind::Modify(ModifyKind::Metadata(_)) => None,
            EventKind::Modify(_) => Some(Self::Modified),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// What the `scan` pass does with a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    /// Create the source entity (and any missing ancestors).
    Add,
    /// Refresh the source entity and mark it updated.
    Update,
    /// Remove the entity and everything below it.
    Remove,
    /// Nothing to do.
    None,
}

/// A classified filesystem change waiting for the next build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    pub path: PathBuf,
    /// Source URL the path maps to.
    pub url: String,
    pub op: ChangeOp,
    /// Entity currently registered under `url`.
    pub existing: Option<EntityId>,
}

impl PendingChange {
    pub fn new(path: impl Into<PathBuf>, url: impl Into<String>, op: ChangeOp) -> Self {
        Self {
            path: path.into(),
            url: url.into(),
            op,
            existing: None,
        }
    }

    pub fn with_existing(mut self, existing: Option<EntityId>) -> Self {
        self.existing = existing;
        self
    }
}
