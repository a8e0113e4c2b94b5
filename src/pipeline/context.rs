//! Per-run build context shared by every processor.

use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::Reporter;
use crate::config::SiteConfig;
use crate::index::{IndexSet, Unresolved};
use crate::transform::TransformerSet;
use crate::watch::PendingChange;

/// Everything a processor may read besides the store.
///
/// Locks in here are never held across an `.await`.
#[derive(Debug)]
pub struct BuildContext {
    pub config: Arc<SiteConfig>,
    /// Restrict passes to entities reported as updated.
    pub only_updated: bool,
    /// Whether `write` and `copy` touch the output directory.
    pub write_output: bool,
    /// Watcher changes to apply instead of walking the whole tree.
    pub changes: Vec<PendingChange>,
    pub reporter: Reporter,
    pub indices: Arc<RwLock<IndexSet>>,
    pub transformers: Arc<TransformerSet>,
    /// Referrers with references to sources that do not exist yet.
    pub unresolved: Arc<Mutex<Unresolved>>,
    /// Destination URLs whose files must be deleted by `write`.
    removed_outputs: Mutex<Vec<String>>,
}

impl BuildContext {
    /// Context for a full build.
    pub fn new(config: Arc<SiteConfig>) -> Self {
        Self {
            config,
            only_updated: false,
            write_output: true,
            changes: Vec::new(),
            reporter: Reporter::new(),
            indices: Arc::new(RwLock::new(IndexSet::new())),
            transformers: Arc::new(TransformerSet::default()),
            unresolved: Arc::new(Mutex::new(Unresolved::new())),
            removed_outputs: Mutex::new(Vec::new()),
        }
    }

    /// Apply `changes` incrementally.
    pub fn with_changes(mut self, changes: Vec<PendingChange>) -> Self {
        self.only_updated = true;
        self.changes = changes;
        self
    }

    pub fn with_indices(mut self, indices: Arc<RwLock<IndexSet>>) -> Self {
        self.indices = indices;
        self
    }

    pub fn with_transformers(mut self, transformers: Arc<TransformerSet>) -> Self {
        self.transformers = transformers;
        self
    }

    pub fn with_unresolved(mut self, unresolved: Arc<Mutex<Unresolved>>) -> Self {
        self.unresolved = unresolved;
        self
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn without_output(mut self) -> Self {
        self.write_output = false;
        self
    }

    pub fn content_dir(&self) -> &Path {
        self.config.content_dir()
    }

    pub fn output_dir(&self) -> &Path {
        self.config.output_dir()
    }

    /// Name of the per-directory metadata file.
    pub fn meta_file(&self) -> &str {
        &self.config.build.meta_file
    }

    pub fn record_removed_output(&self, url: impl Into<String>) {
        self.removed_outputs.lock().push(url.into());
    }

    pub fn take_removed_outputs(&self) -> Vec<String> {
        std::mem::take(&mut *self.removed_outputs.lock())
    }
}
