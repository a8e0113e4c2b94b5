//! Build driver.
//!
//! A [`Site`] owns the store, the resolved pipeline and the indices shared
//! with the watcher, and turns each build request into one pipeline run:
//!
//! ```text
//! build()            full scan, every entity processed
//! rebuild(changes)   watcher changes, only updated entities processed
//! preview(eid)       render one entity into a capturing store
//! ```

mod report;


pub use report::{BuildReport, UpdatedUrl};

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};

use crate::config::SiteConfig;
use crate::graph::is_edge_id;
use crate::index::{IndexSet, Unresolved, get_by_eid};
use crate::pipeline::{self, BuildContext, Pipeline, Reporter};
use crate::processors::render::render_entity;
use crate::store::{CapturingStore, Component, ComponentDef, EntityId, EntityStore, Store};
use crate::transform::{TransformError, TransformerSet};
use crate::watch::PendingChange;
use crate::{debug, log};

pub struct Site {
    config: Arc<SiteConfig>,
    store: EntityStore,
    pipeline: Pipeline,
    indices: Arc<RwLock<IndexSet>>,
    transformers: Arc<TransformerSet>,
    unresolved: Arc<Mutex<Unresolved>>,
    write_output: bool,
    echo: bool,
}

impl Site {
    pub fn new(config: Arc<SiteConfig>) -> Result<Self> {
        let pipeline = pipeline::from_config(&config.pipeline)?;
        debug!("pipeline"; "{}", pipeline.names().join(" → "));
        Ok(Self {
            config,
            store: EntityStore::new(),
            pipeline,
            indices: Arc::new(RwLock::new(IndexSet::new())),
            transformers: Arc::new(TransformerSet::default()),
            unresolved: Arc::new(Mutex::new(Unresolved::new())),
            write_output: true,
            echo: true,
        })
    }

    /// Build in memory only.
    pub fn without_output(mut self) -> Self {
        self.write_output = false;
        self
    }

    /// Record reports without echoing them to the terminal.
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    pub fn config(&self) -> &Arc<SiteConfig> {
        &self.config
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Indices shared with the watcher's change classifier.
    pub fn indices(&self) -> Arc<RwLock<IndexSet>> {
        Arc::clone(&self.indices)
    }

    /// Full build over the whole content tree.
    pub async fn build(&mut self) -> Result<BuildReport> {
        self.build_observed(|_| {}).await
    }

    /// Full build, calling `on_stage` after every pass.
    pub async fn build_observed<F>(&mut self, on_stage: F) -> Result<BuildReport>
    where
        F: FnMut(&str) + Send,
    {
        if self.config.build.clean && self.write_output {
            self.clean_output().await?;
        }
        let ctx = self.context(None);
        self.run(ctx, on_stage).await
    }

    /// Apply watcher changes, processing only what they affect.
    pub async fn rebuild(&mut self, changes: Vec<PendingChange>) -> Result<BuildReport> {
        let ctx = self.context(Some(changes));
        self.run(ctx, |_| {}).await
    }

    /// Render one entity without touching its stored output.
    ///
    /// Returns the `rendered-output`, `metadata` and `error` components the
    /// render would have written.
    pub fn preview(&mut self, eid: EntityId) -> Result<Vec<Component>, TransformError> {
        let ctx = self.context(None).without_output();
        let mut proxy = CapturingStore::new(
            &mut self.store,
            [ComponentDef::Output, ComponentDef::Metadata, ComponentDef::Error],
        );
        render_entity(&mut proxy, &ctx, eid)?;
        Ok(proxy.into_captured())
    }

    fn context(&self, changes: Option<Vec<PendingChange>>) -> BuildContext {
        let reporter = if self.echo {
            Reporter::new()
        } else {
            Reporter::silent()
        };
        let mut ctx = BuildContext::new(Arc::clone(&self.config))
            .with_indices(Arc::clone(&self.indices))
            .with_transformers(Arc::clone(&self.transformers))
            .with_unresolved(Arc::clone(&self.unresolved))
            .with_reporter(reporter);
        if let Some(changes) = changes {
            ctx = ctx.with_changes(changes);
        }
        if !self.write_output {
            ctx = ctx.without_output();
        }
        ctx
    }

    async fn run<F>(&mut self, ctx: BuildContext, on_stage: F) -> Result<BuildReport>
    where
        F: FnMut(&str) + Send,
    {
        let started = Instant::now();
        self.pipeline
            .run_observed(&mut self.store, &ctx, on_stage)
            .await?;

        let updates = self.updated_urls();
        let report = BuildReport::new(updates, ctx.reporter.reports(), started.elapsed());
        debug!(
            "build";
            "{} entities, {} updated outputs in {:.1?}",
            self.store.len(),
            report.updates.len(),
            report.elapsed
        );
        Ok(report)
    }

    /// `(dst, src, eid)` for every updated entity that is published.
    fn updated_urls(&self) -> Vec<UpdatedUrl> {
        let indices = self.indices.read();
        let Some(dst) = indices.destinations() else {
            return Vec::new();
        };
        self.store
            .updated_entity_ids()
            .into_iter()
            .filter(|id| !is_edge_id(*id))
            .filter_map(|eid| {
                let url = get_by_eid(dst, eid)?;
                let src = self.store.get_entity(eid, true)?.source_url()?.to_string();
                Some(UpdatedUrl {
                    dst: url.to_string(),
                    src,
                    eid,
                })
            })
            .collect()
    }

    async fn clean_output(&self) -> Result<()> {
        let output = self.config.output_dir();
        if !output.exists() {
            return Ok(());
        }
        log!("build"; "cleaning {}", output.display());
        tokio::fs::remove_dir_all(output)
            .await
            .with_context(|| format!("Failed to clean output directory {}", output.display()))
    }
}
