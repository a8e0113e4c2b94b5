//! Priority-ordered processor pipeline.
//!
//! A processor is an async pass over the store. The pipeline is declared as
//! `(processor, priority, options)` entries, stable-sorted once by priority
//! (highest first, ties keep declaration order) and then replayed on every
//! build:
//!
//! ```text
//! clear-updates (1000) ─▶ clear-errors (1000) ─▶ scan (0) ─▶ … ─▶ render (0)
//!                                                   ─▶ write (-100) ─▶ copy (-200)
//! ```
//!
//! Processors run strictly one after another. A processor that fails for a
//! single entity records an `error` component and carries on; a processor
//! returning `Err` aborts the remaining passes of that run.

mod context;
pub mod registry;
mod reporter;

pub use context::BuildContext;
pub use reporter::{Level, Report, Reporter};

use std::cmp::Reverse;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::debug;
use crate::graph::merge_meta;
use crate::store::{JsonMap, Store};

/// Options handed to a processor.
pub type Options = JsonMap;

pub type ProcessorFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// Signature of every processor.
pub type ProcessorFn =
    for<'a> fn(&'a mut dyn Store, &'a BuildContext, &'a Options) -> ProcessorFuture<'a>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("unknown processor `{0}`")]
    UnknownProcessor(String),

    #[error("processor `{name}` failed: {source}")]
    Processor {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

/// How an entry names its processor.
#[derive(Clone)]
pub enum ProcessorRef {
    /// Looked up in the [`registry`].
    Named(String),
    /// Given directly.
    Func { name: String, func: ProcessorFn },
}

impl ProcessorRef {
    pub fn name(&self) -> &str {
        match self {
            Self::Named(name) | Self::Func { name, .. } => name,
        }
    }
}

impl fmt::Debug for ProcessorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Func { name, .. } => f.debug_struct("Func").field("name", name).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessorEntry {
    pub processor: ProcessorRef,
    pub priority: i32,
    pub options: Options,
}

impl ProcessorEntry {
    pub fn named(name: impl Into<String>, priority: i32) -> Self {
        Self {
            processor: ProcessorRef::Named(name.into()),
            priority,
            options: Options::new(),
        }
    }

    pub fn func(name: impl Into<String>, func: ProcessorFn, priority: i32) -> Self {
        Self {
            processor: ProcessorRef::Func {
                name: name.into(),
                func,
            },
            priority,
            options: Options::new(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &str {
        self.processor.name()
    }
}

/// Processor entry as written in `kiln.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorSpec {
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub options: Options,
}

impl From<ProcessorSpec> for ProcessorEntry {
    fn from(spec: ProcessorSpec) -> Self {
        Self::named(spec.name, spec.priority).with_options(spec.options)
    }
}

struct Stage {
    name: String,
    func: ProcessorFn,
    priority: i32,
    options: Options,
}

/// A resolved, sorted processor list, replayable against any store.
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.stages.iter().map(|s| (&s.name, s.priority)))
            .finish()
    }
}

/// Resolve and sort `entries`.
///
/// Named entries are looked up in the registry. The two bookkeeping
/// processors are injected at priority 1000 when the list lacks them.
pub fn build_processors(entries: Vec<ProcessorEntry>) -> Result<Pipeline, PipelineError> {
    let mut entries = entries;
    for name in registry::BOOKKEEPING.iter().rev() {
        if !entries.iter().any(|e| e.name() == *name) {
            entries.insert(0, ProcessorEntry::named(*name, registry::BOOKKEEPING_PRIORITY));
        }
    }

    let mut stages = entries
        .into_iter()
        .map(|entry| {
            let (name, func) = match entry.processor {
                ProcessorRef::Named(name) => {
                    let func = registry::lookup(&name)
                        .ok_or_else(|| PipelineError::UnknownProcessor(name.clone()))?;
                    (name, func)
                }
                ProcessorRef::Func { name, func } => (name, func),
            };
            Ok(Stage {
                name,
                func,
                priority: entry.priority,
                options: entry.options,
            })
        })
        .collect::<Result<Vec<_>, PipelineError>>()?;

    // Stable: equal priorities keep declaration order.
    stages.sort_by_key(|stage| Reverse(stage.priority));
    Ok(Pipeline { stages })
}

/// Pipeline for a `[pipeline]` config section: its processor list or the
/// default one, with per-processor options merged over the entry's own.
pub fn from_config(config: &PipelineConfig) -> Result<Pipeline, PipelineError> {
    let entries: Vec<ProcessorEntry> = match &config.processors {
        Some(specs) => specs.iter().cloned().map(ProcessorEntry::from).collect(),
        None => registry::default_entries(),
    };

    let entries = entries
        .into_iter()
        .map(|mut entry| {
            if let Some(overrides) = config.options.get(entry.name()) {
                merge_meta(&mut entry.options, overrides);
            }
            entry
        })
        .collect();
    build_processors(entries)
}

impl Pipeline {
    /// Processor names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub async fn run(&self, store: &mut dyn Store, ctx: &BuildContext) -> Result<(), PipelineError> {
        self.run_observed(store, ctx, |_| {}).await
    }

    /// Run every stage in order, calling `on_stage` after each one.
    pub async fn run_observed<F>(
        &self,
        store: &mut dyn Store,
        ctx: &BuildContext,
        mut on_stage: F,
    ) -> Result<(), PipelineError>
    where
        F: FnMut(&str) + Send,
    {
        for stage in &self.stages {
            let started = Instant::now();
            (stage.func)(&mut *store, ctx, &stage.options)
                .await
                .map_err(|source| PipelineError::Processor {
                    name: stage.name.clone(),
                    source: source.into(),
                })?;
            debug!("pipeline"; "{} finished in {:.1?}", stage.name, started.elapsed());
            on_stage(&stage.name);
        }
        Ok(())
    }
}
