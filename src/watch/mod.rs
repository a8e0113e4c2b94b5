//! Incremental loop.
//!
//! ```text
//! notify ─▶ Debouncer ─▶ classify (src index) ─▶ batch ─▶ builder task ─▶ Emitter
//!           300 ms settle                                 one build at a time
//!           800 ms cooldown
//! ```
//!
//! The watcher starts before the initial build so no event is lost; events
//! arriving meanwhile are buffered in the notify channel.

mod change;
mod classify;
mod debouncer;

#[cfg(test)]
mod tests;

pub use change::{ChangeKind, ChangeOp, PendingChange};

use std::sync::Arc;

use anyhow::Result;
use notify::{RecommendedWatcher, RecursiveMode, Watcher as _};
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::config::SiteConfig;
use crate::core;
use crate::index::IndexSet;
use crate::live::Emitter;
use crate::logger::{status_error, status_success, status_unchanged, status_warning};
use crate::site::{BuildReport, Site};
use crate::{debug, log};
use debouncer::Debouncer;

/// Changes applied together by one incremental build.
pub type Batch = Vec<PendingChange>;

pub struct Watcher {
    /// Sync notify callback → async loop bridge.
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Must stay alive for events to flow.
    watcher: RecommendedWatcher,
    debouncer: Debouncer,
    config: Arc<SiteConfig>,
    indices: Arc<RwLock<IndexSet>>,
    tx: mpsc::Sender<Batch>,
}

impl Watcher {
    /// Start watching the content directory immediately.
    pub fn new(
        config: Arc<SiteConfig>,
        indices: Arc<RwLock<IndexSet>>,
        tx: mpsc::Sender<Batch>,
    ) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;
        watcher.watch(config.content_dir(), RecursiveMode::Recursive)?;
        debug!("watch"; "watching {}", config.content_dir().display());

        Ok(Self {
            notify_rx,
            watcher,
            debouncer: Debouncer::new(),
            config,
            indices,
            tx,
        })
    }

    /// Run until shutdown or until the builder goes away.
    pub async fn run(self) {
        let Self {
            notify_rx,
            watcher: _watcher,
            mut debouncer,
            config,
            indices,
            tx,
        } = self;

        let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(64);
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => log!("watch"; "notify error: {}", e),
                }
            }
        });

        loop {
            tokio::select! {
                biased;
                Some(event) = async_rx.recv() => debouncer.add_event(&event),
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    if core::is_shutdown() {
                        break;
                    }
                    if release(&mut debouncer, &config, &indices, &tx).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

/// Classify a ready batch and hand it to the builder.
///
/// Returns `Err(())` once the builder has shut down.
async fn release(
    debouncer: &mut Debouncer,
    config: &SiteConfig,
    indices: &RwLock<IndexSet>,
    tx: &mpsc::Sender<Batch>,
) -> Result<(), ()> {
    let Some(raw) = debouncer.take_if_ready() else {
        return Ok(());
    };
    let batch: Batch = {
        let indices = indices.read();
        classify::classify(raw, config, indices.sources())
    }
    .into_iter()
    .filter(|change| change.op != ChangeOp::None)
    .collect();

    if batch.is_empty() {
        return Ok(());
    }
    for change in &batch {
        debug!("watch"; "{:?} {}", change.op, change.url);
    }
    tx.send(batch).await.map_err(|_| ())
}

/// Apply batches one at a time and publish the results.
///
/// After a failed build the next batch triggers a full build instead.
pub async fn run_builder(mut site: Site, mut rx: mpsc::Receiver<Batch>, emitter: Emitter) {
    while let Some(batch) = rx.recv().await {
        if core::is_shutdown() {
            break;
        }
        core::begin_update();
        let result = if core::is_healthy() {
            site.rebuild(batch).await
        } else {
            debug!("watch"; "last build failed, rebuilding everything");
            site.build().await
        };
        core::end_update();
        publish(result, &emitter);
    }
}

/// Update the status block and notify live clients.
pub fn publish(result: Result<BuildReport>, emitter: &Emitter) {
    match result {
        Ok(report) => {
            core::set_healthy(true);
            let errors = report.errors().count();
            if errors > 0 {
                status_error(
                    &format!("{errors} entities failed"),
                    &report.error_summary(),
                );
            } else {
                let urls: Vec<&str> = report.updates.iter().map(|u| u.dst.as_str()).collect();
                let summary = if urls.is_empty() {
                    "no output changes".to_string()
                } else {
                    format!("rebuilt {} ({:.0?})", urls.join(", "), report.elapsed)
                };
                let warnings = report.warnings().count();
                if warnings > 0 {
                    status_warning(&format!(
                        "{summary}, {warnings} warnings\n{}",
                        report.warning_summary()
                    ));
                } else if urls.is_empty() {
                    status_unchanged(&summary);
                } else {
                    status_success(&summary);
                }
            }
            emitter.update(report.updates);
        }
        Err(err) => {
            core::set_healthy(false);
            status_error("build failed", &format!("{err:#}"));
            emitter.error(format!("{err:#}"));
        }
    }
}
