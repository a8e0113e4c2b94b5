//! `kiln serve`: full build, then serve the output and rebuild on changes.
//!
//! ```text
//! main thread     tiny_http request loop (blocking)
//! tokio runtime   watcher → builder → Emitter → WebSocket forwarder
//!                 heartbeat
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use super::build::{build_site, summarize};
use crate::config::SiteConfig;
use crate::live::{self, Emitter};
use crate::site::Site;
use crate::watch::{self, Watcher};
use crate::{core, log, serve};

/// Batches queued while a build runs.
const BATCH_QUEUE: usize = 16;

/// Grace period for background tasks after the server stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub fn run(config: Arc<SiteConfig>) -> Result<()> {
    let runtime = super::runtime()?;
    let bound = serve::bind(config.serve.interface, config.serve.port)?;
    let shutdown = bound.shutdown_signal();

    let ws_port = runtime.block_on(async {
        let mut site = Site::new(Arc::clone(&config))?;
        let (tx, rx) = mpsc::channel(BATCH_QUEUE);

        // Watch before the initial build so no edit is missed.
        let watcher = if config.serve.watch {
            let watcher = Watcher::new(Arc::clone(&config), site.indices(), tx)
                .context("Failed to watch the content directory")?;
            Some(watcher)
        } else {
            None
        };

        core::begin_update();
        let initial = build_site(&mut site, false).await;
        core::end_update();
        match &initial {
            Ok(report) => {
                summarize(report);
                core::set_healthy(true);
            }
            Err(err) => {
                log!("error"; "initial build failed: {err:#}");
                core::set_healthy(false);
            }
        }

        let Some(watcher) = watcher else {
            return Ok::<_, anyhow::Error>(None);
        };

        let emitter = Emitter::new();
        let ws_port = live::ws::start(config.serve.interface, config.serve.ws_port, &emitter)?;
        log!("live"; "ws://{}:{}", config.serve.interface, ws_port);
        emitter.spawn_heartbeat(Duration::from_secs(config.serve.heartbeat_secs));

        tokio::spawn(watch::run_builder(site, rx, emitter));
        tokio::spawn(async move {
            tokio::select! {
                () = watcher.run() => {}
                _ = tokio::task::spawn_blocking(move || shutdown.recv()) => {}
            }
        });
        Ok(Some(ws_port))
    })?;

    bound.run(config.output_dir().to_path_buf(), ws_port);
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    Ok(())
}
