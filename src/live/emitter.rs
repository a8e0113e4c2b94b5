//! Publish/subscribe hub between the builder and the transports.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::LiveEvent;
use crate::debug;
use crate::site::UpdatedUrl;

/// Buffered events per subscriber before the slowest one starts lagging.
const CAPACITY: usize = 64;

/// Cheap to clone; every clone publishes into the same channel.
#[derive(Debug, Clone)]
pub struct Emitter {
    tx: broadcast::Sender<LiveEvent>,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Emitter {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.tx.subscribe()
    }

    /// Publish to every current subscriber. Returns how many received it.
    pub fn emit(&self, event: LiveEvent) -> usize {
        let name = event.name();
        let receivers = self.tx.send(event).unwrap_or(0);
        debug!("live"; "{} → {} subscribers", name, receivers);
        receivers
    }

    /// Publish an `update`, unless nothing changed.
    pub fn update(&self, updates: Vec<UpdatedUrl>) -> usize {
        if updates.is_empty() {
            return 0;
        }
        self.emit(LiveEvent::Update { updates })
    }

    pub fn error(&self, message: impl Into<String>) -> usize {
        self.emit(LiveEvent::Error {
            message: message.into(),
        })
    }

    /// Emit `ping` every `every` until the task is aborted.
    pub fn spawn_heartbeat(&self, every: Duration) -> JoinHandle<()> {
        let emitter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                emitter.emit(LiveEvent::ping());
            }
        })
    }
}
