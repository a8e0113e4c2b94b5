//! Live channel message protocol.
//!
//! JSON objects tagged by `type`:
//!
//! ```text
//! {"type":"connected","version":"0.1.0"}
//! {"type":"update","updates":[["/a.html","/a.md",3]]}
//! {"type":"ping","ts":1700000000000}
//! {"type":"error","message":"processor `render` failed: …"}
//! ```

use serde::Serialize;

use crate::site::UpdatedUrl;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LiveEvent {
    /// Sent once to every new client.
    Connected { version: String },
    /// Published entities changed by the last build.
    Update { updates: Vec<UpdatedUrl> },
    /// Keep-alive, milliseconds since the unix epoch.
    Ping { ts: u64 },
    /// The last build failed.
    Error { message: String },
}

impl LiveEvent {
    pub fn connected() -> Self {
        Self::Connected {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn ping() -> Self {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self::Ping { ts }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Update { .. } => "update",
            Self::Ping { .. } => "ping",
            Self::Error { .. } => "error",
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
