//! Configuration sections.
//!
//! ```toml
//! [build]
//! content = "content"         # Source tree (relative to the project root)
//! output = "public"           # Destination tree
//! clean = false               # Wipe output before a full build
//! meta_file = "_meta.toml"    # Per-directory metadata file name
//!
//! [serve]
//! interface = "127.0.0.1"     # Network interface (127.0.0.1 = localhost only)
//! port = 5277                 # HTTP port number
//! ws_port = 35729             # Live update WebSocket port
//! watch = true                # Rebuild on file changes
//! heartbeat_secs = 10         # Live channel keep-alive interval
//!
//! [pipeline.options.destination]
//! pretty_urls = true
//! ```

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::pipeline::ProcessorSpec;
use crate::store::JsonMap;

/// `[build]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub content: PathBuf,
    pub output: PathBuf,
    pub clean: bool,
    pub meta_file: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            content: PathBuf::from("content"),
            output: PathBuf::from("public"),
            clean: false,
            meta_file: "_meta.toml".into(),
        }
    }
}

/// `[serve]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    pub interface: IpAddr,
    pub port: u16,
    pub ws_port: u16,
    pub watch: bool,
    pub heartbeat_secs: u64,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 5277,
            ws_port: 35729,
            watch: true,
            heartbeat_secs: 10,
        }
    }
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Replaces the default processor list when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processors: Option<Vec<ProcessorSpec>>,
    /// Options per processor name, merged over the defaults.
    pub options: BTreeMap<String, JsonMap>,
}
