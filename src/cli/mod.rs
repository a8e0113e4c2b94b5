//! Command-line interface module.

mod args;
pub mod build;
pub mod inspect;
pub mod serve;

pub use args::{BuildArgs, Cli, Commands, InspectArgs};

use anyhow::{Context, Result};

/// Multi-threaded runtime driving the pipeline.
fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")
}
