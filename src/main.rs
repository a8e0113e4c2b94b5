//! kiln - An incremental content build pipeline over an entity-component store.

#![allow(dead_code)]

mod cli;
mod config;
mod core;
mod graph;
mod index;
mod live;
mod logger;
mod pipeline;
mod processors;
mod serve;
mod site;
mod store;
mod transform;
mod utils;
mod watch;

use std::sync::Arc;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::SiteConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = Arc::new(SiteConfig::load(&cli)?);

    match &cli.command {
        Commands::Build { .. } => cli::build::run(config),
        Commands::Serve { .. } => cli::serve::run(config),
        Commands::Inspect { args } => cli::inspect::run(args, config),
    }
}
