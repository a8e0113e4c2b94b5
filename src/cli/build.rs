//! `kiln build`: one full pipeline run over the content tree.

use std::sync::Arc;

use anyhow::Result;

use crate::config::SiteConfig;
use crate::log;
use crate::logger::ProgressLine;
use crate::site::{BuildReport, Site};

/// Full build of `site`, reporting per-pass progress unless `quiet`.
pub async fn build_site(site: &mut Site, quiet: bool) -> Result<BuildReport> {
    if quiet {
        return site.build().await;
    }
    let progress = ProgressLine::new(&[("passes", site.pipeline().len())]);
    let report = site.build_observed(|_| progress.inc("passes")).await?;
    progress.finish();
    Ok(report)
}

pub fn run(config: Arc<SiteConfig>) -> Result<()> {
    let runtime = super::runtime()?;
    let mut site = Site::new(config)?;
    let report = runtime.block_on(build_site(&mut site, false))?;
    summarize(&report);
    Ok(())
}

/// Log the outcome of a full build.
pub fn summarize(report: &BuildReport) {
    let warnings = report.warnings().count();
    let errors = report.errors().count();
    log!(
        "build";
        "{} outputs in {:.1?}, {} warnings, {} errors",
        report.updates.len(),
        report.elapsed,
        warnings,
        errors
    );
    if report.has_errors() {
        for line in report.error_summary().lines() {
            eprintln!("- {line}");
        }
    }
}

