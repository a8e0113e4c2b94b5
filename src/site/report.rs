use std::time::Duration;

use serde::Serialize;

use crate::pipeline::{Level, Report};
use crate::store::EntityId;

/// A published entity touched by a build.
///
/// Serialized as a `[dst, src, eid]` triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "(String, String, EntityId)")]
pub struct UpdatedUrl {
    pub dst: String,
    pub src: String,
    pub eid: EntityId,
}

impl From<UpdatedUrl> for (String, String, EntityId) {
    fn from(updated: UpdatedUrl) -> Self {
        (updated.dst, updated.src, updated.eid)
    }
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub updates: Vec<UpdatedUrl>,
    pub reports: Vec<Report>,
    pub elapsed: Duration,
}

impl BuildReport {
    pub fn new(updates: Vec<UpdatedUrl>, reports: Vec<Report>, elapsed: Duration) -> Self {
        Self {
            updates,
            reports,
            elapsed,
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &Report> {
        self.at(Level::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Report> {
        self.at(Level::Warn)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// One line per error, for the status block.
    pub fn error_summary(&self) -> String {
        summary(self.errors())
    }

    /// One line per warning.
    pub fn warning_summary(&self) -> String {
        summary(self.warnings())
    }

    fn at(&self, level: Level) -> impl Iterator<Item = &Report> {
        self.reports.iter().filter(move |r| r.level == level)
    }
}

fn summary<'a>(reports: impl Iterator<Item = &'a Report>) -> String {
    reports
        .map(|r| format!("[{}] {}", r.pass, r.message))
        .collect::<Vec<_>>()
        .join("\n")
}
