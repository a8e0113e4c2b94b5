//! Build reports.
//!
//! Passes report through the [`Reporter`] carried by the build context, never
//! straight to the terminal. The reporter keeps every record for the build
//! summary and `inspect`, and echoes it to the logger.

use parking_lot::Mutex;
use serde::Serialize;

use crate::store::EntityId;
use crate::{debug, log};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub level: Level,
    pub pass: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityId>,
    pub message: String,
}

#[derive(Debug)]
pub struct Reporter {
    reports: Mutex<Vec<Report>>,
    echo: bool,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter {
    /// Reporter that echoes to the logger.
    pub fn new() -> Self {
        Self {
            reports: Mutex::new(Vec::new()),
            echo: true,
        }
    }

    /// Reporter that only records.
    pub fn silent() -> Self {
        Self {
            reports: Mutex::new(Vec::new()),
            echo: false,
        }
    }

    pub fn info(&self, pass: &str, entity: Option<EntityId>, message: impl Into<String>) {
        self.record(Level::Info, pass, entity, message.into());
    }

    pub fn warn(&self, pass: &str, entity: Option<EntityId>, message: impl Into<String>) {
        self.record(Level::Warn, pass, entity, message.into());
    }

    pub fn error(&self, pass: &str, entity: Option<EntityId>, message: impl Into<String>) {
        self.record(Level::Error, pass, entity, message.into());
    }

    fn record(&self, level: Level, pass: &str, entity: Option<EntityId>, message: String) {
        if self.echo {
            match level {
                Level::Info => debug!(pass; "{}", message),
                Level::Warn => log!(pass; "warning: {}", message),
                Level::Error => log!("error"; "{}: {}", pass, message),
            }
        }
        self.reports.lock().push(Report {
            level,
            pass: pass.to_string(),
            entity,
            message,
        });
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().clone()
    }

    pub fn count(&self, level: Level) -> usize {
        self.reports.lock().iter().filter(|r| r.level == level).count()
    }

    /// Reports at `level`.
    pub fn at(&self, level: Level) -> Vec<Report> {
        self.reports
            .lock()
            .iter()
            .filter(|r| r.level == level)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let reporter = Reporter::silent();
        reporter.info("scan", None, "walked 3 entries");
        reporter.warn("references", Some(4), "unresolved `x.md`");
        reporter.error("render", Some(4), "boom");

        let reports = reporter.reports();
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[1].entity, Some(4));
        assert_eq!(reporter.count(Level::Warn), 1);
        assert_eq!(reporter.at(Level::Error)[0].pass, "render");
    }
}
