//! Built-in processors addressable by name.

use super::{ProcessorEntry, ProcessorFn};
use crate::processors as p;

/// Priority of the bookkeeping processors that open every run.
pub const BOOKKEEPING_PRIORITY: i32 = 1000;

/// Injected in front of any pipeline that does not declare them.
pub const BOOKKEEPING: [&str; 2] = ["clear-updates", "clear-errors"];

/// The default pipeline, in declaration order.
pub const DEFAULT_PIPELINE: &[(&str, ProcessorFn, i32)] = &[
    ("clear-updates", p::bookkeeping::clear_updates, BOOKKEEPING_PRIORITY),
    ("clear-errors", p::bookkeeping::clear_errors, BOOKKEEPING_PRIORITY),
    ("scan", p::scan::run, 0),
    ("prune-edges", p::prune::run, 0),
    ("read", p::read::run, 0),
    ("meta", p::meta::run, 0),
    ("dir-deps", p::dirs::run, 0),
    ("source-index", p::indices::source, 0),
    ("propagate", p::propagate::run, 0),
    ("destination", p::destination::run, 0),
    ("destination-index", p::indices::destination, 0),
    ("tags", p::tags::run, 0),
    ("layout", p::layout::run, 0),
    ("references", p::references::run, 0),
    ("title", p::title::run, 0),
    ("render", p::render::run, 0),
    ("write", p::write::run, -100),
    ("copy", p::copy::run, -200),
];

pub fn lookup(name: &str) -> Option<ProcessorFn> {
    DEFAULT_PIPELINE
        .iter()
        .find(|(n, _, _)| *n == name)
        .map(|(_, func, _)| *func)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    DEFAULT_PIPELINE.iter().map(|(name, _, _)| *name)
}

pub fn default_entries() -> Vec<ProcessorEntry> {
    DEFAULT_PIPELINE
        .iter()
        .map(|(name, _, priority)| ProcessorEntry::named(*name, *priority))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_unique() {
        let mut all: Vec<_> = names().collect();
        let len = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), len);
    }

    #[test]
    fn test_lookup() {
        assert!(lookup("render").is_some());
        assert!(lookup("typeset").is_none());
    }
}
