//! Stylesheets: `@import` and `url()` references.

use std::sync::LazyLock;

use regex::Regex;

use super::{
    ContentTransformer, Discovered, Located, TransformError, TransformInput, TransformOutput,
    discovered, rewrite,
};
use crate::graph::DepKind;

static IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@import\s+(?:url\(\s*)?(?:"([^"]+)"|'([^']+)'|([^"'\s);]+))"#).unwrap()
});

static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"]+)"|'([^']+)'|([^"'\s)]+))\s*\)"#).unwrap()
});

static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

fn literal_range(caps: &regex::Captures<'_>) -> Option<std::ops::Range<usize>> {
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.range())
}

/// `@import` targets first claim their range; `url()` outside them is a
/// plain link.
pub(crate) fn locate(text: &str) -> Vec<Located> {
    let comments: Vec<_> = COMMENT.find_iter(text).map(|m| m.range()).collect();
    let in_comment = |pos: usize| comments.iter().any(|c| c.contains(&pos));

    let mut out: Vec<Located> = IMPORT
        .captures_iter(text)
        .filter_map(|caps| literal_range(&caps))
        .filter(|range| !in_comment(range.start))
        .map(|range| Located {
            range,
            kind: DepKind::Import,
        })
        .collect();

    for caps in URL.captures_iter(text) {
        let Some(range) = literal_range(&caps) else {
            continue;
        };
        if in_comment(range.start) || out.iter().any(|loc| loc.range == range) {
            continue;
        }
        out.push(Located {
            range,
            kind: DepKind::Link,
        });
    }

    out.sort_by_key(|loc| loc.range.start);
    out
}

pub struct Css;

impl ContentTransformer for Css {
    fn name(&self) -> &'static str {
        "css"
    }

    fn output_mime(&self) -> &'static str {
        "text/css"
    }

    fn discover(&self, text: &str) -> Vec<Discovered> {
        discovered(text, &locate(text))
    }

    fn transform(&self, input: TransformInput<'_>) -> Result<TransformOutput, TransformError> {
        let located = locate(input.source_text);
        Ok(TransformOutput {
            output_text: rewrite(input.source_text, &located, input.imports),
            exported_meta: crate::store::JsonMap::new(),
            dependencies: discovered(input.source_text, &located),
        })
    }
}
