//! Script modules: relative and root-relative import specifiers.
//!
//! Bare specifiers (`import x from "lit"`) name packages, not site files,
//! and are left alone.

use std::sync::LazyLock;

use regex::Regex;

use super::{
    ContentTransformer, Discovered, Located, TransformError, TransformInput, TransformOutput,
    discovered, rewrite,
};
use crate::graph::DepKind;

static SPECIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)(?:\bimport\s*(?:[\w*${}\s,]+?\s*from\s*)?|\bexport\s*[\w*${}\s,]+?\s*from\s*|\bimport\s*\(\s*)(?:"([^"\n]+)"|'([^'\n]+)')"#,
    )
    .unwrap()
});

pub(crate) fn locate(text: &str) -> Vec<Located> {
    SPECIFIER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .filter(|m| m.as_str().starts_with('.') || m.as_str().starts_with('/'))
        .map(|m| Located {
            range: m.range(),
            kind: DepKind::Import,
        })
        .collect()
}

pub struct Script;

impl ContentTransformer for Script {
    fn name(&self) -> &'static str {
        "script"
    }

    fn output_mime(&self) -> &'static str {
        "text/javascript"
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_relative_specifiers() {
        let js = r#"
import "./polyfill.js";
import { a, b } from './lib/util.js';
import * as ns from "/shared/ns.js";
export { c } from "../c.js";
const lazy = await import("./lazy.js");
import lit from "lit";
"#;
        let literals: Vec<_> = Script.discover(js).into_iter().map(|d| d.literal).collect();
        assert_eq!(
            literals,
            vec!["./polyfill.js", "./lib/util.js", "/shared/ns.js", "../c.js", "./lazy.js"]
        );
    }
}
