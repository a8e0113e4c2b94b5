//! HTML sources: front matter stripped, `href`/`src` references rewritten.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{
    ContentTransformer, Discovered, Located, TransformError, TransformInput, TransformOutput,
    discovered, frontmatter, rewrite,
};
use crate::graph::DepKind;

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(a|link|script|img|source|iframe|video|audio)\b[^>]*>").unwrap()
});

static ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(href|src|rel)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

static H1: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<h1\b[^>]*>(.*?)</h1>").unwrap());

static MARKUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// Reference-bearing attributes in `text`, in document order.
pub(crate) fn locate(text: &str) -> Vec<Located> {
    let mut out = Vec::new();
    for tag in TAG.captures_iter(text) {
        let (Some(whole), Some(name)) = (tag.get(0), tag.get(1)) else {
            continue;
        };
        let name = name.as_str().to_ascii_lowercase();

        let mut rel = None;
        let mut target = None;
        for attr in ATTR.captures_iter(whole.as_str()) {
            let Some(value) = attr.get(2).or_else(|| attr.get(3)) else {
                continue;
            };
            match attr[1].to_ascii_lowercase().as_str() {
                "rel" => rel = Some(value.as_str().to_ascii_lowercase()),
                _ => target = Some(value.range()),
            }
        }

        let Some(range) = target else {
            continue;
        };
        let kind = match name.as_str() {
            "script" => DepKind::Script,
            "link" if rel.as_deref().is_some_and(|r| r.split_whitespace().any(|r| r == "stylesheet")) => {
                DepKind::Css
            }
            _ => DepKind::Link,
        };
        let offset = whole.start();
        out.push(Located {
            range: range.start + offset..range.end + offset,
            kind,
        });
    }
    out
}

/// Text of the first `<h1>`, tags stripped.
pub(crate) fn first_heading(text: &str) -> Option<String> {
    let inner = H1.captures(text)?.get(1)?.as_str();
    let plain = MARKUP.replace_all(inner, "");
    let plain = plain.trim();
    (!plain.is_empty()).then(|| plain.to_string())
}

pub struct Html;

impl ContentTransformer for Html {
    fn name(&self) -> &'static str {
        "html"
    }

    fn output_mime(&self) -> &'static str {
        "text/html"
    }

    fn discover(&self, text: &str) -> Vec<Discovered> {
        let body = frontmatter::body(text);
        discovered(body, &locate(body))
    }

    fn transform(&self, input: TransformInput<'_>) -> Result<TransformOutput, TransformError> {
        let body = frontmatter::body(input.source_text);
        let located = locate(body);

        let mut exported_meta = crate::store::JsonMap::new();
        if let Some(heading) = first_heading(body) {
            exported_meta.insert("first_heading".into(), Value::String(heading));
        }

        Ok(TransformOutput {
            output_text: rewrite(body, &located, input.imports),
            exported_meta,
            dependencies: discovered(body, &located),
        })
    }

    fn title(&self, text: &str) -> Option<String> {
        first_heading(frontmatter::body(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    #[test]
    fn test_discover_kinds() {
        let html = r#"
            <link rel="stylesheet" href="/style.css">
            <link rel="icon" href='/favicon.ico'>
            <script type="module" src="./app.js"></script>
            <a class="x" href="../about.md#team">About</a>
            <img alt="" src="img/logo.png">
            <div data-href="/ignored"></div>
        "#;
        let found = Html.discover(html);

        assert_eq!(
            found,
            vec![
                Discovered::new(DepKind::Css, "/style.css"),
                Discovered::new(DepKind::Link, "/favicon.ico"),
                Discovered::new(DepKind::Script, "./app.js"),
                Discovered::new(DepKind::Link, "../about.md#team"),
                Discovered::new(DepKind::Link, "img/logo.png"),
            ]
        );
    }

    #[test]
    fn test_transform_strips_front_matter_and_rewrites() {
        let source = "---\nlayout: base\n---\n<h1>Hi <em>there</em></h1><a href=\"b.md\">b</a>";
        let mut imports = FxHashMap::default();
        imports.insert("b.md".to_string(), "/b.html".to_string());
        let meta = crate::store::JsonMap::new();

        let out = Html
            .transform(TransformInput {
                source_text: source,
                path: "/a.html",
                meta: &meta,
                imports: &imports,
            })
            .unwrap();

        assert_eq!(out.output_text, "<h1>Hi <em>there</em></h1><a href=\"/b.html\">b</a>");
        assert_eq!(out.exported_meta.get("first_heading"), Some(&Value::from("Hi there")));
        assert_eq!(out.dependencies.len(), 1);
    }
}
