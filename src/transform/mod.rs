//! Content transformers.
//!
//! A transformer turns the text of one source entity into output text. The
//! pipeline only relies on three things it hands back: the output, metadata
//! to merge into the entity, and the references it found (which become
//! dependency edges). Transformers are picked by the MIME essence of the
//! source.
//!
//! | MIME              | Transformer | Discovers                         |
//! |-------------------|-------------|-----------------------------------|
//! | `text/markdown`   | markdown    | links, images, inline HTML refs   |
//! | `text/html`       | html        | `href` / `src`, stylesheets       |
//! | `text/css`        | css         | `@import`, `url()`                |
//! | `text/javascript` | script      | relative `import` specifiers      |

mod css;
pub mod frontmatter;
mod html;
pub mod layout;
mod markdown;
mod script;

pub use markdown::MarkdownOptions;

use std::ops::Range;

use rustc_hash::FxHashMap;

use crate::graph::DepKind;
use crate::store::JsonMap;
use crate::utils::{mime, url};

/// Errors raised while transforming one entity.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("invalid front matter: {0}")]
    FrontMatter(String),
    #[error("no transformer for `{0}`")]
    Unsupported(String),
    #[error("layout cycle through `{0}`")]
    LayoutCycle(String),
}

/// Metadata keys written by transformers rather than by authors.
pub const EXPORTED_KEYS: [&str; 2] = ["first_heading", "headings"];

/// A reference found in source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub kind: DepKind,
    /// The reference exactly as written.
    pub literal: String,
}

impl Discovered {
    pub fn new(kind: DepKind, literal: impl Into<String>) -> Self {
        Self {
            kind,
            literal: literal.into(),
        }
    }
}

/// Everything a transformer gets to see.
#[derive(Debug, Clone, Copy)]
pub struct TransformInput<'a> {
    pub source_text: &'a str,
    /// Source URL of the entity.
    pub path: &'a str,
    /// Resolved metadata of the entity.
    pub meta: &'a JsonMap,
    /// Reference literal → URL it should point at in the output.
    pub imports: &'a FxHashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    pub output_text: String,
    pub exported_meta: JsonMap,
    pub dependencies: Vec<Discovered>,
}

pub trait ContentTransformer: Send + Sync {
    fn name(&self) -> &'static str;

    /// MIME essence of the produced output.
    fn output_mime(&self) -> &'static str;

    /// References in `text`, without transforming it.
    fn discover(&self, text: &str) -> Vec<Discovered>;

    fn transform(&self, input: TransformInput<'_>) -> Result<TransformOutput, TransformError>;

    /// Title carried by the text itself, such as its first heading.
    fn title(&self, _text: &str) -> Option<String> {
        None
    }
}

/// Transformers keyed by source MIME essence.
pub struct TransformerSet {
    by_mime: FxHashMap<&'static str, Box<dyn ContentTransformer>>,
}

impl TransformerSet {
    pub fn empty() -> Self {
        Self {
            by_mime: FxHashMap::default(),
        }
    }

    /// The built-in markdown, html, css and script transformers.
    pub fn with_defaults(options: MarkdownOptions) -> Self {
        let mut set = Self::empty();
        set.register("text/markdown", Box::new(markdown::Markdown::new(options)));
        set.register("text/html", Box::new(html::Html));
        set.register("text/css", Box::new(css::Css));
        set.register("text/javascript", Box::new(script::Script));
        set
    }

    pub fn register(&mut self, mime: &'static str, transformer: Box<dyn ContentTransformer>) {
        self.by_mime.insert(mime, transformer);
    }

    pub fn for_mime(&self, mime: &str) -> Option<&dyn ContentTransformer> {
        self.by_mime.get(mime::essence(mime)).map(Box::as_ref)
    }

    pub fn len(&self) -> usize {
        self.by_mime.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_mime.is_empty()
    }
}

impl Default for TransformerSet {
    fn default() -> Self {
        Self::with_defaults(MarkdownOptions::all())
    }
}

impl std::fmt::Debug for TransformerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.by_mime.keys().collect();
        names.sort();
        f.debug_struct("TransformerSet").field("mimes", &names).finish()
    }
}

/// A reference literal located in text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Located {
    pub range: Range<usize>,
    pub kind: DepKind,
}

impl Located {
    fn literal<'t>(&self, text: &'t str) -> &'t str {
        &text[self.range.clone()]
    }
}

pub(crate) fn discovered(text: &str, located: &[Located]) -> Vec<Discovered> {
    located
        .iter()
        .map(|loc| Discovered::new(loc.kind, loc.literal(text)))
        .collect()
}

/// Replace every located literal that has an entry in `imports`.
pub(crate) fn rewrite(
    text: &str,
    located: &[Located],
    imports: &FxHashMap<String, String>,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for loc in located {
        if loc.range.start < cursor {
            continue;
        }
        if let Some(target) = imports.get(loc.literal(text)) {
            out.push_str(&text[cursor..loc.range.start]);
            out.push_str(target);
            cursor = loc.range.end;
        }
    }
    out.push_str(&text[cursor..]);
    out
}

/// Output URL for a reference literal, keeping its query and fragment.
pub fn import_target(literal: &str, destination: &str) -> String {
    let (_, suffix) = url::split_suffix(literal);
    format!("{destination}{suffix}")
}
