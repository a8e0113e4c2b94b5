//! Markdown to HTML using pulldown-cmark.
//!
//! Link and image destinations are rewritten through the import map, and
//! raw HTML fragments go through the same reference scan as HTML sources.
//! Headings are exported as metadata.

use pulldown_cmark::{CowStr, Event, HeadingLevel, LinkType, Options, Parser, Tag, TagEnd};
use rustc_hash::FxHashMap;
use serde_json::{Value, json};

use super::{
    ContentTransformer, Discovered, TransformError, TransformInput, TransformOutput, frontmatter,
    html, rewrite,
};
use crate::graph::DepKind;
use crate::store::JsonMap;

/// Options for markdown conversion
#[derive(Debug, Clone, Default)]
pub struct MarkdownOptions {
    /// Enable tables extension
    pub tables: bool,
    /// Enable footnotes extension
    pub footnotes: bool,
    /// Enable strikethrough extension
    pub strikethrough: bool,
    /// Enable task lists extension
    pub task_lists: bool,
    /// Enable heading attributes extension (e.g., `# Heading {#custom-id}`)
    pub heading_attributes: bool,
}

impl MarkdownOptions {
    /// Create options with all extensions enabled
    pub fn all() -> Self {
        Self {
            tables: true,
            footnotes: true,
            strikethrough: true,
            task_lists: true,
            heading_attributes: true,
        }
    }

    fn to_pulldown_options(&self) -> Options {
        let mut opts = Options::empty();
        if self.tables {
            opts.insert(Options::ENABLE_TABLES);
        }
        if self.footnotes {
            opts.insert(Options::ENABLE_FOOTNOTES);
        }
        if self.strikethrough {
            opts.insert(Options::ENABLE_STRIKETHROUGH);
        }
        if self.task_lists {
            opts.insert(Options::ENABLE_TASKLISTS);
        }
        if self.heading_attributes {
            opts.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        }
        opts
    }
}

#[derive(Debug)]
struct Heading {
    level: HeadingLevel,
    id: Option<String>,
    text: String,
}

pub struct Markdown {
    options: Options,
}

impl Markdown {
    pub fn new(options: MarkdownOptions) -> Self {
        Self {
            options: options.to_pulldown_options(),
        }
    }
}

fn is_site_link(link_type: LinkType) -> bool {
    !matches!(link_type, LinkType::Email)
}

fn remap<'a>(dest: CowStr<'a>, imports: &FxHashMap<String, String>) -> CowStr<'a> {
    match imports.get(dest.as_ref()) {
        Some(target) => CowStr::from(target.clone()),
        None => dest,
    }
}

fn remap_html<'a>(fragment: CowStr<'a>, imports: &FxHashMap<String, String>) -> CowStr<'a> {
    let located = html::locate(&fragment);
    if located.is_empty() {
        return fragment;
    }
    CowStr::from(rewrite(&fragment, &located, imports))
}

impl ContentTransformer for Markdown {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn output_mime(&self) -> &'static str {
        "text/html"
    }

    fn discover(&self, text: &str) -> Vec<Discovered> {
        let mut found = Vec::new();
        for event in Parser::new_ext(frontmatter::body(text), self.options) {
            match event {
                Event::Start(Tag::Link {
                    link_type, dest_url, ..
                })
                | Event::Start(Tag::Image {
                    link_type, dest_url, ..
                }) if is_site_link(link_type) => {
                    found.push(Discovered::new(DepKind::Link, dest_url.as_ref()));
                }
                Event::Html(fragment) | Event::InlineHtml(fragment) => {
                    found.extend(html::Html.discover(&fragment));
                }
                _ => {}
            }
        }
        found
    }

    fn transform(&self, input: TransformInput<'_>) -> Result<TransformOutput, TransformError> {
        let body = frontmatter::body(input.source_text);
        let imports = input.imports;

        let mut headings: Vec<Heading> = Vec::new();
        let mut open: Option<Heading> = None;
        let mut dependencies = Vec::new();
        let mut events = Vec::new();

        for event in Parser::new_ext(body, self.options) {
            let event = match event {
                Event::Start(Tag::Heading { level, ref id, .. }) => {
                    open = Some(Heading {
                        level,
                        id: id.as_ref().map(|id| id.to_string()),
                        text: String::new(),
                    });
                    event
                }
                Event::End(TagEnd::Heading(_)) => {
                    headings.extend(open.take());
                    event
                }
                Event::Text(ref text) | Event::Code(ref text) => {
                    if let Some(heading) = open.as_mut() {
                        heading.text.push_str(text);
                    }
                    event
                }
                Event::Start(Tag::Link {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) if is_site_link(link_type) => {
                    dependencies.push(Discovered::new(DepKind::Link, dest_url.as_ref()));
                    Event::Start(Tag::Link {
                        link_type,
                        dest_url: remap(dest_url, imports),
                        title,
                        id,
                    })
                }
                Event::Start(Tag::Image {
                    link_type,
                    dest_url,
                    title,
                    id,
                }) => {
                    dependencies.push(Discovered::new(DepKind::Link, dest_url.as_ref()));
                    Event::Start(Tag::Image {
                        link_type,
                        dest_url: remap(dest_url, imports),
                        title,
                        id,
                    })
                }
                Event::Html(fragment) => {
                    dependencies.extend(html::Html.discover(&fragment));
                    Event::Html(remap_html(fragment, imports))
                }
                Event::InlineHtml(fragment) => {
                    dependencies.extend(html::Html.discover(&fragment));
                    Event::InlineHtml(remap_html(fragment, imports))
                }
                other => other,
            };
            events.push(event);
        }

        let mut output_text = String::with_capacity(body.len() * 3 / 2);
        pulldown_cmark::html::push_html(&mut output_text, events.into_iter());

        Ok(TransformOutput {
            output_text,
            exported_meta: export_headings(&headings),
            dependencies,
        })
    }

    fn title(&self, text: &str) -> Option<String> {
        let mut first: Option<(HeadingLevel, String)> = None;
        let mut open: Option<(HeadingLevel, String)> = None;
        for event in Parser::new_ext(frontmatter::body(text), self.options) {
            match event {
                Event::Start(Tag::Heading { level, .. }) => open = Some((level, String::new())),
                Event::Text(text) | Event::Code(text) => {
                    if let Some((_, buf)) = open.as_mut() {
                        buf.push_str(&text);
                    }
                }
                Event::End(TagEnd::Heading(_)) => {
                    let Some((level, buf)) = open.take() else {
                        continue;
                    };
                    if level == HeadingLevel::H1 {
                        return Some(buf.trim().to_string());
                    }
                    first.get_or_insert((level, buf));
                }
                _ => {}
            }
        }
        first.map(|(_, buf)| buf.trim().to_string())
    }
}

fn export_headings(headings: &[Heading]) -> JsonMap {
    let mut meta = JsonMap::new();
    if headings.is_empty() {
        return meta;
    }

    let first = headings
        .iter()
        .find(|h| h.level == HeadingLevel::H1)
        .or_else(|| headings.first())
        .map(|h| h.text.trim().to_string());
    if let Some(first) = first {
        meta.insert("first_heading".into(), Value::String(first));
    }

    let list = headings
        .iter()
        .map(|h| {
            let mut entry = json!({ "level": h.level as usize, "text": h.text.trim() });
            if let (Some(id), Some(obj)) = (&h.id, entry.as_object_mut()) {
                obj.insert("id".into(), Value::String(id.clone()));
            }
            entry
        })
        .collect();
    meta.insert("headings".into(), Value::Array(list));
    meta
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(source: &str, imports: &FxHashMap<String, String>) -> TransformOutput {
        let meta = JsonMap::new();
        Markdown::new(MarkdownOptions::all())
            .transform(TransformInput {
                source_text: source,
                path: "/a.md",
                meta: &meta,
                imports,
            })
            .unwrap()
    }

    #[test]
    fn test_basic_paragraph() {
        let out = render("Hello world", &FxHashMap::default());
        assert_eq!(out.output_text.trim(), "<p>Hello world</p>");
        assert!(out.exported_meta.is_empty());
    }

    #[test]
    fn test_front_matter_is_not_rendered() {
        let out = render("---\ntitle: X\n---\n\nBody", &FxHashMap::default());
        assert!(!out.output_text.contains("title"));
        assert!(out.output_text.contains("<p>Body</p>"));
    }

    #[test]
    fn test_headings_exported() {
        let out = render("## Intro\n\n# Main `title` {#top}\n", &FxHashMap::default());
        assert_eq!(out.exported_meta.get("first_heading"), Some(&json!("Main title")));
        assert_eq!(
            out.exported_meta.get("headings"),
            Some(&json!([
                {"level": 2, "text": "Intro"},
                {"level": 1, "text": "Main title", "id": "top"},
            ]))
        );
    }

    #[test]
    fn test_links_discovered_and_rewritten() {
        let source = "[About](../about.md#team) ![logo](img/logo.png) <a href=\"x.md\">x</a> <me@example.com>";
        let mut imports = FxHashMap::default();
        imports.insert("../about.md#team".to_string(), "/about.html#team".to_string());
        imports.insert("x.md".to_string(), "/x.html".to_string());

        let out = render(source, &imports);
        assert!(out.output_text.contains(r#"href="/about.html#team""#));
        assert!(out.output_text.contains(r#"src="img/logo.png""#));
        assert!(out.output_text.contains(r#"href="/x.html""#));

        let literals: Vec<_> = out.dependencies.iter().map(|d| d.literal.as_str()).collect();
        assert_eq!(literals, vec!["../about.md#team", "img/logo.png", "x.md"]);

        let discovered = Markdown::new(MarkdownOptions::all()).discover(source);
        assert_eq!(discovered, out.dependencies);
    }

    #[test]
    fn test_title_prefers_h1() {
        let md = Markdown::new(MarkdownOptions::all());
        assert_eq!(md.title("## Intro\n\n# Main\n").as_deref(), Some("Main"));
        assert_eq!(md.title("---\ntitle: x\n---\n## Only\n").as_deref(), Some("Only"));
        assert_eq!(md.title("no headings"), None);
    }
}
