//! Layout templates.
//!
//! A layout is ordinary markup containing `{{ name }}` placeholders.
//! `children` is the slot for the wrapped output, `title` the page title;
//! any other name is looked up in the page metadata.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::store::JsonMap;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_][\w.-]*)\s*\}\}").unwrap());

pub const CHILDREN: &str = "children";
pub const TITLE: &str = "title";

/// Substitute the placeholders of `template`.
///
/// Placeholders naming nothing known are left as written.
pub fn apply_layout(template: &str, children: &str, title: &str, meta: &JsonMap) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            match name {
                CHILDREN => children.to_string(),
                TITLE => escape(title),
                _ => lookup(meta, name).map_or_else(|| caps[0].to_string(), |v| escape(&v)),
            }
        })
        .into_owned()
}

/// Whether a template has a children slot at all.
pub fn has_slot(template: &str) -> bool {
    PLACEHOLDER
        .captures_iter(template)
        .any(|caps| &caps[1] == CHILDREN)
}

/// Scalar at a dotted path, rendered as text.
fn lookup(meta: &JsonMap, path: &str) -> Option<String> {
    let mut parts = path.split('.');
    let mut value = meta.get(parts.next()?)?;
    for part in parts {
        value = value.get(part)?;
    }
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
