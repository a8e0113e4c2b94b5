//! Front matter and metadata file parsing.
//!
//! Markup sources may start with a metadata block:
//!
//! ```text
//! +++                     ---
//! title = "Hello"         title: Hello
//! tags = ["a", "b"]       tags: a, b
//! +++                     ---
//! ```
//!
//! `+++` blocks are TOML, `---` blocks are simple `key: value` lines.

use serde_json::Value;

use super::TransformError;
use crate::store::JsonMap;

/// Detect a front matter block. Returns `(block, body, is_toml)`.
fn detect(content: &str) -> Option<(&str, &str, bool)> {
    let trimmed = content.trim_start();

    for (fence, is_toml) in [("---", false), ("+++", true)] {
        if trimmed.starts_with(fence)
            && let Some(end) = trimmed[3..].find(&format!("\n{fence}"))
        {
            let block = trimmed[3..3 + end].trim();
            let rest = &trimmed[3 + end + 4..];
            // Drop the remainder of the closing fence line.
            let body = rest.split_once('\n').map_or("", |(_, body)| body);
            return Some((block, body.trim_start_matches('\n'), is_toml));
        }
    }
    None
}

/// Text after the front matter block, or all of it.
pub fn body(content: &str) -> &str {
    detect(content).map_or(content, |(_, body, _)| body)
}

/// Split `content` into its metadata and body. Content without a block
/// yields empty metadata.
pub fn extract(content: &str) -> Result<(JsonMap, &str), TransformError> {
    match detect(content) {
        Some((block, body, true)) => Ok((parse_toml(block)?, body)),
        Some((block, body, false)) => Ok((parse_key_values(block), body)),
        None => Ok((JsonMap::new(), content)),
    }
}

/// Parse a TOML document (front matter or a directory metadata file).
pub fn parse_toml(text: &str) -> Result<JsonMap, TransformError> {
    let table: toml::Table =
        toml::from_str(text).map_err(|e| TransformError::FrontMatter(e.to_string()))?;
    Ok(table
        .into_iter()
        .map(|(key, value)| (key, toml_to_json(value)))
        .collect())
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(n) => Value::Number(n.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(key, value)| (key, toml_to_json(value)))
                .collect(),
        ),
    }
}

/// Parse `key: value` lines. Key case is preserved.
fn parse_key_values(block: &str) -> JsonMap {
    let mut meta = JsonMap::new();
    for line in block.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            meta.insert(key.trim().to_string(), parse_value(value.trim()));
        }
    }
    meta
}

/// Parse a scalar-ish value:
///
/// - Booleans: `true`, `false`
/// - Null: `null`, `~`
/// - Numbers: `123`, `3.14`
/// - Arrays: `a, b, c` or `[a, b, c]`
/// - Quoted or bare strings
fn parse_value(s: &str) -> Value {
    if s.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if s.eq_ignore_ascii_case("null") || s == "~" {
        return Value::Null;
    }
    if let Ok(n) = s.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(n) = s.parse::<f64>()
        && let Some(num) = serde_json::Number::from_f64(n)
    {
        return Value::Number(num);
    }

    if let Some(inner) = s.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        return split_list(inner);
    }
    if s.contains(',') {
        return split_list(s);
    }
    Value::String(unquote(s).to_string())
}

fn split_list(s: &str) -> Value {
    Value::Array(
        s.split(',')
            .map(|item| unquote(item.trim()))
            .filter(|item| !item.is_empty())
            .map(|item| Value::String(item.to_string()))
            .collect(),
    )
}

fn unquote(s: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}
