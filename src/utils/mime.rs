//! MIME type detection utilities.
//!
//! Full types (with charset) are used for HTTP responses; the bare
//! [`essence`] is what gets stored on components and index entries.

use std::path::Path;

/// Common MIME type constants.
pub mod types {
    // Text
    pub const HTML: &str = "text/html; charset=utf-8";
    pub const PLAIN: &str = "text/plain; charset=utf-8";
    pub const CSS: &str = "text/css; charset=utf-8";
    pub const JAVASCRIPT: &str = "text/javascript; charset=utf-8";
    pub const MARKDOWN: &str = "text/markdown; charset=utf-8";
    pub const JSON: &str = "application/json";
    pub const XML: &str = "application/xml";
    pub const TOML: &str = "text/toml; charset=utf-8";

    // Binary
    pub const OCTET_STREAM: &str = "application/octet-stream";
    pub const PDF: &str = "application/pdf";
    pub const WASM: &str = "application/wasm";

    // Images
    pub const PNG: &str = "image/png";
    pub const JPEG: &str = "image/jpeg";
    pub const GIF: &str = "image/gif";
    pub const WEBP: &str = "image/webp";
    pub const AVIF: &str = "image/avif";
    pub const SVG: &str = "image/svg+xml";
    pub const ICO: &str = "image/x-icon";

    // Media
    pub const MP3: &str = "audio/mpeg";
    pub const MP4: &str = "video/mp4";
    pub const WEBM: &str = "video/webm";

    // Fonts
    pub const WOFF: &str = "font/woff";
    pub const WOFF2: &str = "font/woff2";
    pub const TTF: &str = "font/ttf";

    /// Pseudo type for directory entities.
    pub const DIRECTORY: &str = "inode/directory";
}

/// How a source file enters the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Markdown or HTML, read into `markup-text`.
    Markup,
    /// Stylesheet, read into `style-text`.
    Style,
    /// Script module, read into `script-text`.
    Script,
    /// Copied to the output untouched.
    Static,
}

/// Guess MIME type from file extension.
pub fn from_path(path: &Path) -> &'static str {
    from_extension(path.extension().and_then(|e| e.to_str()))
}

/// Guess MIME type from the extension of a URL path.
pub fn from_url(url: &str) -> &'static str {
    from_extension(super::url::extension(url))
}

/// Guess MIME type from file extension string.
pub fn from_extension(ext: Option<&str>) -> &'static str {
    let ext = ext.map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("html" | "htm") => types::HTML,
        Some("css") => types::CSS,
        Some("js" | "mjs") => types::JAVASCRIPT,
        Some("md" | "markdown") => types::MARKDOWN,
        Some("json") => types::JSON,
        Some("xml") => types::XML,
        Some("toml") => types::TOML,
        Some("txt") => types::PLAIN,

        Some("svg") => types::SVG,
        Some("png") => types::PNG,
        Some("jpg" | "jpeg") => types::JPEG,
        Some("gif") => types::GIF,
        Some("webp") => types::WEBP,
        Some("avif") => types::AVIF,
        Some("ico") => types::ICO,

        Some("mp3") => types::MP3,
        Some("mp4" | "m4v") => types::MP4,
        Some("webm") => types::WEBM,

        Some("woff") => types::WOFF,
        Some("woff2") => types::WOFF2,
        Some("ttf") => types::TTF,

        Some("pdf") => types::PDF,
        Some("wasm") => types::WASM,

        _ => types::OCTET_STREAM,
    }
}

/// Strip parameters: `text/html; charset=utf-8` → `text/html`.
pub fn essence(mime: &str) -> &str {
    mime.split(';').next().unwrap_or(mime).trim()
}

/// Pipeline treatment of a source URL.
pub fn source_kind(url: &str) -> SourceKind {
    match essence(from_url(url)) {
        "text/markdown" | "text/html" => SourceKind::Markup,
        "text/css" => SourceKind::Style,
        "text/javascript" => SourceKind::Script,
        _ => SourceKind::Static,
    }
}

/// Check if the MIME type is HTML.
pub fn is_html(mime: &str) -> bool {
    essence(mime) == "text/html"
}
