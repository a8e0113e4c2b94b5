//! Source URL helpers.
//!
//! Source URLs are absolute, `/`-separated paths relative to the content
//! root: `/` for the root directory, `/posts` for a directory,
//! `/posts/hello.md` for a file. No trailing slash except the root.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

/// Last path segment.
pub fn file_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Extension of the last segment, without the dot.
///
/// ```ignore
/// assert_eq!(extension("/posts/a.md"), Some("md"));
/// assert_eq!(extension("/.hidden"), None);
/// ```
pub fn extension(url: &str) -> Option<&str> {
    let name = file_name(url);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(pos) => Some(&name[pos + 1..]),
    }
}

/// URL with the extension of its last segment removed.
pub fn strip_extension(url: &str) -> &str {
    match extension(url) {
        Some(ext) => &url[..url.len() - ext.len() - 1],
        None => url,
    }
}

/// Parent directory URL, `None` for the root.
pub fn parent(url: &str) -> Option<&str> {
    if url == "/" || url.is_empty() {
        return None;
    }
    let trimmed = url.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => Some("/"),
        Some(pos) => Some(&trimmed[..pos]),
        None => Some("/"),
    }
}

/// Directory a relative reference in `url` resolves against.
pub fn base_dir(url: &str, is_dir: bool) -> &str {
    if is_dir {
        url
    } else {
        parent(url).unwrap_or("/")
    }
}

/// Collapse `.`, `..` and empty segments. `..` never climbs above the root.
/// A trailing slash is kept.
pub fn normalize(url: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in url.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    let mut out = format!("/{}", segments.join("/"));
    if url.ends_with('/') && out != "/" {
        out.push('/');
    }
    out
}

/// Resolve `reference` against the directory `base`.
pub fn join(base: &str, reference: &str) -> String {
    if reference.starts_with('/') {
        normalize(reference)
    } else {
        normalize(&format!("{}/{}", base.trim_end_matches('/'), reference))
    }
}

/// Whether a reference leaves the site: has a URL scheme (`https:`,
/// `mailto:`, `data:`) or is protocol-relative (`//host`).
pub fn is_external(link: &str) -> bool {
    if link.starts_with("//") {
        return true;
    }
    link.find(':').is_some_and(|pos| {
        pos > 0
            && link[..pos]
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

/// Split `path?query#fragment` into `(path, "?query#fragment")`.
pub fn split_suffix(link: &str) -> (&str, &str) {
    match link.find(['?', '#']) {
        Some(pos) => (&link[..pos], &link[pos..]),
        None => (link, ""),
    }
}

/// Percent-decode a reference literal.
pub fn decode(link: &str) -> Cow<'_, str> {
    percent_decode_str(link)
        .decode_utf8()
        .unwrap_or(Cow::Borrowed(link))
}

/// Any segment starting with `_` marks content that is not published.
pub fn is_unpublished(url: &str) -> bool {
    url.split('/').any(|segment| segment.starts_with('_'))
}
