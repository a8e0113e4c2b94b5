//! Filesystem path utilities.
//!
//! - `normalize_path`: absolute form of a path (canonicalize with fallback)
//! - `to_source_url` / `source_path`: content path ↔ source URL
//! - `output_path`: destination URL → file in the output directory
//! - `serve_path`: request URL → file in the served directory

use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to the path itself when absolute, or joined with the current
/// directory when relative.
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// Source URL of `path` below `root`, `None` when outside.
///
/// ```text
/// /site/content              → /
/// /site/content/posts/a.md   → /posts/a.md
/// ```
pub fn to_source_url(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let mut url = String::new();
    for component in rel.components() {
        match component {
            Component::Normal(segment) => {
                url.push('/');
                url.push_str(&segment.to_string_lossy());
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    if url.is_empty() {
        url.push('/');
    }
    Some(url)
}

/// File below `root` addressed by a source or destination URL.
pub fn url_to_path(root: &Path, url: &str) -> PathBuf {
    let rel = url.trim_start_matches('/');
    if rel.is_empty() {
        root.to_path_buf()
    } else {
        root.join(rel)
    }
}

/// Content file of a source URL.
pub fn source_path(content_root: &Path, url: &str) -> PathBuf {
    url_to_path(content_root, url)
}

/// Output file of a destination URL. A trailing slash means `index.html`.
pub fn output_path(output_root: &Path, url: &str) -> PathBuf {
    let path = url_to_path(output_root, url);
    if url.ends_with('/') {
        path.join("index.html")
    } else {
        path
    }
}

/// Editor artifacts and hidden files never become entities.
pub fn is_ignored_name(name: &str) -> bool {
    let ext = name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    name.starts_with('.')
        || name.ends_with('~')
        || matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
}

/// Whether any component of a root-relative `path` is ignored.
pub fn is_ignored(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => is_ignored_name(&name.to_string_lossy()),
        _ => false,
    })
}

/// Whether any segment of a source URL is ignored.
pub fn is_ignored_url(url: &str) -> bool {
    url.split('/').any(is_ignored_name)
}

/// Resolve a request URL to a file under `serve_root`, handling
/// `index.html` for directories. Traversal outside the root is rejected.
pub fn serve_path(url: &str, serve_root: &Path) -> Option<PathBuf> {
    let decoded = percent_decode_str(url)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();
    let clean = decoded.split('?').next().unwrap_or(&decoded);
    let clean = clean.trim_matches('/');

    if clean.contains("..") {
        return None;
    }

    let root_canonical = serve_root.canonicalize().ok()?;
    // `/about` falls back to `/about.html`
    for candidate in [serve_root.join(clean), serve_root.join(format!("{clean}.html"))] {
        let Ok(canonical) = candidate.canonicalize() else {
            continue;
        };
        if !canonical.starts_with(&root_canonical) {
            return None;
        }
        if canonical.is_file() {
            return Some(canonical);
        }
        if canonical.is_dir() {
            let index = canonical.join("index.html");
            if index.is_file() {
                return Some(index);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_path_relative() {
        let normalized = normalize_path(Path::new("relative/path/file.txt"));
        assert!(normalized.is_absolute());
    }

    #[test]
    fn test_source_url_roundtrip() {
        let root = Path::new("/site/content");
        assert_eq!(to_source_url(root, root).as_deref(), Some("/"));
        assert_eq!(
            to_source_url(root, &root.join("posts/a.md")).as_deref(),
            Some("/posts/a.md")
        );
        assert_eq!(to_source_url(root, Path::new("/elsewhere/x.md")), None);
        assert_eq!(source_path(root, "/posts/a.md"), root.join("posts/a.md"));
        assert_eq!(source_path(root, "/"), root);
    }

    #[test]
    fn test_output_path() {
        let out = Path::new("/site/public");
        assert_eq!(output_path(out, "/a.html"), out.join("a.html"));
        assert_eq!(output_path(out, "/blog/"), out.join("blog/index.html"));
    }

    #[test]
    fn test_is_ignored() {
        assert!(is_ignored_name(".DS_Store"));
        assert!(is_ignored_name("post.md~"));
        assert!(is_ignored_name("post.md.swp"));
        assert!(!is_ignored_name("post.md"));
        assert!(is_ignored(Path::new("content/.git/config")));
        assert!(is_ignored_url("/posts/.draft.md"));
        assert!(!is_ignored_url("/posts/draft.md"));
    }

    #[test]
    fn test_serve_path() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("blog")).unwrap();
        std::fs::write(dir.path().join("blog/index.html"), "x").unwrap();
        std::fs::write(dir.path().join("about.html"), "x").unwrap();

        assert!(serve_path("/blog/", dir.path()).unwrap().ends_with("blog/index.html"));
        assert!(serve_path("/about", dir.path()).unwrap().ends_with("about.html"));
        assert!(serve_path("/about.html?x=1", dir.path()).is_some());
        assert!(serve_path("/../etc/passwd", dir.path()).is_none());
        assert!(serve_path("/missing", dir.path()).is_none());
    }
}
