//! Reference resolution against the source and destination indices.

use super::IndexSet;
use crate::store::EntityId;
use crate::utils::url;

/// Outcome of resolving a reference literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Points at a known entity. `target` is the normalized URL looked up.
    Found { eid: EntityId, target: String },
    /// Leaves the site (`https:`, `mailto:`, `//host`).
    External,
    /// Empty or fragment-only (`#top`), refers to the referrer itself.
    Anchor,
    /// Looked like a site reference but nothing lives there.
    Missing { target: String },
}

impl Resolution {
    pub const fn eid(&self) -> Option<EntityId> {
        match self {
            Self::Found { eid, .. } => Some(*eid),
            _ => None,
        }
    }
}

/// Resolve `literal` as written in the entity at `from_url`.
///
/// Relative literals resolve against the referrer's directory. Lookup order:
///
/// 1. source URL (`/posts/a.md`)
/// 2. destination URL (`/posts/a.html`, `/blog/` → `/blog/index.html`)
/// 3. source URL without extension (`/main` → `/main.md`)
/// 4. directory index source (`/blog` → `/blog/index.md`)
/// 5. destination without extension (`/about` → `/about.html`)
pub fn resolve_reference(
    indices: &IndexSet,
    from_url: &str,
    from_is_dir: bool,
    literal: &str,
) -> Resolution {
    let literal = literal.trim();
    if literal.is_empty() || literal.starts_with('#') || literal.starts_with('?') {
        return Resolution::Anchor;
    }
    if url::is_external(literal) {
        return Resolution::External;
    }

    let (path, _) = url::split_suffix(literal);
    let path = url::decode(path);
    let target = url::join(url::base_dir(from_url, from_is_dir), &path);
    let bare = match target.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    let found = |eid| Resolution::Found {
        eid,
        target: target.clone(),
    };

    if let Some(eid) = indices.sources().and_then(|src| src.get_eid(bare)) {
        // A directory URL resolves to its index page when one exists.
        return found(dir_index(indices, bare).unwrap_or(eid));
    }

    if let Some(dst) = indices.destinations() {
        if let Some(eid) = dst.get_eid(&target) {
            return found(eid);
        }
        if target.ends_with('/')
            && let Some(eid) = dst.get_eid(&format!("{target}index.html"))
        {
            return found(eid);
        }
    }

    if let Some(src) = indices.sources()
        && let Some((_, entry)) = src.find_by_stem(bare)
    {
        return found(entry.eid);
    }

    if let Some(eid) = dir_index(indices, bare) {
        return found(eid);
    }

    if let Some(dst) = indices.destinations() {
        for candidate in [format!("{bare}.html"), format!("{bare}/index.html")] {
            if let Some(eid) = dst.get_eid(&candidate) {
                return found(eid);
            }
        }
    }

    Resolution::Missing { target }
}

fn is_dir_entry(entry: &super::IndexEntry) -> bool {
    entry.mime.as_deref() == Some(crate::utils::mime::types::DIRECTORY)
}

/// `index.*` source inside the directory at `dir`, when `dir` is one.
fn dir_index(indices: &IndexSet, dir: &str) -> Option<EntityId> {
    let src = indices.sources()?;
    if !src.get(dir).is_some_and(is_dir_entry) {
        return None;
    }
    let stem = if dir == "/" {
        "/index".to_string()
    } else {
        format!("{dir}/index")
    };
    src.find_by_stem(&stem).map(|(_, entry)| entry.eid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{DESTINATION_INDEX, Index, IndexEntry, SOURCE_INDEX};
    use crate::store::ComponentDefSet;
    use crate::utils::mime::types::DIRECTORY;

    fn entry(eid: EntityId, mime: Option<&str>) -> IndexEntry {
        IndexEntry {
            eid,
            mime: mime.map(str::to_string),
            defs: ComponentDefSet::EMPTY,
        }
    }

    fn indices() -> IndexSet {
        let mut src = Index::new(SOURCE_INDEX);
        src.insert("/", entry(1, Some(DIRECTORY)));
        src.insert("/about.md", entry(2, Some("text/markdown")));
        src.insert("/main.md", entry(3, Some("text/markdown")));
        src.insert("/blog", entry(4, Some(DIRECTORY)));
        src.insert("/blog/index.md", entry(5, Some("text/markdown")));
        src.insert("/blog/style.css", entry(6, Some("text/css")));

        let mut dst = Index::new(DESTINATION_INDEX);
        dst.insert("/about.html", entry(2, None));
        dst.insert("/main.html", entry(3, None));
        dst.insert("/blog/index.html", entry(5, None));
        dst.insert("/blog/style.css", entry(6, None));

        let mut set = IndexSet::new();
        set.replace(src);
        set.replace(dst);
        set
    }

    #[test]
    fn test_resolves_by_destination() {
        let set = indices();
        assert_eq!(resolve_reference(&set, "/main.md", false, "/about.html").eid(), Some(2));
    }

    #[test]
    fn test_resolves_extensionless_source() {
        let set = indices();
        assert_eq!(resolve_reference(&set, "/about.md", false, "/main").eid(), Some(3));
        assert_eq!(resolve_reference(&set, "/about.md", false, "main").eid(), Some(3));
    }

    #[test]
    fn test_relative_and_suffixed() {
        let set = indices();
        assert_eq!(
            resolve_reference(&set, "/blog/index.md", false, "./style.css?v=2").eid(),
            Some(6)
        );
        assert_eq!(resolve_reference(&set, "/blog/index.md", false, "../about.md#team").eid(), Some(2));
    }

    #[test]
    fn test_directory_resolves_to_index() {
        let set = indices();
        assert_eq!(resolve_reference(&set, "/main.md", false, "/blog/").eid(), Some(5));
        assert_eq!(resolve_reference(&set, "/main.md", false, "/blog").eid(), Some(5));
    }

    #[test]
    fn test_non_site_references() {
        let set = indices();
        assert_eq!(
            resolve_reference(&set, "/main.md", false, "https://example.com"),
            Resolution::External
        );
        assert_eq!(resolve_reference(&set, "/main.md", false, "#top"), Resolution::Anchor);
        assert_eq!(
            resolve_reference(&set, "/main.md", false, "/nope.md"),
            Resolution::Missing {
                target: "/nope.md".into()
            }
        );
    }
}
