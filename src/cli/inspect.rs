//! `kiln inspect`: entity inspector.
//!
//! Builds in memory and prints entities with their components as JSON.
//!
//! ```text
//! kiln inspect                  every entity
//! kiln inspect /posts/a.md      one entity
//! kiln inspect a.md --render    what rendering it would write, store untouched
//! kiln inspect --errors         entities carrying `error` components
//! kiln inspect --with title     entities carrying every named component
//! ```

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;

use super::args::InspectArgs;
use crate::config::SiteConfig;
use crate::pipeline::Report;
use crate::site::Site;
use crate::store::{Component, ComponentDef, Entity, EntityId, Query, Store};
use crate::utils::path::to_source_url;

/// Printed document.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Inspection {
    Entities {
        entities: Vec<Entity>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        reports: Vec<Report>,
    },
    Preview {
        eid: EntityId,
        components: Vec<Component>,
    },
}

pub fn run(args: &InspectArgs, config: Arc<SiteConfig>) -> Result<()> {
    let runtime = super::runtime()?;
    let mut site = Site::new(config)?.without_output().quiet();
    let report = runtime.block_on(site.build())?;

    let inspection = inspect(&mut site, args, report.reports)?;
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &inspection)?;
    writeln!(stdout)?;
    Ok(())
}

/// Select what `args` asks for from a built site.
pub fn inspect(site: &mut Site, args: &InspectArgs, reports: Vec<Report>) -> Result<Inspection> {
    let target = args
        .path
        .as_deref()
        .map(|path| lookup(site, path))
        .transpose()?;

    if args.render {
        let eid = target.ok_or_else(|| anyhow!("--render needs a path"))?;
        let components = site
            .preview(eid)
            .with_context(|| format!("Failed to render entity {eid}"))?;
        return Ok(Inspection::Preview { eid, components });
    }

    let mut query = Query::new();
    if let Some(eid) = target {
        query = query.among([eid]);
    }
    if args.errors {
        query = query.with(ComponentDef::Error);
    }
    let store = site.store();
    if !args.with.is_empty() {
        let names: Vec<&str> = args.with.iter().map(String::as_str).collect();
        query = query.with(store.resolve_component_def_ids(&names)?);
    }
    let mut entities = store.prepare(query).entities(store);
    entities.sort_by_key(|entity| entity.seq);

    let reports = if args.errors {
        reports
            .into_iter()
            .filter(|r| target.is_none_or(|eid| r.entity == Some(eid)))
            .collect()
    } else {
        Vec::new()
    };
    Ok(Inspection::Entities { entities, reports })
}

/// Source URL or content file path → entity id.
fn lookup(site: &Site, path: &str) -> Result<EntityId> {
    let url = if path.starts_with('/') && !Path::new(path).exists() {
        path.to_string()
    } else {
        let content = site.config().content_dir();
        let absolute = crate::utils::path::normalize_path(Path::new(path));
        to_source_url(content, &absolute)
            .or_else(|| to_source_url(content, &content.join(path)))
            .ok_or_else(|| anyhow!("`{path}` is outside the content directory"))?
    };

    let indices = site.indices();
    let indices = indices.read();
    indices
        .sources()
        .and_then(|src| src.get_eid(&url))
        .ok_or_else(|| anyhow!("no entity for `{url}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ComponentData;
    use tempfile::TempDir;

    fn args(path: Option<&str>, render: bool, errors: bool) -> InspectArgs {
        InspectArgs {
            path: path.map(String::from),
            render,
            errors,
            with: Vec::new(),
            verbose: false,
        }
    }

    async fn site(files: &[(&str, &str)]) -> (TempDir, Site, Vec<Report>) {
        let dir = TempDir::new().unwrap();
        let config = SiteConfig::for_root(dir.path());
        for (rel, text) in files {
            let path = config.content_dir().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, text).unwrap();
        }
        let mut site = Site::new(Arc::new(config)).unwrap().without_output().quiet();
        let report = site.build().await.unwrap();
        (dir, site, report.reports)
    }

    #[tokio::test]
    async fn test_single_entity_by_url() {
        let (_dir, mut site, reports) = site(&[("a.md", "# A"), ("b.md", "# B")]).await;
        let Inspection::Entities { entities, reports } =
            inspect(&mut site, &args(Some("/a.md"), false, false), reports).unwrap()
        else {
            panic!("expected entities");
        };
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].source_url(), Some("/a.md"));
        assert_eq!(entities[0].destination(), Some("/a.html"));
        assert!(reports.is_empty());
    }

    #[tokio::test]
    async fn test_errors_only() {
        let (_dir, mut site, reports) = site(&[
            ("a.md", "---\nlayout: /_layouts/a.html\n---\nA"),
            ("_layouts/a.html", "---\nlayout: /_layouts/b.html\n---\n{{ children }}"),
            ("_layouts/b.html", "---\nlayout: /_layouts/a.html\n---\n{{ children }}"),
            ("ok.md", "# fine"),
        ])
        .await;
        let Inspection::Entities { entities, reports } =
            inspect(&mut site, &args(None, false, true), reports).unwrap()
        else {
            panic!("expected entities");
        };
        assert!(!entities.is_empty());
        assert!(entities.iter().all(|e| e.has(ComponentDef::Error)));
        assert!(entities.iter().all(|e| e.source_url() != Some("/ok.md")));
        assert!(!reports.is_empty());
    }

    #[tokio::test]
    async fn test_render_preview_leaves_store_alone() {
        let (_dir, mut site, reports) = site(&[("a.md", "# A")]).await;
        let eid = lookup(&site, "/a.md").unwrap();
        let before = site.store().get_entity(eid, true);

        let Inspection::Preview { components, .. } =
            inspect(&mut site, &args(Some("a.md"), true, false), reports).unwrap()
        else {
            panic!("expected preview");
        };
        assert!(
            components
                .iter()
                .any(|c| matches!(&c.data, ComponentData::Output { text, .. } if text.contains("<h1")))
        );
        assert_eq!(site.store().get_entity(eid, true), before);
    }

    #[tokio::test]
    async fn test_filter_by_component_names() {
        let (_dir, mut site, reports) = site(&[("a.md", "# A"), ("logo.svg", "<svg/>")]).await;
        let mut only_titled = args(None, false, false);
        only_titled.with = vec!["title".into()];
        let Inspection::Entities { entities, .. } =
            inspect(&mut site, &only_titled, reports.clone()).unwrap()
        else {
            panic!("expected entities");
        };
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].source_url(), Some("/a.md"));

        let mut unknown = args(None, false, false);
        unknown.with = vec!["nonsense".into()];
        assert!(inspect(&mut site, &unknown, reports).is_err());
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let (_dir, site, _) = site(&[("a.md", "# A")]).await;
        assert!(lookup(&site, "/nope.md").is_err());
    }
}
