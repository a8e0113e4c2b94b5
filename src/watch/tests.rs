use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use tempfile::TempDir;
use tokio::sync::mpsc;

use super::classify::classify;
use super::debouncer::{COOLDOWN, Debouncer, SETTLE, merge};
use super::*;
use crate::config::SiteConfig;
use crate::index::{Index, IndexEntry, SOURCE_INDEX};
use crate::live::LiveEvent;
use crate::store::ComponentDefSet;

fn make_event(paths: &[&Path], kind: notify::EventKind) -> notify::Event {
    notify::Event {
        kind,
        paths: paths.iter().map(|p| p.to_path_buf()).collect(),
        attrs: Default::default(),
    }
}

fn modify_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Data(
        notify::event::DataChange::Any,
    ))
}

fn create_kind() -> notify::EventKind {
    notify::EventKind::Create(notify::event::CreateKind::File)
}

fn remove_kind() -> notify::EventKind {
    notify::EventKind::Remove(notify::event::RemoveKind::File)
}

// ----------------------------------------------------------------------------
// Debouncer
// ----------------------------------------------------------------------------

#[test]
fn test_debouncer_empty() {
    let debouncer = Debouncer::new();
    assert!(!debouncer.is_ready());
    assert_eq!(debouncer.sleep_duration(), Duration::from_secs(86400));
}

#[test]
fn test_event_routing_by_kind() {
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(&[Path::new("/tmp/a.md")], create_kind()));
    debouncer.add_event(&make_event(&[Path::new("/tmp/b.md")], modify_kind()));
    debouncer.add_event(&make_event(&[Path::new("/tmp/c.md")], remove_kind()));
    debouncer.add_event(&make_event(
        &[Path::new("/tmp/d.md")],
        notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
            notify::event::MetadataKind::Any,
        )),
    ));
    debouncer.add_event(&make_event(&[Path::new("/tmp/.e.md.swp")], modify_kind()));

    assert_eq!(debouncer.pending.len(), 3);
    assert_eq!(debouncer.pending[&PathBuf::from("/tmp/a.md")], ChangeKind::Created);
    assert_eq!(debouncer.pending[&PathBuf::from("/tmp/b.md")], ChangeKind::Modified);
    assert_eq!(debouncer.pending[&PathBuf::from("/tmp/c.md")], ChangeKind::Removed);
}

#[test]
fn test_coalescing_rules() {
    let restored = Path::new("/tmp/restored.md");
    let deleted = Path::new("/tmp/deleted.md");
    let flash = Path::new("/tmp/flash.md");
    let mut debouncer = Debouncer::new();

    debouncer.add_event(&make_event(&[restored], remove_kind()));
    debouncer.add_event(&make_event(&[restored], create_kind()));
    debouncer.add_event(&make_event(&[deleted], modify_kind()));
    debouncer.add_event(&make_event(&[deleted], remove_kind()));
    debouncer.add_event(&make_event(&[flash], create_kind()));
    debouncer.add_event(&make_event(&[flash], remove_kind()));

    assert_eq!(debouncer.pending[restored], ChangeKind::Created);
    assert_eq!(debouncer.pending[deleted], ChangeKind::Removed);
    assert!(!debouncer.pending.contains_key(flash));
}

#[test]
fn test_merge_table() {
    use ChangeKind::{Created, Modified, Removed};
    assert_eq!(merge(Created, Removed), None);
    assert_eq!(merge(Modified, Removed), Some(Removed));
    assert_eq!(merge(Removed, Created), Some(Created));
    assert_eq!(merge(Removed, Modified), Some(Modified));
    assert_eq!(merge(Created, Modified), Some(Created));
    assert_eq!(merge(Removed, Removed), Some(Removed));
}

#[test]
fn test_metadata_events_are_skipped() {
    let chmod = notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
        notify::event::MetadataKind::Permissions,
    ));
    assert_eq!(ChangeKind::from_event(&chmod), None);
    assert_eq!(ChangeKind::from_event(&modify_kind()), Some(ChangeKind::Modified));
}

#[test]
fn test_release_waits_for_quiet_period_and_cooldown() {
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(&[Path::new("/tmp/a.md")], modify_kind()));
    assert!(debouncer.take_if_ready().is_none());
    assert!(debouncer.sleep_duration() <= SETTLE);

    debouncer.last_event = Some(Instant::now() - (SETTLE + Duration::from_millis(10)));
    let batch = debouncer.take_if_ready().unwrap();
    assert_eq!(batch.len(), 1);
    assert!(debouncer.pending.is_empty());

    // A new event right after a release is held back by the cooldown.
    debouncer.add_event(&make_event(&[Path::new("/tmp/b.md")], modify_kind()));
    debouncer.last_event = Some(Instant::now() - (SETTLE + Duration::from_millis(10)));
    assert!(!debouncer.is_ready());
    debouncer.last_release = Some(Instant::now() - (COOLDOWN + Duration::from_millis(10)));
    assert!(debouncer.is_ready());
}

// ----------------------------------------------------------------------------
// Classification
// ----------------------------------------------------------------------------

struct Tree {
    _dir: TempDir,
    config: SiteConfig,
}

impl Tree {
    fn new(files: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        let config = SiteConfig::for_root(dir.path());
        for rel in files {
            let path = config.content_dir().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "x").unwrap();
        }
        std::fs::create_dir_all(config.content_dir()).unwrap();
        Self { _dir: dir, config }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.config.content_dir().join(rel)
    }
}

fn index(entries: &[(&str, u64)]) -> Index {
    let mut index = Index::new(SOURCE_INDEX);
    for (url, eid) in entries {
        index.insert(
            *url,
            IndexEntry {
                eid: *eid,
                mime: None,
                defs: ComponentDefSet::EMPTY,
            },
        );
    }
    index
}

fn ops(changes: &[PendingChange]) -> Vec<(&str, ChangeOp)> {
    changes.iter().map(|c| (c.url.as_str(), c.op)).collect()
}

#[test]
fn test_classify_against_source_index() {
    let tree = Tree::new(&["new.md", "known.md"]);
    let src = index(&[("/", 1), ("/known.md", 2), ("/gone.md", 3)]);
    let mut raw = FxHashMap::default();
    raw.insert(tree.path("new.md"), ChangeKind::Modified);
    raw.insert(tree.path("known.md"), ChangeKind::Modified);
    raw.insert(tree.path("gone.md"), ChangeKind::Removed);
    raw.insert(tree.path("never.md"), ChangeKind::Removed);

    let changes = classify(raw, &tree.config, Some(&src));
    assert_eq!(
        ops(&changes),
        vec![
            ("/gone.md", ChangeOp::Remove),
            ("/known.md", ChangeOp::Update),
            ("/never.md", ChangeOp::None),
            ("/new.md", ChangeOp::Add),
        ]
    );
    assert_eq!(changes[0].existing, Some(3));
    assert_eq!(changes[1].existing, Some(2));
}

#[test]
fn test_meta_file_updates_its_directory() {
    let tree = Tree::new(&["blog/_meta.toml", "blog/a.md"]);
    let src = index(&[("/", 1), ("/blog", 2), ("/blog/a.md", 3)]);
    let mut raw = FxHashMap::default();
    raw.insert(tree.path("blog/_meta.toml"), ChangeKind::Modified);

    let changes = classify(raw, &tree.config, Some(&src));
    assert_eq!(ops(&changes), vec![("/blog", ChangeOp::Update)]);
    assert_eq!(changes[0].existing, Some(2));
    assert_eq!(changes[0].path, tree.path("blog"));
}

#[test]
fn test_directory_event_recovers_children() {
    let tree = Tree::new(&["docs/kept.md", "docs/fresh.md"]);
    let src = index(&[("/", 1), ("/docs", 2), ("/docs/kept.md", 3), ("/docs/lost.md", 4)]);
    let mut raw = FxHashMap::default();
    raw.insert(tree.path("docs"), ChangeKind::Modified);

    let changes = classify(raw, &tree.config, Some(&src));
    assert_eq!(
        ops(&changes),
        vec![("/docs/lost.md", ChangeOp::Remove), ("/docs/fresh.md", ChangeOp::Add)]
    );
}

#[test]
fn test_paths_outside_content_are_ignored() {
    let tree = Tree::new(&[]);
    let mut raw = FxHashMap::default();
    raw.insert(tree.config.output_dir().join("a.html"), ChangeKind::Modified);
    raw.insert(tree.config.root.join("kiln.toml"), ChangeKind::Modified);
    assert!(classify(raw, &tree.config, None).is_empty());
}

// ----------------------------------------------------------------------------
// Builder
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_builder_publishes_updates() {
    let tree = Tree::new(&[]);
    std::fs::write(tree.path("a.md"), "# A").unwrap();
    let config = Arc::new(tree.config.clone());
    let mut site = Site::new(Arc::clone(&config)).unwrap().quiet();
    site.build().await.unwrap();
    core::set_healthy(true);

    let existing = site
        .indices()
        .read()
        .sources()
        .and_then(|src| src.get_eid("/a.md"));
    let emitter = Emitter::new();
    let mut events = emitter.subscribe();
    let (tx, rx) = mpsc::channel(4);
    let builder = tokio::spawn(run_builder(site, rx, emitter.clone()));

    std::fs::write(tree.path("a.md"), "# A again").unwrap();
    tx.send(vec![
        PendingChange::new(tree.path("a.md"), "/a.md", ChangeOp::Update).with_existing(existing),
    ])
    .await
    .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    match event {
        LiveEvent::Update { updates } => {
            assert!(updates.iter().any(|u| u.dst == "/a.html" && u.src == "/a.md"));
        }
        other => panic!("expected an update, got {other:?}"),
    }

    drop(tx);
    builder.await.unwrap();
}

#[tokio::test]
async fn test_publish_warning_only_build_still_updates() {
    let emitter = Emitter::new();
    let mut events = emitter.subscribe();
    let report = BuildReport::new(
        vec![crate::site::UpdatedUrl {
            dst: "/a.html".into(),
            src: "/a.md".into(),
            eid: 1,
        }],
        vec![crate::pipeline::Report {
            level: crate::pipeline::Level::Warn,
            pass: "references".into(),
            entity: Some(1),
            message: "/a.md: unresolved reference `x.md`".into(),
        }],
        Duration::ZERO,
    );

    publish(Ok(report), &emitter);

    assert!(core::is_healthy());
    match events.recv().await.unwrap() {
        LiveEvent::Update { updates } => assert_eq!(updates.len(), 1),
        other => panic!("expected an update, got {other:?}"),
    }
}
