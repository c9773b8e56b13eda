// Copyright 2025-6 Seth Pendergrass. See LICENSE.

//! End-to-end reconciliation tests over real temporary directories. These
//! run with tag reconciliation off, so no external tools are needed.

use std::{
  collections::HashMap,
  fs,
  path::Path,
  sync::{atomic::AtomicBool, Arc},
};

use regex::Regex;

use super::{ExportStats, Exporter};
use crate::{
  config::RunConfig,
  dest::LocalDestination,
  library::Library,
  prim::{Container, ContainerKind, MediaItem},
};

struct TestLibrary {
  _dir:    tempfile::TempDir,
  library: Library,
  cfg:     RunConfig,
}

/// One event ("Trip") holding `images` as (id, caption, content) triples,
/// with real files on disk.
fn test_library(images: &[(&str, &str, &[u8])]) -> TestLibrary {
  let dir = tempfile::tempdir().unwrap();
  let masters = dir.path().join("Masters");
  fs::create_dir_all(&masters).unwrap();

  let mut map = HashMap::new();
  let mut event = Container::new("Trip".into(), ContainerKind::Event, 1);
  for (id, caption, content) in images {
    let path = masters.join(format!("{id}.jpg"));
    fs::write(&path, content).unwrap();
    map.insert(
      (*id).to_string(),
      MediaItem::new((*id).to_string(), path, (*caption).to_string()),
    );
    event.image_ids.push((*id).to_string());
  }

  let mut root = Container::new(String::new(), ContainerKind::Folder, 0);
  root.children.push(event);
  let library = Library::new("9.4".into(), map, root).unwrap();

  let cfg = RunConfig {
    export_root: dir.path().join("out"),
    events: Some(Regex::new(".").unwrap()),
    ..RunConfig::default()
  };

  TestLibrary {
    _dir: dir,
    library,
    cfg,
  }
}

fn run(t: &TestLibrary) -> ExportStats {
  Exporter::new(&t.library, LocalDestination, &t.cfg, Arc::new(AtomicBool::new(false))).run()
}

fn set_mtime(path: &Path, mtime: std::time::SystemTime) {
  fs::File::options()
    .write(true)
    .open(path)
    .unwrap()
    .set_modified(mtime)
    .unwrap();
}

#[test]
fn export_then_rerun_is_idempotent() {
  let t = test_library(&[("1", "Beach", b"aa"), ("2", "Beach", b"bb")]);

  let stats = run(&t);
  assert_eq!(stats.directories_created, 1);
  assert_eq!(stats.files_exported, 2);
  assert_eq!(stats.failures, 0);

  // Same caption, deterministic disambiguation.
  let trip = t.cfg.export_root.join("Trip");
  assert!(trip.join("Beach.jpg").is_file());
  assert!(trip.join("Beach_1.jpg").is_file());
  assert_eq!(fs::read(trip.join("Beach.jpg")).unwrap(), b"aa");

  // A second run finds nothing to do.
  let stats = run(&t);
  assert_eq!(stats.directories_created, 0);
  assert_eq!(stats.files_exported, 0);
  assert_eq!(stats.files_updated, 0);
  assert_eq!(stats.items_deleted, 0);
}

#[test]
fn grown_source_updates_exactly_one_file() {
  let mut t = test_library(&[("1", "Beach", b"aa"), ("2", "Hike", b"bb")]);
  run(&t);

  // Grow one source past the size threshold without touching its mtime.
  let beach = &t.library.image("1").unwrap().path;
  let mtime = fs::metadata(beach).unwrap().modified().unwrap();
  let grown = vec![b'x'; 50_000];
  fs::write(beach, &grown).unwrap();
  set_mtime(beach, mtime);
  set_mtime(&t.cfg.export_root.join("Trip/Beach.jpg"), mtime);

  // Without -u, nothing changes.
  let stats = run(&t);
  assert_eq!(stats.files_updated, 0);
  assert_eq!(fs::read(t.cfg.export_root.join("Trip/Beach.jpg")).unwrap(), b"aa");

  t.cfg.update = true;
  let stats = run(&t);
  assert_eq!(stats.files_updated, 1);
  assert_eq!(stats.files_exported, 0);
  assert_eq!(fs::read(t.cfg.export_root.join("Trip/Beach.jpg")).unwrap(), grown);
}

#[test]
fn obsolete_items_require_delete_permission() {
  let mut t = test_library(&[("1", "Beach", b"aa")]);
  run(&t);

  let trip = t.cfg.export_root.join("Trip");
  fs::write(trip.join("stray.jpg"), b"old").unwrap();
  fs::write(trip.join("Thumbs.db"), b"noise").unwrap();
  fs::write(t.cfg.export_root.join("loose.jpg"), b"old").unwrap();
  fs::create_dir_all(t.cfg.export_root.join("Unplanned/deep")).unwrap();
  fs::write(t.cfg.export_root.join("Unplanned/deep/x.jpg"), b"old").unwrap();

  let stats = run(&t);
  assert_eq!(stats.items_deleted, 0);
  assert!(trip.join("stray.jpg").is_file());

  t.cfg.delete = true;
  let stats = run(&t);
  assert_eq!(stats.items_deleted, 3);
  assert!(!trip.join("stray.jpg").exists());
  assert!(!t.cfg.export_root.join("loose.jpg").exists());
  assert!(!t.cfg.export_root.join("Unplanned").exists());
  // Noise files are never touched, and planned files survive.
  assert!(trip.join("Thumbs.db").is_file());
  assert!(trip.join("Beach.jpg").is_file());
}

#[test]
fn nested_plan_keeps_ancestor_directories() {
  let mut t = test_library(&[("1", "Beach", b"aa")]);
  t.cfg.foldertemplate = "Albums/{name}".into();
  t.cfg.delete = true;
  run(&t);

  let albums = t.cfg.export_root.join("Albums");
  assert!(albums.join("Trip/Beach.jpg").is_file());

  // Strays inside an ancestor are obsolete; the ancestor and the planned
  // tree survive.
  fs::create_dir_all(albums.join("Stray")).unwrap();
  fs::write(albums.join("loose.jpg"), b"old").unwrap();

  let stats = run(&t);
  assert_eq!(stats.items_deleted, 2);
  assert_eq!(stats.files_exported, 0);
  assert!(albums.join("Trip/Beach.jpg").is_file());
  assert!(!albums.join("Stray").exists());
  assert!(!albums.join("loose.jpg").exists());
}

#[test]
fn ignored_directories_are_left_alone() {
  let mut t = test_library(&[("1", "Beach", b"aa")]);
  t.cfg.delete = true;
  t.cfg.ignore = Some(Regex::new("^Keep").unwrap());
  run(&t);

  fs::create_dir_all(t.cfg.export_root.join("Keep This")).unwrap();
  fs::create_dir_all(t.cfg.export_root.join("iPod Photo Cache")).unwrap();

  let stats = run(&t);
  assert_eq!(stats.items_deleted, 0);
  assert!(t.cfg.export_root.join("Keep This").is_dir());
  assert!(t.cfg.export_root.join("iPod Photo Cache").is_dir());
}

#[test]
fn create_budget_caps_a_run() {
  let mut t = test_library(&[("1", "A", b"aa"), ("2", "B", b"bb"), ("3", "C", b"cc")]);
  t.cfg.max_create = Some(2);

  let stats = run(&t);
  assert_eq!(stats.files_exported, 2);

  // The next run picks up the remainder.
  let t = TestLibrary {
    cfg: RunConfig {
      max_create: Some(2),
      export_root: t.cfg.export_root.clone(),
      events: Some(Regex::new(".").unwrap()),
      ..RunConfig::default()
    },
    ..t
  };
  let stats = run(&t);
  assert_eq!(stats.files_exported, 1);
}

#[test]
fn dry_run_changes_nothing() {
  let mut t = test_library(&[("1", "Beach", b"aa"), ("2", "Hike", b"bb")]);
  t.cfg.dryrun = true;

  let stats = run(&t);
  assert_eq!(stats.directories_created, 1);
  assert_eq!(stats.files_exported, 2);
  assert!(!t.cfg.export_root.exists());
}

#[test]
fn renamed_caption_moves_the_file() {
  let mut t = test_library(&[("1", "Beach", b"aa")]);
  t.cfg.delete = true;
  run(&t);

  // Retitle the image: new name appears, old name becomes obsolete.
  let path = t.library.image("1").unwrap().path.clone();
  let mut images = HashMap::new();
  images.insert("1".to_string(), MediaItem::new("1".into(), path, "Sunset".into()));
  let mut event = Container::new("Trip".into(), ContainerKind::Event, 1);
  event.image_ids.push("1".into());
  let mut root = Container::new(String::new(), ContainerKind::Folder, 0);
  root.children.push(event);
  let t = TestLibrary {
    library: Library::new("9.4".into(), images, root).unwrap(),
    ..t
  };

  let stats = run(&t);
  assert_eq!(stats.files_exported, 1);
  assert_eq!(stats.items_deleted, 1);
  assert!(t.cfg.export_root.join("Trip/Sunset.jpg").is_file());
  assert!(!t.cfg.export_root.join("Trip/Beach.jpg").exists());
}
