// Copyright 2025-6 Seth Pendergrass. See LICENSE.

//! Export Stage 1: Plan the destination layout.
//!
//! Walks the library's container tree and decides, per container, whether
//! and where it exports. The output is `Exporter::named_dirs`: every
//! planned directory with its planned files, before the destination is
//! touched at all.

use regex::Regex;

use super::{
  dir::{originals_folder_name, ExportDir},
  Exporter,
};
use crate::{
  dest::Destination,
  naming::{self, SuffixStyle},
  prim::{Container, ContainerKind},
};

impl<'a, D: Destination> Exporter<'a, D> {
  pub(super) fn plan(&mut self) {
    let library = self.library;

    // One walk per category, each driven by its own include pattern.
    let categories: [(Option<Regex>, &[ContainerKind]); 3] = [
      (self.cfg.events.clone(), &[ContainerKind::Event]),
      (
        self.cfg.albums.clone(),
        &[ContainerKind::Regular, ContainerKind::Published],
      ),
      (self.cfg.smarts.clone(), &[ContainerKind::Smart]),
    ];
    for (pattern, kinds) in categories {
      if let Some(pattern) = pattern {
        self.process_containers(&library.root().children, "", &pattern, kinds, false);
      }
    }

    if self.cfg.facealbums {
      for album in library.face_albums() {
        self.add_container(album, &self.cfg.facealbum_prefix.clone());
      }
    }
  }

  /// Recursively plans `containers` for one category. `prefix` is the
  /// destination folder path accumulated from enclosing folders; `matched`
  /// is set once an enclosing container matched this category's pattern,
  /// and commits the whole subtree.
  fn process_containers(
    &mut self,
    containers: &'a [Container],
    prefix: &str,
    pattern: &Regex,
    kinds: &[ContainerKind],
    matched: bool,
  ) {
    for container in containers {
      if self.aborted() {
        return;
      }
      if container.kind == ContainerKind::Special || self.excluded(container) {
        continue;
      }

      if container.is_folder() || !container.children.is_empty() {
        let matched = matched || pattern.is_match(&container.name);
        // Only real folders contribute a path segment.
        let prefix = if container.is_folder() {
          format!("{prefix}{}/", naming::sanitize_name(&container.name))
        } else {
          prefix.to_string()
        };
        self.process_containers(&container.children, &prefix, pattern, kinds, matched);
        continue;
      }

      if !kinds.contains(&container.kind) {
        continue;
      }
      if matched || pattern.is_match(&container.name) {
        self.add_container(container, prefix);
      }
    }
  }

  /// Plans one exporting container as a destination directory.
  fn add_container(&mut self, container: &'a Container, prefix: &str) {
    if self.excluded(container) {
      return;
    }

    let hint = if self.cfg.folderhints {
      container.folder_hint()
    } else {
      None
    };

    let rendered = match naming::render_folder_name(&self.cfg.foldertemplate, container, None) {
      Ok(name) => name,
      Err(e) => {
        log::warn!(
          "Unknown folder placeholder {{{}}} (valid: {}); using the template as is.",
          e.key,
          e.valid.join(", ")
        );
        self.cfg.foldertemplate.clone()
      }
    };
    // A folder hint names the parent folder the album exports into.
    let rendered = match hint {
      Some(hint) => format!("{hint}/{rendered}"),
      None => rendered,
    };

    // Templates like `{yyyy}/{name}` produce nested paths; sanitize each
    // segment on its own so the separators survive.
    let path: Vec<String> = rendered
      .split('/')
      .map(naming::sanitize_name)
      .filter(|s| !s.is_empty())
      .collect();
    if path.is_empty() {
      log::warn!("{}: folder name is empty after sanitizing; skipped.", container.name);
      return;
    }

    let name = format!("{prefix}{}", path.join("/"));
    let name = naming::make_unique(&name, SuffixStyle::Parens, |candidate| {
      self
        .named_dirs
        .keys()
        .any(|k| k.to_lowercase() == candidate.to_lowercase())
    });

    let images = self.library.resolve_images(container);
    let directory = self.cfg.export_root.join(&name);
    let originals_folder = originals_folder_name(&self.dest, self.cfg, &directory);
    let mut dir = ExportDir::new(
      name.clone(),
      directory,
      container.comment_without_hints(),
      originals_folder,
    );
    dir.add_images(&images, self.cfg);

    if dir.files.is_empty() {
      log::debug!("{name}: nothing to export; skipped.");
      return;
    }

    log::debug!("{name}: planning {} files.", dir.files.len());
    self.named_dirs.insert(name, dir);
  }

  fn excluded(&self, container: &Container) -> bool {
    if matches(self.cfg.exclude.as_ref(), &container.name) {
      log::debug!("{}: excluded.", container.name);
      true
    } else {
      false
    }
  }
}

fn matches(pattern: Option<&Regex>, name: &str) -> bool {
  pattern.is_some_and(|p| p.is_match(name))
}

#[cfg(test)]
mod test {
  use std::{
    collections::HashMap,
    sync::{atomic::AtomicBool, Arc},
  };

  use regex::Regex;

  use super::*;
  use crate::{
    config::RunConfig,
    dest::LocalDestination,
    library::Library,
    prim::MediaItem,
  };

  fn library() -> Library {
    let mut images = HashMap::new();
    for (id, name) in [("1", "beach"), ("2", "hike"), ("3", "city")] {
      images.insert(
        id.to_string(),
        MediaItem::new(id.into(), format!("/lib/{name}.jpg").into(), String::new()),
      );
    }

    let mut root = Container::new(String::new(), ContainerKind::Folder, 0);

    let mut event = Container::new("Summer".into(), ContainerKind::Event, 1);
    event.image_ids = vec!["1".into(), "2".into()];
    root.children.push(event);

    let mut folder = Container::new("Trips".into(), ContainerKind::Folder, 2);
    let mut album = Container::new("City Break".into(), ContainerKind::Regular, 3);
    album.image_ids = vec!["3".into()];
    folder.children.push(album);
    root.children.push(folder);

    Library::new("9.4".into(), images, root).unwrap()
  }

  fn plan(cfg: &RunConfig, lib: &Library) -> Vec<String> {
    let mut exporter =
      Exporter::new(lib, LocalDestination, cfg, Arc::new(AtomicBool::new(false)));
    exporter.plan();
    exporter.named_dirs.keys().cloned().collect()
  }

  #[test]
  fn events_and_albums_plan_independently() {
    let lib = library();

    let cfg = RunConfig {
      events: Some(Regex::new(".").unwrap()),
      ..RunConfig::default()
    };
    assert_eq!(plan(&cfg, &lib), ["Summer"]);

    let cfg = RunConfig {
      albums: Some(Regex::new(".").unwrap()),
      ..RunConfig::default()
    };
    assert_eq!(plan(&cfg, &lib), ["Trips/City Break"]);
  }

  #[test]
  fn folder_match_commits_the_subtree() {
    let lib = library();
    let cfg = RunConfig {
      albums: Some(Regex::new("^Trips$").unwrap()),
      ..RunConfig::default()
    };
    // The album name itself does not match, but its folder does.
    assert_eq!(plan(&cfg, &lib), ["Trips/City Break"]);
  }

  #[test]
  fn exclude_pattern_wins() {
    let lib = library();
    let cfg = RunConfig {
      events: Some(Regex::new(".").unwrap()),
      albums: Some(Regex::new(".").unwrap()),
      exclude: Some(Regex::new("City").unwrap()),
      ..RunConfig::default()
    };
    assert_eq!(plan(&cfg, &lib), ["Summer"]);
  }

  #[test]
  fn colliding_directory_names_get_suffixes() {
    let mut images = HashMap::new();
    images.insert(
      "1".to_string(),
      MediaItem::new("1".into(), "/lib/a.jpg".into(), String::new()),
    );

    let mut root = Container::new(String::new(), ContainerKind::Folder, 0);
    for id in [1, 2] {
      let mut event = Container::new("Trip".into(), ContainerKind::Event, id);
      event.image_ids = vec!["1".into()];
      root.children.push(event);
    }
    let lib = Library::new("9.4".into(), images, root).unwrap();

    let cfg = RunConfig {
      events: Some(Regex::new(".").unwrap()),
      ..RunConfig::default()
    };
    assert_eq!(plan(&cfg, &lib), ["Trip", "Trip_(1)"]);
  }

  #[test]
  fn folder_hint_nests_albums_inside_the_hinted_folder() {
    let mut images = HashMap::new();
    images.insert(
      "1".to_string(),
      MediaItem::new("1".into(), "/lib/a.jpg".into(), String::new()),
    );

    let mut root = Container::new(String::new(), ContainerKind::Folder, 0);
    for (id, name) in [(1, "Spring"), (2, "Fall")] {
      let mut album = Container::new(name.into(), ContainerKind::Regular, id);
      album.comment = "@Travel".into();
      album.image_ids = vec!["1".into()];
      root.children.push(album);
    }
    let lib = Library::new("9.4".into(), images, root).unwrap();

    let cfg = RunConfig {
      albums: Some(Regex::new(".").unwrap()),
      folderhints: true,
      ..RunConfig::default()
    };
    // Both albums land next to each other under the hinted folder.
    assert_eq!(plan(&cfg, &lib), ["Travel/Fall", "Travel/Spring"]);
  }

  #[test]
  fn category_patterns_propagate_independently() {
    let mut images = HashMap::new();
    images.insert(
      "1".to_string(),
      MediaItem::new("1".into(), "/lib/a.jpg".into(), String::new()),
    );

    let mut root = Container::new(String::new(), ContainerKind::Folder, 0);
    let mut folder = Container::new("Vacations".into(), ContainerKind::Folder, 1);
    let mut smart = Container::new("Recent".into(), ContainerKind::Smart, 2);
    smart.image_ids = vec!["1".into()];
    folder.children.push(smart);
    root.children.push(folder);
    let lib = Library::new("9.4".into(), images, root).unwrap();

    // A folder matching the album pattern does not commit smart albums.
    let cfg = RunConfig {
      albums: Some(Regex::new("^Vacations$").unwrap()),
      smarts: Some(Regex::new("^Nothing$").unwrap()),
      ..RunConfig::default()
    };
    assert!(plan(&cfg, &lib).is_empty());

    // Matching the smart pattern on the folder does.
    let cfg = RunConfig {
      smarts: Some(Regex::new("^Vacations$").unwrap()),
      ..RunConfig::default()
    };
    assert_eq!(plan(&cfg, &lib), ["Vacations/Recent"]);
  }

  #[test]
  fn folder_template_renders_nested_paths() {
    let lib = library();
    let cfg = RunConfig {
      events: Some(Regex::new(".").unwrap()),
      foldertemplate: "{yyyy}/{name}".into(),
      ..RunConfig::default()
    };
    // The event has no date, so {yyyy} renders empty and drops out.
    assert_eq!(plan(&cfg, &lib), ["Summer"]);
  }
}
