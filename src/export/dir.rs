// Copyright 2025-6 Seth Pendergrass. See LICENSE.

//! One planned destination directory and the files it should contain.

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
};

use crate::{
  config::{ContentMode, RunConfig},
  dest::Destination,
  naming::{self, SuffixStyle},
  prim::{extension_of, MediaItem},
};

/// One image's planned presence in a directory.
pub struct ExportFile<'a> {
  pub image: &'a MediaItem,
  /// Unique name within the directory, without extension.
  pub base_name: String,
  pub export_path: PathBuf,
  /// Where the pre-edit original goes, when one is exported.
  pub original_export_path: Option<PathBuf>,
}

/// A planned destination directory. `files` is keyed by lowercased base
/// name, both for deterministic iteration and because destination
/// filesystems may be case preserving but insensitive.
pub struct ExportDir<'a> {
  /// Export-root-relative name, possibly with `/` separators.
  pub name:      String,
  pub directory: PathBuf,
  /// Album description, folder hints stripped; becomes the
  /// `{folder_description}` caption placeholder.
  pub folder_comment: String,
  /// Name of this directory's companion folder for pre-edit originals.
  pub originals_folder: &'static str,
  pub files: BTreeMap<String, ExportFile<'a>>,
}

/// Picks the companion-folder name for pre-edit originals under
/// `directory`. Picasa mode prefers `.picasaoriginals`, but a legacy
/// `Originals` folder already at the destination keeps its name.
pub fn originals_folder_name<D: Destination>(
  dest: &D,
  cfg: &RunConfig,
  directory: &Path,
) -> &'static str {
  if cfg.picasa
    && (dest.is_dir(&directory.join(".picasaoriginals")) || !dest.is_dir(&directory.join("Originals")))
  {
    ".picasaoriginals"
  } else {
    "Originals"
  }
}

impl<'a> ExportDir<'a> {
  pub fn new(
    name: String,
    directory: PathBuf,
    folder_comment: String,
    originals_folder: &'static str,
  ) -> Self {
    Self {
      name,
      directory,
      folder_comment,
      originals_folder,
      files: BTreeMap::new(),
    }
  }

  /// Plans destination files for `images`, in order. Colliding names get
  /// `_N` suffixes, so two `Beach` images land as `Beach` and `Beach_1`.
  pub fn add_images(&mut self, images: &[&'a MediaItem], cfg: &RunConfig) {
    // Skipped movies leave no gaps in {index} numbering.
    let count = images
      .iter()
      .filter(|i| cfg.movies || !i.is_movie())
      .count();
    let mut index = 0;
    for image in images {
      if image.is_movie() && !cfg.movies {
        continue;
      }
      index += 1;

      let rendered =
        match naming::render_file_name(&cfg.nametemplate, image, &self.name, index, count) {
          Ok(name) => name,
          Err(e) => {
            log::warn!(
              "Unknown file name placeholder {{{}}} (valid: {}); using the template as is.",
              e.key,
              e.valid.join(", ")
            );
            cfg.nametemplate.clone()
          }
        };

      let base = naming::sanitize_name(naming::strip_media_extension(&rendered));
      let base = if base.is_empty() { "image".to_string() } else { base };
      let base = naming::make_unique(&base, SuffixStyle::Underscore, |candidate| {
        self.files.contains_key(&candidate.to_lowercase())
      });

      let extension = if matches!(cfg.mode, ContentMode::Resize(_)) && !image.is_movie() {
        "jpg".to_string()
      } else {
        image.extension()
      };

      let original_export_path = image
        .original_path
        .as_deref()
        .filter(|_| cfg.originals && !image.rotation_is_only_edit)
        .map(|original| {
          self
            .directory
            .join(self.originals_folder)
            .join(format!("{base}.{}", extension_of(original)))
        });

      self.files.insert(
        base.to_lowercase(),
        ExportFile {
          image,
          export_path: self.directory.join(format!("{base}.{extension}")),
          original_export_path,
          base_name: base,
        },
      );
    }
  }

  /// True when `name` (a destination directory entry) belongs to a planned
  /// file. Matches case insensitively.
  pub fn owns_file(&self, name: &str) -> bool {
    let name = name.to_lowercase();
    self.files.values().any(|f| {
      f.export_path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.to_lowercase() == name)
    })
  }

  /// Like [`ExportDir::owns_file`], for entries of the originals folder.
  pub fn owns_original(&self, name: &str) -> bool {
    let name = name.to_lowercase();
    self.files.values().any(|f| {
      f.original_export_path
        .as_deref()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.to_lowercase() == name)
    })
  }

  pub fn has_originals(&self) -> bool {
    self.files.values().any(|f| f.original_export_path.is_some())
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn image(id: &str, caption: &str) -> MediaItem {
    MediaItem::new(id.into(), format!("/lib/{id}.jpg").into(), caption.into())
  }

  #[test]
  fn colliding_names_get_suffixes() {
    let cfg = RunConfig::default();
    let a = image("1", "Beach");
    let b = image("2", "Beach");
    let c = image("3", "beach");
    let mut dir = ExportDir::new("Trip".into(), "/out/Trip".into(), String::new(), "Originals");

    dir.add_images(&[&a, &b, &c], &cfg);

    let names: Vec<_> = dir.files.values().map(|f| f.base_name.as_str()).collect();
    assert_eq!(names, ["Beach", "Beach_1", "beach_2"]);
  }

  #[test]
  fn resize_mode_exports_jpeg() {
    let cfg = RunConfig {
      mode: ContentMode::Resize(1600),
      ..RunConfig::default()
    };
    let a = MediaItem::new("1".into(), "/lib/raw.NEF".into(), "Shot".into());
    let mut dir = ExportDir::new("Trip".into(), "/out/Trip".into(), String::new(), "Originals");

    dir.add_images(&[&a], &cfg);

    let file = dir.files.values().next().unwrap();
    assert_eq!(file.export_path, PathBuf::from("/out/Trip/Shot.jpg"));
  }

  #[test]
  fn movies_can_be_skipped() {
    let cfg = RunConfig {
      movies: false,
      ..RunConfig::default()
    };
    let mut movie = image("1", "Clip");
    movie.kind = crate::prim::MediaKind::Movie;
    let mut dir = ExportDir::new("Trip".into(), "/out/Trip".into(), String::new(), "Originals");

    dir.add_images(&[&movie], &cfg);

    assert!(dir.files.is_empty());
  }

  #[test]
  fn originals_are_planned_into_companion_folder() {
    let cfg = RunConfig {
      originals: true,
      ..RunConfig::default()
    };
    let mut a = image("1", "Beach");
    a.original_path = Some("/lib/Originals/beach.CR2".into());
    let mut rotated = image("2", "Pier");
    rotated.original_path = Some("/lib/Originals/pier.jpg".into());
    rotated.rotation_is_only_edit = true;
    let mut dir = ExportDir::new("Trip".into(), "/out/Trip".into(), String::new(), "Originals");

    dir.add_images(&[&a, &rotated], &cfg);

    let beach = &dir.files["beach"];
    assert_eq!(
      beach.original_export_path,
      Some(PathBuf::from("/out/Trip/Originals/Beach.cr2"))
    );
    // A rotation-only edit leaves nothing worth exporting.
    assert!(dir.files["pier"].original_export_path.is_none());
    assert!(dir.owns_original("beach.cr2"));
    assert!(!dir.owns_original("pier.jpg"));
  }

  #[test]
  fn skipped_movies_leave_no_index_gaps() {
    let cfg = RunConfig {
      movies: false,
      nametemplate: "{index} {title}".into(),
      ..RunConfig::default()
    };
    let a = image("1", "Surf");
    let mut clip = image("2", "Clip");
    clip.kind = crate::prim::MediaKind::Movie;
    let b = image("3", "Dunes");
    let mut dir = ExportDir::new("Trip".into(), "/out/Trip".into(), String::new(), "Originals");

    dir.add_images(&[&a, &clip, &b], &cfg);

    let names: Vec<_> = dir.files.values().map(|f| f.base_name.as_str()).collect();
    assert_eq!(names, ["1 Surf", "2 Dunes"]);
  }

  #[test]
  fn picasa_mode_keeps_a_legacy_originals_folder() {
    use crate::dest::LocalDestination;

    let out = tempfile::tempdir().unwrap();
    let cfg = RunConfig {
      picasa: true,
      ..RunConfig::default()
    };

    assert_eq!(
      originals_folder_name(&LocalDestination, &cfg, out.path()),
      ".picasaoriginals"
    );

    std::fs::create_dir(out.path().join("Originals")).unwrap();
    assert_eq!(originals_folder_name(&LocalDestination, &cfg, out.path()), "Originals");

    std::fs::create_dir(out.path().join(".picasaoriginals")).unwrap();
    assert_eq!(
      originals_folder_name(&LocalDestination, &cfg, out.path()),
      ".picasaoriginals"
    );

    let plain = RunConfig::default();
    assert_eq!(originals_folder_name(&LocalDestination, &plain, out.path()), "Originals");
  }

  #[test]
  fn owns_file_matches_case_insensitively() {
    let cfg = RunConfig::default();
    let a = image("1", "Beach");
    let mut dir = ExportDir::new("Trip".into(), "/out/Trip".into(), String::new(), "Originals");

    dir.add_images(&[&a], &cfg);

    assert!(dir.owns_file("BEACH.JPG"));
    assert!(!dir.owns_file("other.jpg"));
  }
}
