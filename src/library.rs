// Copyright 2025-6 Seth Pendergrass. See LICENSE.

//! In-memory view of the photo library: images by id, the container tree,
//! and derived indexes. Read-only for the duration of a run.

use std::{
  cell::OnceCell,
  collections::{BTreeMap, HashMap},
};

use crate::{
  error::SetupError,
  prim::{Container, ContainerKind, MediaItem},
};

/// Library application versions this tool understands. Anything else fails
/// at startup rather than risking a wrong parse.
const SUPPORTED_VERSIONS: [&str; 4] = ["6.", "7.", "8.", "9."];

/// Face groups are synthesized, not stored; they get ids below this marker
/// to avoid colliding with real album ids.
const FACE_ALBUM_ID: i64 = -1;

pub struct Library {
  pub application_version: String,

  images: HashMap<String, MediaItem>,
  root:   Container,

  // Derived indexes, built on first query.
  by_base_name: OnceCell<HashMap<String, Vec<String>>>,
  by_file_name: OnceCell<HashMap<String, Vec<String>>>,
  face_albums:  OnceCell<Vec<Container>>,
}

impl Library {
  /// Wraps parsed library data. Fails if the declared application version is
  /// outside the supported set.
  pub fn new(
    application_version: String,
    images: HashMap<String, MediaItem>,
    root: Container,
  ) -> Result<Self, SetupError> {
    if !SUPPORTED_VERSIONS
      .iter()
      .any(|v| application_version.starts_with(v))
    {
      return Err(SetupError::UnsupportedVersion(application_version));
    }

    Ok(Self {
      application_version,
      images,
      root,
      by_base_name: OnceCell::new(),
      by_file_name: OnceCell::new(),
      face_albums: OnceCell::new(),
    })
  }

  pub fn image(&self, id: &str) -> Option<&MediaItem> {
    self.images.get(id)
  }

  pub fn images(&self) -> impl Iterator<Item = &MediaItem> {
    self.images.values()
  }

  pub fn image_count(&self) -> usize {
    self.images.len()
  }

  /// The root folder. Its children are the top-level events, albums and
  /// folders.
  pub fn root(&self) -> &Container {
    &self.root
  }

  /// All images whose primary file shares `base_name` (file name without
  /// extension).
  pub fn images_by_base_name(&self, base_name: &str) -> &[String] {
    let index = self.by_base_name.get_or_init(|| {
      let mut map: HashMap<String, Vec<String>> = HashMap::new();
      for image in self.images.values() {
        map
          .entry(image.base_name().to_string())
          .or_default()
          .push(image.id.clone());
      }
      map
    });
    index.get(base_name).map_or(&[], Vec::as_slice)
  }

  /// The first image whose primary file is named `file_name`, if any.
  pub fn named_image(&self, file_name: &str) -> Option<&MediaItem> {
    let index = self.by_file_name.get_or_init(|| {
      let mut map: HashMap<String, Vec<String>> = HashMap::new();
      for image in self.images.values() {
        map
          .entry(image.file_name().to_string())
          .or_default()
          .push(image.id.clone());
      }
      map
    });
    index
      .get(file_name)
      .and_then(|ids| ids.first())
      .and_then(|id| self.images.get(id))
  }

  /// Pseudo-containers, one per distinct face name across all images,
  /// synthesized on first call and cached for the run. Each is dated by its
  /// earliest member image and ordered by name.
  pub fn face_albums(&self) -> &[Container] {
    self.face_albums.get_or_init(|| {
      let mut by_name: BTreeMap<&str, Container> = BTreeMap::new();
      for image in self.images.values() {
        for name in image.face_names() {
          let album = by_name.entry(name).or_insert_with(|| {
            Container::new(name.to_string(), ContainerKind::Face, FACE_ALBUM_ID)
          });
          album.image_ids.push(image.id.clone());
          if image.date.is_some() && (album.date.is_none() || image.date < album.date) {
            album.date = image.date;
          }
        }
      }
      let mut albums: Vec<_> = by_name.into_values().collect();
      // Image iteration order is a hash map's; member lists must not be.
      for album in &mut albums {
        album.image_ids.sort();
      }
      albums
    })
  }

  /// Resolves a container's member ids to images, skipping ids that point
  /// nowhere (hidden or filtered-out images).
  pub fn resolve_images<'a>(&'a self, container: &Container) -> Vec<&'a MediaItem> {
    container
      .image_ids
      .iter()
      .filter_map(|id| self.images.get(id))
      .collect()
  }
}

#[cfg(test)]
mod test {
  use std::path::PathBuf;

  use super::*;
  use crate::prim::FaceRegion;

  fn image(id: &str, path: &str) -> MediaItem {
    MediaItem::new(id.to_string(), PathBuf::from(path), String::new())
  }

  fn library(images: Vec<MediaItem>) -> Library {
    let images = images.into_iter().map(|i| (i.id.clone(), i)).collect();
    let root = Container::new(String::new(), ContainerKind::Folder, 0);
    Library::new("9.4".to_string(), images, root).unwrap()
  }

  #[test]
  fn rejects_unsupported_version() {
    let root = Container::new(String::new(), ContainerKind::Folder, 0);
    let result = Library::new("5.0".to_string(), HashMap::new(), root);

    assert!(matches!(result, Err(SetupError::UnsupportedVersion(_))));
  }

  #[test]
  fn indexes_by_base_and_file_name() {
    let lib = library(vec![
      image("1", "a/IMG_1.jpg"),
      image("2", "b/IMG_1.jpg"),
      image("3", "a/IMG_2.jpg"),
    ]);

    assert_eq!(lib.images_by_base_name("IMG_1").len(), 2);
    assert_eq!(lib.images_by_base_name("IMG_9").len(), 0);
    assert!(lib.named_image("IMG_2.jpg").is_some());
  }

  #[test]
  fn synthesizes_face_albums() {
    let mut a = image("1", "a.jpg");
    a.faces = vec![FaceRegion {
      name: "Alice".to_string(),
      rect: [0.5, 0.5, 0.2, 0.2],
    }];
    let mut b = image("2", "b.jpg");
    b.faces = vec![
      FaceRegion {
        name: "Alice".to_string(),
        rect: [0.2, 0.5, 0.2, 0.2],
      },
      FaceRegion {
        name: "Bob".to_string(),
        rect: [0.7, 0.5, 0.2, 0.2],
      },
    ];
    let lib = library(vec![a, b]);

    let albums = lib.face_albums();

    assert_eq!(albums.len(), 2);
    assert_eq!(albums[0].name, "Alice");
    assert_eq!(albums[0].image_ids, ["1", "2"]);
    assert_eq!(albums[1].name, "Bob");
    assert_eq!(albums[1].image_ids, ["2"]);
    assert_eq!(albums[0].kind, ContainerKind::Face);
  }
}
