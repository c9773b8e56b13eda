// Copyright 2025-6 Seth Pendergrass. See LICENSE.

//! Containers group images in the source library: events, albums, folders,
//! and synthesized face groups. One tagged type covers them all; the album
//! walk dispatches on [`ContainerKind`].

use chrono::NaiveDateTime;

/// Marker prefixing a comment line that names the folder an album should be
/// exported into.
const FOLDER_HINT_MARKER: char = '@';

/// The closed set of container types found in (or synthesized over) the
/// library data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerKind {
  /// Import batch (roll). Every image belongs to exactly one.
  Event,
  /// User-created album.
  Regular,
  /// Album published to a web service.
  Published,
  /// Rule-defined album.
  Smart,
  /// Structural container holding other containers, never images.
  Folder,
  /// Synthesized container for one recognized person.
  Face,
  /// System albums (Last Import, Flagged, ...). Never exported.
  Special,
}

impl ContainerKind {
  /// Maps the library's album-type string onto the closed set. Unknown
  /// types land in `Special` and are never exported.
  pub fn from_album_type(album_type: &str) -> Self {
    match album_type {
      "Event" => Self::Event,
      "Regular" => Self::Regular,
      "Published" => Self::Published,
      "Smart" => Self::Smart,
      "Folder" => Self::Folder,
      "Face" => Self::Face,
      _ => Self::Special,
    }
  }
}

/// An event, album, folder, or face group.
#[derive(Clone, Debug)]
pub struct Container {
  pub name: String,
  pub kind: ContainerKind,
  pub id:   i64,

  /// Free-text comment; may carry folder-hint lines.
  pub comment: String,

  /// Explicit container date, or the earliest member image date. Resolved
  /// when the library is assembled.
  pub date: Option<NaiveDateTime>,

  /// Member image ids, in library order. Folders have none.
  pub image_ids: Vec<String>,

  /// Child containers. Only folders (and the root) have any.
  pub children: Vec<Container>,
}

impl Container {
  pub fn new(name: String, kind: ContainerKind, id: i64) -> Self {
    Self {
      name,
      kind,
      id,
      comment: String::new(),
      date: None,
      image_ids: Vec::new(),
      children: Vec::new(),
    }
  }

  pub fn is_folder(&self) -> bool {
    self.kind == ContainerKind::Folder
  }

  /// A folder name suggested by a `@`-prefixed comment line, if any.
  pub fn folder_hint(&self) -> Option<&str> {
    self
      .comment
      .lines()
      .find_map(|l| l.strip_prefix(FOLDER_HINT_MARKER))
  }

  /// The comment with any folder-hint lines removed.
  pub fn comment_without_hints(&self) -> String {
    self
      .comment
      .lines()
      .filter(|l| !l.starts_with(FOLDER_HINT_MARKER))
      .collect::<Vec<_>>()
      .join("\n")
  }
}
