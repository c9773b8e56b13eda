// Copyright 2025-6 Seth Pendergrass. See LICENSE.

//! A single image or movie in the source library, together with the
//! descriptive attributes the export engine reconciles (GPS, faces,
//! keywords, rating).

use core::fmt;
use std::{
  fmt::{Display, Formatter},
  path::{Path, PathBuf},
};

use chrono::NaiveDateTime;

/// A face rectangle in normalized image coordinates: center x, center y
/// (measured from the top-left corner), width, height.
pub type FaceRect = [f64; 4];

/// A named face rectangle within an image.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceRegion {
  pub name: String,
  pub rect: FaceRect,
}

/// A GPS location (no altitude), in signed decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GpsLocation {
  pub latitude:  f64,
  pub longitude: f64,
}

impl GpsLocation {
  pub fn new(latitude: f64, longitude: f64) -> Self {
    Self {
      latitude,
      longitude,
    }
  }

  pub fn latitude_ref(&self) -> char {
    if self.latitude >= 0.0 { 'N' } else { 'S' }
  }

  pub fn longitude_ref(&self) -> char {
    if self.longitude >= 0.0 { 'E' } else { 'W' }
  }

  /// Tests whether two locations are the same within `tolerance` degrees.
  /// Coordinates round-trip through decimal text, so exact equality is
  /// meaningless.
  pub fn is_same(&self, other: &GpsLocation, tolerance: f64) -> bool {
    (self.latitude - other.latitude).abs() <= tolerance
      && (self.longitude - other.longitude).abs() <= tolerance
  }
}

impl Display for GpsLocation {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
  Image,
  Movie,
}

/// An image in the source library. Built once at load time; immutable for
/// the duration of a run.
#[derive(Clone, Debug)]
pub struct MediaItem {
  pub id:   String,
  /// Path to the primary media file. If `original_path` is set, this is the
  /// edited/preview rendition, never the reverse.
  pub path: PathBuf,
  /// Pre-edit file, exported into the Originals companion folder.
  pub original_path: Option<PathBuf>,

  pub date:     Option<NaiveDateTime>,
  pub rating:   Option<u8>,
  pub gps:      Option<GpsLocation>,
  pub keywords: Vec<String>,
  /// Face regions, sorted left to right. See [`MediaItem::sort_faces`].
  pub faces:    Vec<FaceRegion>,

  caption:     String,
  pub comment: String,
  pub kind:    MediaKind,

  /// The only edit is a rotation, so the "original" is not worth exporting.
  pub rotation_is_only_edit: bool,

  // Filled in when events are assembled.
  pub event_name:   String,
  pub event_index:  usize,
  /// `event_index`, zero-padded to the width of the event size.
  pub event_index0: String,
}

impl MediaItem {
  pub fn new(id: String, path: PathBuf, caption: String) -> Self {
    Self {
      id,
      path,
      original_path: None,
      date: None,
      rating: None,
      gps: None,
      keywords: Vec::new(),
      faces: Vec::new(),
      caption,
      comment: String::new(),
      kind: MediaKind::Image,
      rotation_is_only_edit: false,
      event_name: String::new(),
      event_index: 0,
      event_index0: String::new(),
    }
  }

  /// The image title. Falls back to the file name for untitled images, so
  /// name templates always have something to work with.
  pub fn caption(&self) -> &str {
    if self.caption.is_empty() {
      self.file_name()
    } else {
      &self.caption
    }
  }

  /// File name of the primary media file.
  pub fn file_name(&self) -> &str {
    self
      .path
      .file_name()
      .and_then(|n| n.to_str())
      .unwrap_or_default()
  }

  /// File name of the primary media file without its extension.
  pub fn base_name(&self) -> &str {
    self
      .path
      .file_stem()
      .and_then(|n| n.to_str())
      .unwrap_or_default()
  }

  /// Lowercased extension of the primary media file.
  pub fn extension(&self) -> String {
    extension_of(&self.path)
  }

  pub fn is_movie(&self) -> bool {
    self.kind == MediaKind::Movie
  }

  pub fn face_names(&self) -> impl Iterator<Item = &str> {
    self.faces.iter().map(|f| f.name.as_str())
  }

  /// Orders face regions left to right by horizontal center. The sort is
  /// stable, so regions sharing a center keep their source order; re-running
  /// over the same input always yields the same sequence.
  pub fn sort_faces(&mut self) {
    self.faces.sort_by(|a, b| a.rect[0].total_cmp(&b.rect[0]));
  }
}

impl AsRef<Path> for MediaItem {
  fn as_ref(&self) -> &Path {
    &self.path
  }
}

impl Display for MediaItem {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    write!(f, "{}", self.path.display())
  }
}

/// Lowercased extension of a path, or the empty string.
pub fn extension_of(path: &Path) -> String {
  path
    .extension()
    .and_then(|e| e.to_str())
    .map(str::to_lowercase)
    .unwrap_or_default()
}

#[cfg(test)]
mod test {
  use super::*;

  fn region(name: &str, x: f64) -> FaceRegion {
    FaceRegion {
      name: name.to_string(),
      rect: [x, 0.5, 0.2, 0.2],
    }
  }

  #[test]
  fn sorts_faces_left_to_right() {
    let mut item = MediaItem::new("1".into(), PathBuf::from("a.jpg"), String::new());
    item.faces = vec![region("Carol", 0.9), region("Alice", 0.1), region("Bob", 0.5)];

    item.sort_faces();

    let names: Vec<_> = item.face_names().collect();
    assert_eq!(names, ["Alice", "Bob", "Carol"]);
  }

  #[test]
  fn face_sort_is_stable_for_equal_centers() {
    let mut item = MediaItem::new("1".into(), PathBuf::from("a.jpg"), String::new());
    item.faces = vec![region("First", 0.5), region("Second", 0.5)];

    item.sort_faces();
    item.sort_faces();

    let names: Vec<_> = item.face_names().collect();
    assert_eq!(names, ["First", "Second"]);
  }

  #[test]
  fn caption_falls_back_to_file_name() {
    let item = MediaItem::new("1".into(), PathBuf::from("dir/IMG_0001.JPG"), String::new());
    assert_eq!(item.caption(), "IMG_0001.JPG");

    let item = MediaItem::new("1".into(), PathBuf::from("dir/IMG_0001.JPG"), "Beach".into());
    assert_eq!(item.caption(), "Beach");
  }

  #[test]
  fn gps_tolerance() {
    let a = GpsLocation::new(47.6061, -122.3328);
    let near = GpsLocation::new(47.60615, -122.3328);
    let far = GpsLocation::new(47.6071, -122.3328);

    assert!(a.is_same(&near, 1e-4));
    assert!(!a.is_same(&far, 1e-4));
  }

  #[test]
  fn gps_refs() {
    let loc = GpsLocation::new(-33.9, 151.2);
    assert_eq!(loc.latitude_ref(), 'S');
    assert_eq!(loc.longitude_ref(), 'E');
  }
}
