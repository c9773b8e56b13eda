// Copyright 2025-6 Seth Pendergrass. See LICENSE.

//! Loads the library descriptor (`AlbumData.xml`) into a [`Library`].
//!
//! The descriptor is an Apple property list; `plutil` converts it to JSON so
//! it can be deserialized with `serde_json`, the same way the exiftool
//! wrapper consumes `-json` output. Everything after the conversion is pure
//! and unit tested from JSON literals.

use std::{
  collections::{HashMap, HashSet},
  path::{Path, PathBuf},
  process::Command,
  sync::LazyLock,
};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Deserialize;

use crate::{
  error::SetupError,
  library::Library,
  prim::{Container, ContainerKind, FaceRegion, GpsLocation, MediaItem, MediaKind},
};

/// Captions in `YYYYMMDD title` form carry a usable date for images the
/// database has none for.
static CAPTION_DATE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^([12]\d{3})([01]\d)([0-3]\d) ").unwrap());

/// Apple timer intervals count seconds from 2001-01-01.
fn apple_time(interval: f64) -> Option<NaiveDateTime> {
  let epoch = NaiveDate::from_ymd_opt(2001, 1, 1)?.and_hms_opt(0, 0, 0)?;
  epoch.checked_add_signed(Duration::seconds(interval as i64))
}

//
// Raw plist-shaped data. Key names are Apple's.
//

#[derive(Deserialize)]
struct RawLibrary {
  #[serde(rename = "Application Version")]
  application_version: String,

  #[serde(rename = "Master Image List", default)]
  images: HashMap<String, RawImage>,

  #[serde(rename = "List of Albums", default)]
  albums: Vec<RawAlbum>,

  #[serde(rename = "List of Rolls", default)]
  rolls: Vec<RawRoll>,

  #[serde(rename = "List of Keywords", default)]
  keywords: HashMap<String, String>,

  #[serde(rename = "List of Faces", default)]
  faces: HashMap<String, RawFace>,
}

#[derive(Deserialize)]
struct RawImage {
  #[serde(rename = "Caption", default)]
  caption: String,

  #[serde(rename = "Comment", default)]
  comment: String,

  #[serde(rename = "ImagePath")]
  image_path: PathBuf,

  #[serde(rename = "OriginalPath")]
  original_path: Option<PathBuf>,

  #[serde(rename = "DateAsTimerInterval")]
  date: Option<f64>,

  #[serde(rename = "Rating")]
  rating: Option<i64>,

  latitude:  Option<f64>,
  longitude: Option<f64>,

  #[serde(rename = "Keywords", default)]
  keywords: Vec<String>,

  #[serde(rename = "Faces", default)]
  faces: Vec<RawImageFace>,

  #[serde(rename = "MediaType")]
  media_type: Option<String>,

  #[serde(rename = "RotationIsOnlyEdit", default)]
  rotation_is_only_edit: bool,
}

#[derive(Deserialize)]
struct RawImageFace {
  #[serde(rename = "face key")]
  key: i64,

  rectangle: Option<String>,
}

#[derive(Deserialize)]
struct RawFace {
  key:  i64,
  name: String,
}

#[derive(Deserialize)]
struct RawAlbum {
  #[serde(rename = "AlbumName")]
  name: Option<String>,

  #[serde(rename = "Album Type")]
  album_type: Option<String>,

  #[serde(rename = "AlbumId")]
  id: i64,

  #[serde(rename = "Parent")]
  parent: Option<i64>,

  #[serde(rename = "KeyList", default)]
  key_list: Vec<String>,

  #[serde(rename = "Comments")]
  comment: Option<String>,

  #[serde(rename = "Master", default)]
  master: bool,
}

#[derive(Deserialize)]
struct RawRoll {
  #[serde(rename = "RollName")]
  name: Option<String>,

  #[serde(rename = "AlbumName")]
  album_name: Option<String>,

  #[serde(rename = "RollID")]
  id: Option<i64>,

  #[serde(rename = "AlbumId")]
  album_id: Option<i64>,

  #[serde(rename = "RollDateAsTimerInterval")]
  date: Option<f64>,

  #[serde(rename = "KeyList", default)]
  key_list: Vec<String>,

  #[serde(rename = "Comments")]
  comment: Option<String>,
}

//
// Public.
//

/// Locates and loads the library descriptor under `library_dir`. If
/// `ratings` is set, only images with a matching rating become container
/// members.
pub fn load_library(
  library_dir: &Path,
  ratings: Option<&HashSet<u8>>,
) -> Result<Library, SetupError> {
  let descriptor = library_dir.join("AlbumData.xml");
  if !descriptor.is_file() {
    return Err(SetupError::LibraryNotFound(library_dir.to_path_buf()));
  }

  log::info!("Reading library data from {}.", descriptor.display());
  let json = plist_to_json(&descriptor)?;
  let raw: RawLibrary =
    serde_json::from_slice(&json).map_err(|e| SetupError::LibraryUnreadable {
      path:   descriptor.clone(),
      reason: e.to_string(),
    })?;

  build(raw, ratings)
}

/// Converts a property list to JSON via `plutil`.
fn plist_to_json(path: &Path) -> Result<Vec<u8>, SetupError> {
  let output = Command::new("plutil")
    .args(["-convert", "json", "-o", "-"])
    .arg(path)
    .output()
    .map_err(|e| SetupError::LibraryUnreadable {
      path:   path.to_path_buf(),
      reason: format!("failed to run plutil: {e}"),
    })?;

  if !output.status.success() {
    return Err(SetupError::LibraryUnreadable {
      path:   path.to_path_buf(),
      reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    });
  }

  Ok(output.stdout)
}

//
// Private.
//

/// Assembles the raw plist data into a `Library`.
fn build(raw: RawLibrary, ratings: Option<&HashSet<u8>>) -> Result<Library, SetupError> {
  let face_names: HashMap<i64, &str> = raw
    .faces
    .values()
    .map(|f| (f.key, f.name.as_str()))
    .collect();

  let mut images: HashMap<String, MediaItem> = HashMap::new();
  for (id, data) in &raw.images {
    images.insert(id.clone(), build_image(id, data, &raw.keywords, &face_names));
  }

  let mut root = Container::new(String::new(), ContainerKind::Folder, 0);
  root.children = build_album_tree(&raw.albums);

  for event in build_events(&raw.rolls, &mut images) {
    root.children.push(event);
  }

  if let Some(ratings) = ratings {
    filter_by_rating(&mut root, &images, ratings);
  }

  resolve_dates(&mut root, &images);

  Library::new(raw.application_version, images, root)
}

fn build_image(
  id: &str,
  data: &RawImage,
  keyword_names: &HashMap<String, String>,
  face_names: &HashMap<i64, &str>,
) -> MediaItem {
  let mut item = MediaItem::new(
    id.to_string(),
    data.image_path.clone(),
    data.caption.trim().to_string(),
  );

  item.comment = data.comment.trim().to_string();
  item.original_path = data.original_path.clone();
  item.date = data.date.and_then(apple_time).or_else(|| caption_date(item.caption()));
  item.rating = data.rating.and_then(|r| u8::try_from(r).ok()).filter(|r| *r <= 5);
  item.rotation_is_only_edit = data.rotation_is_only_edit;
  if data.media_type.as_deref() == Some("Movie") {
    item.kind = MediaKind::Movie;
  }

  if let (Some(lat), Some(lon)) = (data.latitude, data.longitude) {
    item.gps = Some(GpsLocation::new(lat, lon));
  }

  for key in &data.keywords {
    match keyword_names.get(key) {
      Some(name) => item.keywords.push(name.clone()),
      None => log::debug!("{item}: unknown keyword id {key}."),
    }
  }

  for face in &data.faces {
    let Some(name) = face_names.get(&face.key) else {
      continue;
    };
    let Some(rect) = face.rectangle.as_deref().map(parse_face_rectangle) else {
      continue;
    };
    item.faces.push(FaceRegion {
      name: (*name).to_string(),
      rect,
    });
  }
  item.sort_faces();

  item
}

/// Recovers a capture date from a `YYYYMMDD ...` caption prefix.
fn caption_date(caption: &str) -> Option<NaiveDateTime> {
  let caps = CAPTION_DATE.captures(caption)?;
  let year: i32 = caps[1].parse().ok()?;
  let month: u32 = caps[2].parse::<u32>().ok()?.max(1);
  let day: u32 = caps[3].parse::<u32>().ok()?.max(1);
  NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)
}

/// Parses a `{{x, y}, {width, height}}` rectangle, anchored at the image's
/// lower-left corner, into a center-based rectangle measured from the
/// top-left corner.
fn parse_face_rectangle(raw: &str) -> [f64; 4] {
  let parts: Vec<f64> = raw
    .split(',')
    .map(|p| p.trim_matches(|c: char| c == '{' || c == '}' || c.is_whitespace()))
    .filter_map(|p| p.parse().ok())
    .collect();

  let [x, y, w, h] = parts.as_slice() else {
    log::warn!("Failed to parse face rectangle: {raw}");
    return [0.4, 0.4, 0.2, 0.2];
  };

  [x + w / 2.0, (1.0 - y - h / 2.0).max(0.0), *w, *h]
}

/// Albums nest via `Parent` ids; rebuild the tree under the root. Albums
/// whose parent is missing are attached to the root with a warning.
fn build_album_tree(albums: &[RawAlbum]) -> Vec<Container> {
  let mut nodes: HashMap<i64, Container> = HashMap::new();
  let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
  let mut top: Vec<i64> = Vec::new();

  for album in albums {
    let name = album.name.clone().unwrap_or_else(|| {
      log::warn!("Found an album with no name: {}", album.id);
      "xxx".to_string()
    });

    let kind = if album.master {
      ContainerKind::Special
    } else {
      ContainerKind::from_album_type(album.album_type.as_deref().unwrap_or("Regular"))
    };

    let mut container = Container::new(name, kind, album.id);
    container.comment = album.comment.clone().unwrap_or_default();
    container.image_ids = album.key_list.clone();
    nodes.insert(album.id, container);

    match album.parent {
      Some(parent) => children.entry(parent).or_default().push(album.id),
      None => top.push(album.id),
    }
  }

  // Parents referenced but never defined: promote their children to the top.
  let orphans: Vec<i64> = children
    .keys()
    .filter(|id| !nodes.contains_key(id))
    .copied()
    .collect();
  for parent in orphans {
    log::warn!("Albums reference missing parent {parent}.");
    top.extend(children.remove(&parent).unwrap_or_default());
  }

  top
    .iter()
    .filter_map(|id| take_subtree(*id, &mut nodes, &children))
    .collect()
}

fn take_subtree(
  id: i64,
  nodes: &mut HashMap<i64, Container>,
  children: &HashMap<i64, Vec<i64>>,
) -> Option<Container> {
  let mut container = nodes.remove(&id)?;
  if let Some(kids) = children.get(&id) {
    for kid in kids {
      if let Some(child) = take_subtree(*kid, nodes, children) {
        container.children.push(child);
      }
    }
  }
  Some(container)
}

/// Builds event containers from the roll list, merging rolls that share an
/// id (some library versions split one event into many small rolls), and
/// assigns per-image event names and indexes.
fn build_events(rolls: &[RawRoll], images: &mut HashMap<String, MediaItem>) -> Vec<Container> {
  let mut events: Vec<Container> = Vec::new();
  let mut by_id: HashMap<i64, usize> = HashMap::new();

  for roll in rolls {
    let id = roll.id.or(roll.album_id).unwrap_or(-1);
    let name = roll
      .name
      .clone()
      .or_else(|| roll.album_name.clone())
      .unwrap_or_default();

    if let Some(index) = by_id.get(&id) {
      events[*index].image_ids.extend(roll.key_list.iter().cloned());
      continue;
    }

    let mut event = Container::new(name, ContainerKind::Event, id);
    event.comment = roll.comment.clone().unwrap_or_default();
    event.date = roll.date.and_then(apple_time);
    event.image_ids = roll.key_list.clone();
    by_id.insert(id, events.len());
    events.push(event);
  }

  for event in &events {
    let digits = event.image_ids.len().to_string().len();
    let mut index = 0;
    for id in &event.image_ids {
      let Some(image) = images.get_mut(id) else {
        continue;
      };
      index += 1;
      image.event_name = event.name.clone();
      image.event_index = index;
      image.event_index0 = format!("{index:0digits$}");
    }
  }

  events
}

/// Drops container members whose rating is not in the requested set.
fn filter_by_rating(
  container: &mut Container,
  images: &HashMap<String, MediaItem>,
  ratings: &HashSet<u8>,
) {
  container.image_ids.retain(|id| {
    images
      .get(id)
      .and_then(|i| i.rating)
      .is_some_and(|r| ratings.contains(&r))
  });
  for child in &mut container.children {
    filter_by_rating(child, images, ratings);
  }
}

/// Containers without an explicit date take the earliest member image date.
fn resolve_dates(container: &mut Container, images: &HashMap<String, MediaItem>) {
  if container.date.is_none() {
    container.date = container
      .image_ids
      .iter()
      .filter_map(|id| images.get(id).and_then(|i| i.date))
      .min();
  }
  for child in &mut container.children {
    resolve_dates(child, images);
  }
}
