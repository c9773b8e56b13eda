// Copyright 2025-6 Seth Pendergrass. See LICENSE.

//! Compares a library image's attributes against the tags embedded in an
//! exported file and computes the minimal patch to bring the file in line.
//!
//! Comparisons are lenient where round-tripping through a file loses
//! precision: strings are trimmed, keywords compare as sets, GPS and face
//! rectangles within tolerance count as equal.

use std::collections::HashSet;

use chrono::NaiveDateTime;

use crate::{
  config::RunConfig,
  naming,
  prim::{extension_of, FaceRect, GpsLocation, MediaItem},
};

/// Extensions exiftool can reliably embed tags into. Everything else is
/// exported content-only.
const EMBEDDABLE: [&str; 7] = ["jpg", "jpeg", "tif", "tiff", "png", "nef", "cr2"];

pub fn is_embeddable(path: &std::path::Path) -> bool {
  EMBEDDABLE.contains(&extension_of(path).as_str())
}

/// Tags read back from an exported file.
#[derive(Debug, Default)]
pub struct IptcData {
  pub caption:            String,
  pub keywords:           Vec<String>,
  pub date_time_original: Option<NaiveDateTime>,
  pub rating:             Option<u8>,
  pub gps:                Option<GpsLocation>,
  pub region_names:       Vec<String>,
  pub region_rects:       Vec<FaceRect>,
  pub image_width:        u32,
  pub image_height:       u32,
}

/// The set of tags to rewrite. `None` fields are left untouched in the
/// file; region names and rectangles always travel together.
#[derive(Debug, Default, PartialEq)]
pub struct TagPatch {
  pub caption:            Option<String>,
  pub keywords:           Option<Vec<String>>,
  pub date_time_original: Option<NaiveDateTime>,
  pub rating:             Option<u8>,
  pub gps:                Option<GpsLocation>,
  pub regions:            Option<Vec<(String, FaceRect)>>,
}

impl TagPatch {
  pub fn is_empty(&self) -> bool {
    self.caption.is_none()
      && self.keywords.is_none()
      && self.date_time_original.is_none()
      && self.rating.is_none()
      && self.gps.is_none()
      && self.regions.is_none()
  }
}

/// Computes the patch needed to align `data` (read from the exported file)
/// with `image`. Returns `None` when nothing needs rewriting. Face regions
/// are never written to a pre-edit original, whose pixels do not line up
/// with the library's rectangles.
pub fn diff(
  image: &MediaItem,
  folder_comment: &str,
  data: &IptcData,
  cfg: &RunConfig,
  is_original: bool,
) -> Option<TagPatch> {
  let mut patch = TagPatch::default();

  let caption = match naming::render_caption(&cfg.captiontemplate, image, folder_comment) {
    Ok(c) => c,
    Err(e) => {
      log::warn!(
        "Unknown caption placeholder {{{}}} (valid: {}); using the template as is.",
        e.key,
        e.valid.join(", ")
      );
      cfg.captiontemplate.clone()
    }
  };
  if caption.trim() != data.caption.trim() {
    patch.caption = Some(caption);
  }

  let keywords = wanted_keywords(image, cfg);
  if !keyword_sets_match(&keywords, &data.keywords) {
    let mut keywords: Vec<String> = keywords.into_iter().collect();
    keywords.sort();
    patch.keywords = Some(keywords);
  }

  if let Some(date) = image.date {
    if data.date_time_original != Some(date) {
      patch.date_time_original = Some(date);
    }
  }

  // A rating is only pushed when the library has one; an unrated library
  // image never clears a rating someone set on the file.
  if let Some(rating) = image.rating {
    if data.rating != Some(rating) {
      patch.rating = Some(rating);
    }
  }

  if cfg.gps {
    if let Some(gps) = image.gps {
      let matches = data
        .gps
        .is_some_and(|d| d.is_same(&gps, cfg.gps_tolerance));
      if !matches {
        patch.gps = Some(gps);
      }
    }
  }

  if cfg.faces && !is_original && !regions_match(image, data, cfg.region_epsilon) {
    patch.regions = Some(
      image
        .faces
        .iter()
        .map(|f| (f.name.clone(), f.rect))
        .collect(),
    );
  }

  if patch.is_empty() { None } else { Some(patch) }
}

/// The keyword set an exported file should carry: library keywords, plus
/// face names when enabled.
fn wanted_keywords(image: &MediaItem, cfg: &RunConfig) -> HashSet<String> {
  let mut keywords: HashSet<String> =
    image.keywords.iter().map(|k| k.trim().to_string()).collect();
  if cfg.face_keywords {
    keywords.extend(image.face_names().map(str::to_string));
  }
  keywords.remove("");
  keywords
}

/// Keywords compare as trimmed sets; order and duplicates in the file are
/// not differences.
fn keyword_sets_match(wanted: &HashSet<String>, found: &[String]) -> bool {
  let found: HashSet<&str> = found
    .iter()
    .map(|k| k.trim())
    .filter(|k| !k.is_empty())
    .collect();
  wanted.len() == found.len() && wanted.iter().all(|k| found.contains(k.as_str()))
}

/// Regions compare pairwise in order. Any difference in names, count, or a
/// rectangle component beyond `epsilon` means the whole list is rewritten.
fn regions_match(image: &MediaItem, data: &IptcData, epsilon: f64) -> bool {
  if image.faces.len() != data.region_names.len()
    || image.faces.len() != data.region_rects.len()
  {
    return false;
  }
  image.faces.iter().zip(&data.region_names).all(|(f, n)| f.name == *n)
    && image
      .faces
      .iter()
      .zip(&data.region_rects)
      .all(|(f, r)| f.rect.iter().zip(r).all(|(a, b)| (a - b).abs() <= epsilon))
}
