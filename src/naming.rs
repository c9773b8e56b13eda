// Copyright 2025-6 Seth Pendergrass. See LICENSE.

//! Renders folder names, file names, and captions from user templates, and
//! sanitizes the results for the filesystem.
//!
//! Template handling fails closed: a template with an unrecognized
//! placeholder is reported to the caller instead of silently rendering with
//! a hole in it.

use std::{fmt::Write as _, sync::LazyLock};

use chrono::NaiveDateTime;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::prim::{Container, MediaItem};

static PLACEHOLDER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\{([a-z_0-9]+)\}").unwrap());

/// Media file extensions a title may carry which should not appear in
/// rendered names.
const MEDIA_EXTENSIONS: [&str; 9] =
  ["jpg", "jpeg", "tif", "tiff", "png", "nef", "cr2", "mov", "mp4"];

/// An unrecognized `{placeholder}`; `valid` lists the keys this context
/// accepts.
#[derive(Debug, PartialEq)]
pub struct UnknownPlaceholder {
  pub key:   String,
  pub valid: &'static [&'static str],
}

/// How [`make_unique`] disambiguates a taken name.
#[derive(Clone, Copy, PartialEq)]
pub enum SuffixStyle {
  /// `name_1`, `name_2`, ... (files).
  Underscore,
  /// `name_(1)`, `name_(2)`, ... (folders).
  Parens,
}

//
// Template rendering.
//

const FOLDER_KEYS: [&str; 7] =
  ["name", "album", "nodate_name", "hint", "yyyy", "mm", "dd"];

/// Renders a folder name for `container`. `hint` is the `@`-prefixed
/// comment override, if any.
pub fn render_folder_name(
  template: &str,
  container: &Container,
  hint: Option<&str>,
) -> Result<String, UnknownPlaceholder> {
  render(template, &FOLDER_KEYS, |key| match key {
    "name" | "album" => Some(container.name.clone()),
    "nodate_name" => Some(strip_date_prefix(&container.name).to_string()),
    "hint" => Some(hint.unwrap_or(&container.name).to_string()),
    "yyyy" | "mm" | "dd" => date_part(key, container.date),
    _ => None,
  })
}

const FILE_KEYS: [&str; 13] = [
  "title", "caption", "index", "index0", "event", "nodate_event", "event_index",
  "event_index0", "album", "nodate_album", "yyyy", "mm", "dd",
];

/// Renders a file name (without extension) for `image` as member `index`
/// (1-based) of `album_name`.
pub fn render_file_name(
  template: &str,
  image: &MediaItem,
  album_name: &str,
  index: usize,
  count: usize,
) -> Result<String, UnknownPlaceholder> {
  render(template, &FILE_KEYS, |key| match key {
    "title" | "caption" => Some(strip_media_extension(image.caption()).to_string()),
    "index" => Some(index.to_string()),
    "index0" => {
      let digits = count.to_string().len();
      Some(format!("{index:0digits$}"))
    }
    "event" => Some(image.event_name.clone()),
    "nodate_event" => Some(strip_date_prefix(&image.event_name).to_string()),
    "event_index" => Some(image.event_index.to_string()),
    "event_index0" => Some(image.event_index0.clone()),
    "album" => Some(album_name.to_string()),
    "nodate_album" => Some(strip_date_prefix(album_name).to_string()),
    "yyyy" | "mm" | "dd" => date_part(key, image.date),
    _ => None,
  })
}

const CAPTION_KEYS: [&str; 10] = [
  "title", "description", "title_description", "nodate_title_description",
  "folder_description", "face_list", "opt_face_list", "yyyy", "mm", "dd",
];

/// Renders the caption written into exported metadata. `folder_comment` is
/// the description of the containing folder, with hints stripped.
pub fn render_caption(
  template: &str,
  image: &MediaItem,
  folder_comment: &str,
) -> Result<String, UnknownPlaceholder> {
  let title = strip_media_extension(image.caption());
  render(template, &CAPTION_KEYS, |key| match key {
    "title" => Some(title.to_string()),
    "description" => Some(image.comment.clone()),
    "title_description" => Some(join_title_description(title, &image.comment)),
    "nodate_title_description" => Some(join_title_description(
      strip_caption_date(title),
      &image.comment,
    )),
    "folder_description" => Some(folder_comment.to_string()),
    "face_list" => Some(face_list(image)),
    "opt_face_list" => {
      if faces_in_comment(image) {
        Some(String::new())
      } else {
        Some(face_list(image))
      }
    }
    "yyyy" | "mm" | "dd" => date_part(key, image.date),
    _ => None,
  })
}

fn render(
  template: &str,
  valid: &'static [&'static str],
  mut value: impl FnMut(&str) -> Option<String>,
) -> Result<String, UnknownPlaceholder> {
  let mut out = String::new();
  let mut last = 0;
  for caps in PLACEHOLDER.captures_iter(template) {
    let m = caps.get(0).unwrap();
    let key = &caps[1];
    let Some(v) = value(key) else {
      return Err(UnknownPlaceholder {
        key: key.to_string(),
        valid,
      });
    };
    out.push_str(&template[last..m.start()]);
    out.push_str(&v);
    last = m.end();
  }
  out.push_str(&template[last..]);
  Ok(out)
}

fn date_part(key: &str, date: Option<NaiveDateTime>) -> Option<String> {
  // A known key with no date renders empty rather than failing the template.
  let Some(date) = date else {
    return Some(String::new());
  };
  Some(match key {
    "yyyy" => date.format("%Y").to_string(),
    "mm" => date.format("%m").to_string(),
    "dd" => date.format("%d").to_string(),
    _ => return None,
  })
}

fn join_title_description(title: &str, description: &str) -> String {
  match (title.is_empty(), description.is_empty()) {
    (true, _) => description.to_string(),
    (_, true) => title.to_string(),
    _ => format!("{title}: {description}"),
  }
}

/// `(Alice, Bob)`, or the empty string for a faceless image.
fn face_list(image: &MediaItem) -> String {
  let mut names = String::new();
  for name in image.face_names() {
    if !names.is_empty() {
      names.push_str(", ");
    }
    names.push_str(name);
  }
  if names.is_empty() {
    String::new()
  } else {
    format!("({names})")
  }
}

/// True when every face is already mentioned in the image comment, by full
/// name or first name.
fn faces_in_comment(image: &MediaItem) -> bool {
  if image.faces.is_empty() {
    return true;
  }
  if image.comment.is_empty() {
    return false;
  }
  image.face_names().all(|face| {
    let first = face.split(' ').next().unwrap_or(face);
    image.comment.contains(face) || image.comment.contains(first)
  })
}

//
// Sanitization.
//

/// Drops a leading `YYYY ` year from names like `2019 Road Trip`.
pub fn strip_date_prefix(name: &str) -> &str {
  let bytes = name.as_bytes();
  if bytes.len() > 5
    && bytes[..4].iter().all(u8::is_ascii_digit)
    && bytes[4] == b' '
  {
    &name[5..]
  } else {
    name
  }
}

/// Drops a leading `YYYYMMDD ` date from caption titles.
pub fn strip_caption_date(title: &str) -> &str {
  let bytes = title.as_bytes();
  if bytes.len() > 9
    && bytes[..8].iter().all(u8::is_ascii_digit)
    && bytes[8] == b' '
  {
    title[9..].trim_start()
  } else {
    title
  }
}

/// Removes a trailing media extension from a title, so `beach.jpg` renders
/// as `beach`.
pub fn strip_media_extension(title: &str) -> &str {
  if let Some((stem, ext)) = title.rsplit_once('.') {
    if !stem.is_empty() && MEDIA_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
      return stem;
    }
  }
  title
}

/// Sanitizes one path component. Alphanumerics and whitespace pass
/// through; `:` becomes `.`, `/` and `-` become `-`, everything else
/// becomes a space. The result is NFC normalized and trimmed, so `..`
/// and friends collapse to nothing rather than escaping the tree.
pub fn sanitize_name(name: &str) -> String {
  let mut out = String::with_capacity(name.len());
  for c in name.chars() {
    match c {
      c if c.is_alphanumeric() || c.is_whitespace() => out.push(c),
      ':' => out.push('.'),
      '/' | '-' => out.push('-'),
      _ => out.push(' '),
    }
  }
  out.trim().nfc().collect()
}

/// Finds an unused variant of `base`. `in_use` is queried case
/// insensitively by the caller's index; the suffix counter starts at 1.
pub fn make_unique(
  base: &str,
  style: SuffixStyle,
  mut in_use: impl FnMut(&str) -> bool,
) -> String {
  if !in_use(base) {
    return base.to_string();
  }
  for n in 1.. {
    let mut candidate = String::with_capacity(base.len() + 4);
    candidate.push_str(base);
    match style {
      SuffixStyle::Underscore => {
        let _ = write!(candidate, "_{n}");
      }
      SuffixStyle::Parens => {
        let _ = write!(candidate, "_({n})");
      }
    }
    if !in_use(&candidate) {
      return candidate;
    }
  }
  unreachable!()
}
