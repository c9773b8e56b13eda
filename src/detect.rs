// Copyright 2025-6 Seth Pendergrass. See LICENSE.

//! Decides whether a destination file is stale relative to its source.
//!
//! The checks run cheapest first; image dimensions are only probed when the
//! earlier checks cannot decide, and the probe result is cached on the
//! record.

use std::{cell::OnceCell, fs, os::unix::fs::MetadataExt, path::Path, path::PathBuf, time::SystemTime};

use crate::config::{ContentMode, Direction, RunConfig};

/// A stat snapshot of one file. Never fails to construct; a missing file is
/// recorded as `exists: false`.
pub struct FileRecord {
  pub path:   PathBuf,
  pub exists: bool,
  pub size:   u64,
  pub mtime:  Option<SystemTime>,
  pub inode:  u64,
  dimensions: OnceCell<Option<(u32, u32)>>,
}

impl FileRecord {
  pub fn stat(path: &Path) -> Self {
    let meta = fs::metadata(path).ok();
    Self {
      path:       path.to_path_buf(),
      exists:     meta.is_some(),
      size:       meta.as_ref().map_or(0, fs::Metadata::len),
      mtime:      meta.as_ref().and_then(|m| m.modified().ok()),
      inode:      meta.as_ref().map_or(0, MetadataExt::ino),
      dimensions: OnceCell::new(),
    }
  }

  /// Pixel dimensions, probed lazily from the file header.
  pub fn dimensions(&self) -> Option<(u32, u32)> {
    *self
      .dimensions
      .get_or_init(|| image::image_dimensions(&self.path).ok())
  }
}

/// Decides whether `dest` must be rewritten from `source`, returning the
/// reason when it must. `Direction::Reverse` flips the mtime comparison and
/// trusts pixel dimensions over byte sizes.
pub fn needs_export(
  source: &FileRecord,
  dest: &FileRecord,
  mode: ContentMode,
  direction: Direction,
  cfg: &RunConfig,
) -> Option<String> {
  if !dest.exists {
    return Some("missing".to_string());
  }

  if mode == ContentMode::Link && source.inode != dest.inode {
    return Some("not a link to the source".to_string());
  }

  if let (Some(src), Some(dst)) = (source.mtime, dest.mtime) {
    let (newer, older) = match direction {
      Direction::Forward => (src, dst),
      Direction::Reverse => (dst, src),
    };
    if let Ok(age) = newer.duration_since(older) {
      if age > cfg.mtime_fudge {
        return Some(format!("out of date by {}s", age.as_secs()));
      }
    }
  }

  if direction == Direction::Forward && !matches!(mode, ContentMode::Resize(_)) {
    let threshold = if mode == ContentMode::Link {
      cfg.link_size_diff
    } else {
      cfg.size_diff
    };
    let diff = source.size.abs_diff(dest.size);
    if diff > threshold {
      return Some(format!("size differs by {diff} bytes"));
    }
  }

  if direction == Direction::Reverse {
    if let (Some(src), Some(dst)) = (source.dimensions(), dest.dimensions()) {
      if src != dst {
        return Some(format!(
          "dimensions changed from {}x{} to {}x{}",
          src.0, src.1, dst.0, dst.1
        ));
      }
    }
  }

  None
}
