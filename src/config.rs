// Copyright 2025-6 Seth Pendergrass. See LICENSE.

//! Run configuration and per-run action budgets.
//!
//! Every option recognized anywhere in the engine lives in [`RunConfig`],
//! built and validated once at startup and then passed around by reference.

use std::{collections::HashSet, path::PathBuf, time::Duration};

use regex::Regex;

use crate::error::SetupError;

/// How file content reaches the destination. Run-wide, not per-file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentMode {
  /// Plain copy of the source file.
  Copy,
  /// Hard link to the source file. Destination and source share an inode.
  Link,
  /// Resize so neither dimension exceeds the given size, converting to JPEG.
  Resize(u32),
}

/// Which destination files get their embedded tags verified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetadataScope {
  /// Never touch embedded tags.
  None,
  /// Only files created or updated during this run.
  Changed,
  /// Every exported file. Much slower; opt-in.
  All,
}

/// Sync direction for change detection. `Reverse` flips the mtime comparison
/// and trusts pixel dimensions over byte sizes, since derived files may be
/// regenerated by external tools with meaningless size changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
  Forward,
  Reverse,
}

/// Immutable configuration for one export run.
pub struct RunConfig {
  pub export_root: PathBuf,

  // Container selection. Each category has its own include pattern; a `None`
  // pattern disables the category entirely.
  pub events:           Option<Regex>,
  pub albums:           Option<Regex>,
  pub smarts:           Option<Regex>,
  pub facealbums:       bool,
  pub facealbum_prefix: String,
  pub exclude:          Option<Regex>,

  /// Destination directories matching this are left alone during the
  /// obsolete scan.
  pub ignore: Option<Regex>,

  // Permissions & budgets.
  pub dryrun:     bool,
  pub update:     bool,
  pub delete:     bool,
  pub max_create: Option<u64>,
  pub max_update: Option<u64>,
  pub max_delete: Option<u64>,

  pub mode:      ContentMode,
  pub direction: Direction,
  pub iptc:      MetadataScope,

  pub faces:         bool,
  pub face_keywords: bool,
  pub gps:           bool,
  pub originals:     bool,
  pub picasa:        bool,
  pub folderhints:   bool,
  pub movies:        bool,

  pub foldertemplate:  String,
  pub nametemplate:    String,
  pub captiontemplate: String,

  /// If set, only images with one of these ratings are loaded.
  pub ratings: Option<HashSet<u8>>,

  // Change-detection tunables. The specific values absorb filesystem
  // timestamp granularity and in-place metadata edits; they are not
  // precision guarantees.
  pub mtime_fudge:    Duration,
  pub size_diff:      u64,
  pub link_size_diff: u64,
  pub region_epsilon: f64,
  pub gps_tolerance:  f64,
}

impl Default for RunConfig {
  fn default() -> Self {
    Self {
      export_root:      PathBuf::new(),
      events:           None,
      albums:           None,
      smarts:           None,
      facealbums:       false,
      facealbum_prefix: String::new(),
      exclude:          None,
      ignore:           None,
      dryrun:           false,
      update:           false,
      delete:           false,
      max_create:       None,
      max_update:       None,
      max_delete:       None,
      mode:             ContentMode::Copy,
      direction:        Direction::Forward,
      iptc:             MetadataScope::None,
      faces:            false,
      face_keywords:    false,
      gps:              false,
      originals:        false,
      picasa:           false,
      folderhints:      false,
      movies:           true,
      foldertemplate:   "{name}".to_string(),
      nametemplate:     "{title}".to_string(),
      captiontemplate:  "{description}".to_string(),
      ratings:          None,
      mtime_fudge:      Duration::from_secs(3),
      size_diff:        35_000,
      link_size_diff:   32,
      region_epsilon:   1e-7,
      gps_tolerance:    1e-4,
    }
  }
}

impl RunConfig {
  /// Checks for option combinations that can never work. Called once, before
  /// the run starts.
  pub fn validate(&self) -> Result<(), SetupError> {
    if self.events.is_none() && self.albums.is_none() && self.smarts.is_none() && !self.facealbums
    {
      return Err(SetupError::ConflictingOptions(
        "need at least one of --events, --albums, --smarts or --facealbums",
      ));
    }
    Ok(())
  }
}

/// Per-run action counters. `None` means unlimited. Each counter decrements
/// on every permitted action, dry run or not, so a capped dry run previews
/// exactly what a capped real run would do.
pub struct Budgets {
  create: Option<u64>,
  update: Option<u64>,
  delete: Option<u64>,
}

impl Budgets {
  pub fn new(cfg: &RunConfig) -> Self {
    Self {
      create: cfg.max_create,
      update: cfg.max_update,
      delete: cfg.max_delete,
    }
  }

  /// Returns true if a create may proceed. Does not check dryrun.
  pub fn should_create(&mut self) -> bool {
    Self::take(&mut self.create, "created", "create")
  }

  /// Returns true if an update may proceed, based on the update permission
  /// flag and the update budget. Does not check dryrun.
  pub fn should_update(&mut self, allowed: bool, dryrun: bool) -> bool {
    if !allowed {
      if !dryrun {
        log::warn!("Run with the -u option to update this item.");
      }
      return false;
    }
    Self::take(&mut self.update, "updated", "update")
  }

  /// Returns true if a delete may proceed, based on the delete permission
  /// flag and the delete budget. Does not check dryrun.
  pub fn should_delete(&mut self, allowed: bool, dryrun: bool) -> bool {
    if !allowed {
      if !dryrun {
        log::warn!("Run with the -d option to delete this item.");
      }
      return false;
    }
    Self::take(&mut self.delete, "deleted", "delete")
  }

  fn take(counter: &mut Option<u64>, verb: &str, noun: &str) -> bool {
    match counter {
      None => true,
      Some(0) => {
        log::warn!("Item not {verb} because the {noun} limit has been reached.");
        false
      }
      Some(n) => {
        *n -= 1;
        true
      }
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn budget_exhausts() {
    let cfg = RunConfig {
      max_delete: Some(2),
      delete: true,
      ..RunConfig::default()
    };
    let mut b = Budgets::new(&cfg);

    assert!(b.should_delete(true, false));
    assert!(b.should_delete(true, false));
    assert!(!b.should_delete(true, false));
  }

  #[test]
  fn budget_unlimited_by_default() {
    let mut b = Budgets::new(&RunConfig::default());

    for _ in 0..100 {
      assert!(b.should_create());
    }
  }

  #[test]
  fn update_requires_permission() {
    let mut b = Budgets::new(&RunConfig::default());

    assert!(!b.should_update(false, false));
    assert!(b.should_update(true, false));
  }

  #[test]
  fn budget_consumed_during_dry_run() {
    let cfg = RunConfig {
      max_update: Some(1),
      ..RunConfig::default()
    };
    let mut b = Budgets::new(&cfg);

    assert!(b.should_update(true, true));
    assert!(!b.should_update(true, true));
  }

  #[test]
  fn validate_requires_a_category() {
    let cfg = RunConfig::default();
    assert!(cfg.validate().is_err());

    let cfg = RunConfig {
      events: Some(Regex::new(".").unwrap()),
      ..RunConfig::default()
    };
    assert!(cfg.validate().is_ok());
  }
}
