// Copyright 2025-6 Seth Pendergrass. See LICENSE.

//! Export Stage 3: Export files and reconcile embedded tags.
//!
//! Runs the change detector on every planned file and exports the stale
//! ones, within the permission flags and budgets. The metadata pass reads
//! tags back out of destination files and rewrites only what differs. In
//! link mode tags are written to the source before linking, so both sides
//! of the link agree.

use crate::{
  config::{Budgets, ContentMode, MetadataScope, RunConfig},
  dest::Destination,
  detect::{self, FileRecord},
  exiftool,
  export::ExportStats,
  prim::MediaItem,
  tags,
};

use super::{dir::ExportFile, ExportDir, Exporter};

impl<D: Destination> Exporter<'_, D> {
  pub(super) fn generate(&mut self) {
    let cfg = self.cfg;
    let Self {
      named_dirs,
      dest,
      budgets,
      stats,
      abort,
      ..
    } = self;

    for dir in named_dirs.values() {
      log::debug!("Exporting {}.", dir.name);
      for file in dir.files.values() {
        if abort.load(std::sync::atomic::Ordering::Relaxed) {
          return;
        }
        export_file(dest, cfg, budgets, stats, dir, file);
      }
    }
  }
}

fn export_file<D: Destination>(
  dest: &D,
  cfg: &RunConfig,
  budgets: &mut Budgets,
  stats: &mut ExportStats,
  dir: &ExportDir,
  file: &ExportFile,
) {
  let source = FileRecord::stat(&file.image.path);
  if !source.exists {
    log::warn!("{}: source file is missing.", file.image);
    stats.failures += 1;
    return;
  }

  // Movies pass through untouched even when images are resized.
  let mode = if file.image.is_movie() && matches!(cfg.mode, ContentMode::Resize(_)) {
    ContentMode::Copy
  } else {
    cfg.mode
  };

  let existing = FileRecord::stat(&file.export_path);

  let permitted = match detect::needs_export(&source, &existing, mode, cfg.direction, cfg) {
    Some(reason) if existing.exists => {
      log::info!("Changed ({reason}): {}", file.export_path.display());
      let ok = budgets.should_update(cfg.update, cfg.dryrun);
      if ok {
        stats.files_updated += 1;
      }
      ok
    }
    Some(_) => {
      log::info!("New file: {}", file.export_path.display());
      let ok = budgets.should_create();
      if ok {
        stats.files_exported += 1;
      }
      ok
    }
    None => false,
  };

  // Linked files share their content with the library, so their tags are
  // reconciled on the source, before the link is (re)made.
  if mode == ContentMode::Link && wants_tags(cfg.iptc, permitted) && !cfg.dryrun {
    reconcile_tags(cfg, budgets, stats, file.image, &dir.folder_comment,
      &file.image.path, false, permitted);
  }

  let mut exported = false;
  if permitted {
    if cfg.dryrun {
      exported = true;
    } else {
      match dest.place(&source.path, &file.export_path, mode) {
        Ok(()) => exported = true,
        Err(e) => {
          log::warn!("{e}");
          stats.failures += 1;
        }
      }
    }
  }

  if mode != ContentMode::Link
    && wants_tags(cfg.iptc, exported)
    && dest.exists(&file.export_path)
  {
    reconcile_tags(cfg, budgets, stats, file.image, &dir.folder_comment,
      &file.export_path, false, exported);
  }

  if let (Some(original_dest), Some(original_source)) =
    (&file.original_export_path, &file.image.original_path)
  {
    export_original(dest, cfg, budgets, stats, dir, file, original_source, original_dest);
  }
}

/// Exports the pre-edit original alongside the edited rendition. Originals
/// are copied (or linked) as is, never resized.
#[allow(clippy::too_many_arguments)]
fn export_original<D: Destination>(
  dest: &D,
  cfg: &RunConfig,
  budgets: &mut Budgets,
  stats: &mut ExportStats,
  dir: &ExportDir,
  file: &ExportFile,
  source_path: &std::path::Path,
  dest_path: &std::path::Path,
) {
  let source = FileRecord::stat(source_path);
  if !source.exists {
    log::warn!("{}: original file is missing.", source_path.display());
    stats.failures += 1;
    return;
  }

  let mode = if cfg.mode == ContentMode::Link {
    ContentMode::Link
  } else {
    ContentMode::Copy
  };

  if let Some(parent) = dest_path.parent() {
    if !dest.is_dir(parent) {
      log::info!("Creating directory {}.", parent.display());
      stats.directories_created += 1;
      if !cfg.dryrun {
        if let Err(e) = dest.create_dir_all(parent) {
          log::warn!("{e}");
          stats.failures += 1;
          return;
        }
      }
    }
  }

  let existing = FileRecord::stat(dest_path);
  let mut exported = false;

  if let Some(reason) = detect::needs_export(&source, &existing, mode, cfg.direction, cfg) {
    let permitted = if existing.exists {
      log::info!("Changed ({reason}): {}", dest_path.display());
      let ok = budgets.should_update(cfg.update, cfg.dryrun);
      if ok {
        stats.files_updated += 1;
      }
      ok
    } else {
      log::info!("New file: {}", dest_path.display());
      let ok = budgets.should_create();
      if ok {
        stats.files_exported += 1;
      }
      ok
    };

    if permitted && !cfg.dryrun {
      match dest.place(&source.path, dest_path, mode) {
        Ok(()) => exported = true,
        Err(e) => {
          log::warn!("{e}");
          stats.failures += 1;
        }
      }
    } else if permitted {
      exported = true;
    }
  }

  if mode != ContentMode::Link && wants_tags(cfg.iptc, exported) && dest.exists(dest_path) {
    reconcile_tags(cfg, budgets, stats, file.image, &dir.folder_comment, dest_path,
      true, exported);
  }
}

fn wants_tags(scope: MetadataScope, exported: bool) -> bool {
  match scope {
    MetadataScope::None => false,
    MetadataScope::Changed => exported,
    MetadataScope::All => true,
  }
}

/// A tag write to a file whose content this run already exported is part
/// of that export; only writes to untouched files consume an update ticket.
fn tag_update_permitted(budgets: &mut Budgets, cfg: &RunConfig, just_exported: bool) -> bool {
  just_exported || budgets.should_update(cfg.update, cfg.dryrun)
}

/// Reads the tags embedded at `path`, diffs them against the library, and
/// rewrites what differs. Writes to files this run did not export count
/// against the update budget.
#[allow(clippy::too_many_arguments)]
fn reconcile_tags(
  cfg: &RunConfig,
  budgets: &mut Budgets,
  stats: &mut ExportStats,
  image: &MediaItem,
  folder_comment: &str,
  path: &std::path::Path,
  is_original: bool,
  just_exported: bool,
) {
  if !tags::is_embeddable(path) {
    return;
  }

  let data = match exiftool::read_tags(path) {
    Ok(data) => data,
    Err(e) => {
      log::warn!("{}: {e}", path.display());
      stats.failures += 1;
      return;
    }
  };

  let Some(patch) = tags::diff(image, folder_comment, &data, cfg, is_original) else {
    return;
  };

  log::info!("Updating tags: {}", path.display());
  if !tag_update_permitted(budgets, cfg, just_exported) {
    return;
  }

  stats.tags_written += 1;
  if cfg.dryrun {
    return;
  }
  if let Err(e) = exiftool::write_tags(path, &patch, &data) {
    log::warn!("{}: {e}", path.display());
    stats.failures += 1;
  }
}
