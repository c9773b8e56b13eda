// Copyright 2025-6 Seth Pendergrass. See LICENSE.

//! Export Stage 2: Reconcile the destination tree against the plan.
//!
//! Creates missing directories, deletes files and directories no longer in
//! the plan, and flags destination directories the plan knows nothing
//! about. Deletion is the dangerous half of the engine, so every removal
//! re-checks that its target lies strictly inside the export root.

use std::{
  collections::HashSet,
  path::{Path, PathBuf},
};

use unicode_normalization::UnicodeNormalization;

use super::{ExportDir, Exporter};
use crate::{
  config::{Budgets, RunConfig},
  dest::{self, Destination},
  export::ExportStats,
};

/// Destination entries that are never treated as obsolete: sidecar noise
/// from browsers and media players, and dotfiles. The Picasa originals
/// folder is the one dotfile the engine manages itself.
fn is_ignored(name: &str) -> bool {
  let lower = name.to_lowercase();
  if let Some(rest) = lower.strip_prefix('.') {
    return rest != "picasaoriginals";
  }
  matches!(
    lower.as_str(),
    "pspbrwse.jbf"
      | "thumbs.db"
      | "desktop.ini"
      | "ipod photo cache"
      | "picasa.ini"
      | "feed.rss"
      | "view online.url"
      | "albumdata.xml"
      | "albumdata2.xml"
      | "pkginfo"
      | "imovie data"
      | "dir.data"
      | "iphoto.ipspot"
      | "iphotolock.data"
      | "library.data"
      | "library.iphoto"
      | "library6.iphoto"
      | "caches"
  )
}

impl<D: Destination> Exporter<'_, D> {
  pub(super) fn scan_destination(&mut self) {
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
      if abort.load(std::sync::atomic::Ordering::Relaxed) {
        return;
      }
      scan_directory(dest, cfg, budgets, stats, dir);
    }

    check_directories(dest, cfg, named_dirs, budgets, stats);
  }
}

/// Reconciles one planned directory: creates it if missing, otherwise
/// deletes entries the plan does not own.
fn scan_directory<D: Destination>(
  dest: &D,
  cfg: &RunConfig,
  budgets: &mut Budgets,
  stats: &mut ExportStats,
  dir: &ExportDir,
) {
  // An unlistable directory gets the same treatment as a missing one.
  let listing = if dest.is_dir(&dir.directory) {
    dest.list_dir(&dir.directory).inspect_err(|e| log::warn!("{e}")).ok()
  } else {
    None
  };
  let Some(mut entries) = listing else {
    log::info!("Creating directory {}.", dir.directory.display());
    stats.directories_created += 1;
    if !cfg.dryrun {
      if let Err(e) = dest.create_dir_all(&dir.directory) {
        log::warn!("{e}");
        stats.failures += 1;
      }
    }
    return;
  };
  entries.sort();

  for raw in entries {
    // Destination filesystems may store names decomposed; compare composed.
    let name: String = raw.nfc().collect();
    if is_ignored(&name) {
      continue;
    }

    let path = dir.directory.join(&raw);
    if dest.is_dir(&path) {
      if name.eq_ignore_ascii_case(dir.originals_folder) && dir.has_originals() {
        scan_originals(dest, cfg, budgets, stats, dir, &path);
      } else {
        delete_obsolete(dest, cfg, budgets, stats, &path, true);
      }
    } else if !dir.owns_file(&name) {
      delete_obsolete(dest, cfg, budgets, stats, &path, false);
    }
  }
}

/// Reconciles the Originals companion folder of one planned directory.
fn scan_originals<D: Destination>(
  dest: &D,
  cfg: &RunConfig,
  budgets: &mut Budgets,
  stats: &mut ExportStats,
  dir: &ExportDir,
  path: &Path,
) {
  let Ok(mut entries) = dest.list_dir(path).inspect_err(|e| {
    log::warn!("{e}");
    stats.failures += 1;
  }) else {
    return;
  };
  entries.sort();

  for raw in entries {
    let name: String = raw.nfc().collect();
    if is_ignored(&name) {
      continue;
    }
    let entry = path.join(&raw);
    if dest.is_dir(&entry) {
      delete_obsolete(dest, cfg, budgets, stats, &entry, true);
    } else if !dir.owns_original(&name) {
      delete_obsolete(dest, cfg, budgets, stats, &entry, false);
    }
  }
}

/// Flags or deletes destination directories the plan knows nothing about,
/// walking down from the export root. Planned directories were already
/// reconciled; their ancestors are walked through, everything else is
/// obsolete unless ignored.
fn check_directories<D: Destination>(
  dest: &D,
  cfg: &RunConfig,
  named_dirs: &std::collections::BTreeMap<String, ExportDir>,
  budgets: &mut Budgets,
  stats: &mut ExportStats,
) {
  // Nothing to check on a first run into an empty destination.
  if !dest.is_dir(&cfg.export_root) {
    return;
  }

  let mut planned = HashSet::new();
  let mut ancestors = HashSet::new();
  ancestors.insert(cfg.export_root.clone());
  for name in named_dirs.keys() {
    planned.insert(cfg.export_root.join(name));
    let segments: Vec<_> = Path::new(name).iter().collect();
    if let Some((_, parents)) = segments.split_last() {
      let mut partial = cfg.export_root.clone();
      for segment in parents {
        partial = partial.join(segment);
        ancestors.insert(partial.clone());
      }
    }
  }

  let mut pending: Vec<PathBuf> = vec![cfg.export_root.clone()];
  while let Some(current) = pending.pop() {
    let Ok(entries) = dest.list_dir(&current).inspect_err(|e| {
      log::warn!("{e}");
      stats.failures += 1;
    }) else {
      continue;
    };

    for raw in entries {
      let name: String = raw.nfc().collect();
      if is_ignored(&name) {
        continue;
      }
      let path = current.join(&raw);
      // Loose files in unmanaged directories are obsolete too.
      if !dest.is_dir(&path) {
        delete_obsolete(dest, cfg, budgets, stats, &path, false);
        continue;
      }
      if cfg.ignore.as_ref().is_some_and(|p| p.is_match(&name)) {
        log::debug!("{}: ignored.", path.display());
        continue;
      }

      if planned.contains(&path) {
        continue;
      }
      if ancestors.contains(&path) {
        pending.push(path);
      } else {
        delete_obsolete(dest, cfg, budgets, stats, &path, true);
      }
    }
  }
}

/// Deletes one obsolete file or directory tree, subject to the delete
/// permission and budget. Refuses any target not strictly inside the
/// export root.
fn delete_obsolete<D: Destination>(
  dest: &D,
  cfg: &RunConfig,
  budgets: &mut Budgets,
  stats: &mut ExportStats,
  path: &Path,
  is_dir: bool,
) {
  if !path.starts_with(&cfg.export_root) || path == cfg.export_root {
    log::error!(
      "Refusing to delete {}: outside the export root {}.",
      path.display(),
      cfg.export_root.display()
    );
    stats.failures += 1;
    return;
  }

  log::warn!("Obsolete: {}", path.display());
  if !budgets.should_delete(cfg.delete, cfg.dryrun) {
    return;
  }

  stats.items_deleted += 1;
  if cfg.dryrun {
    return;
  }

  let result = if is_dir {
    dest::remove_tree(dest, path)
  } else {
    dest.remove_file(path)
  };
  if let Err(e) = result {
    log::warn!("{e}");
    stats.failures += 1;
  }
}
