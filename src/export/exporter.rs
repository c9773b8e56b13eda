// Copyright 2025-6 Seth Pendergrass. See LICENSE.

//! Core export engine type. The work happens in three stages, one per
//! `stage_*` module: plan the destination layout, reconcile existing
//! destination directories against the plan, then export and retag files.

use std::{
  collections::BTreeMap,
  sync::atomic::{AtomicBool, Ordering},
  sync::Arc,
};

use crate::{
  config::{Budgets, RunConfig},
  dest::Destination,
  library::Library,
};

use super::ExportDir;

/// Counts of what a run did (or, dry running, would have done).
#[derive(Default)]
pub struct ExportStats {
  pub directories_created: u64,
  pub files_exported:      u64,
  pub files_updated:       u64,
  pub items_deleted:       u64,
  pub tags_written:        u64,
  pub failures:            u64,
}

impl ExportStats {
  pub fn log_summary(&self, dryrun: bool) {
    let prefix = if dryrun { "Would have " } else { "" };
    log::info!(
      "{prefix}created {} directories, exported {} files, updated {} files, \
       deleted {} items, and rewrote tags in {} files.",
      self.directories_created,
      self.files_exported,
      self.files_updated,
      self.items_deleted,
      self.tags_written
    );
    if self.failures > 0 {
      log::warn!("{} items failed; see warnings above.", self.failures);
    }
  }
}

/// Drives one export run against a destination.
pub struct Exporter<'a, D: Destination> {
  pub(super) library: &'a Library,
  pub(super) dest:    D,
  pub(super) cfg:     &'a RunConfig,

  /// Planned directories, keyed by export-root-relative name. The key set
  /// also drives obsolete-directory detection.
  pub(super) named_dirs: BTreeMap<String, ExportDir<'a>>,

  pub(super) budgets: Budgets,
  pub(super) stats:   ExportStats,
  pub(super) abort:   Arc<AtomicBool>,
}

impl<'a, D: Destination> Exporter<'a, D> {
  pub fn new(library: &'a Library, dest: D, cfg: &'a RunConfig, abort: Arc<AtomicBool>) -> Self {
    Self {
      library,
      dest,
      cfg,
      named_dirs: BTreeMap::new(),
      budgets: Budgets::new(cfg),
      stats: ExportStats::default(),
      abort,
    }
  }

  /// Runs the export to completion (or until aborted) and returns what was
  /// done. Per-item failures are logged and counted, never fatal.
  pub fn run(mut self) -> ExportStats {
    if self.cfg.dryrun {
      log::info!("Dry run; no files will be changed.");
    }

    self.plan();
    log::info!(
      "Planned {} directories under {}.",
      self.named_dirs.len(),
      self.cfg.export_root.display()
    );

    if !self.aborted() {
      self.scan_destination();
    }
    if !self.aborted() {
      self.generate();
    }
    if self.aborted() {
      log::warn!("Export aborted.");
    }

    self.stats.log_summary(self.cfg.dryrun);
    self.stats
  }

  pub(super) fn aborted(&self) -> bool {
    self.abort.load(Ordering::Relaxed)
  }
}
