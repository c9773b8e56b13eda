// Copyright 2025-6 Seth Pendergrass. See LICENSE.

//! Startup-class errors. Anything here stops the run before it begins;
//! per-file problems during a run are logged and skipped instead.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SetupError {
  #[error("{0}: does not appear to be a valid iPhoto library location.")]
  LibraryNotFound(PathBuf),

  #[error("{path}: could not read library data: {reason}")]
  LibraryUnreadable { path: PathBuf, reason: String },

  #[error("iPhoto version {0} is not supported.")]
  UnsupportedVersion(String),

  #[error("exiftool is required for the --iptc and --iptcall options: {0}")]
  ExiftoolMissing(String),

  #[error("{0}")]
  ConflictingOptions(&'static str),

  #[error("invalid {what} pattern: {source}")]
  BadPattern {
    what:   &'static str,
    #[source]
    source: regex::Error,
  },
}
