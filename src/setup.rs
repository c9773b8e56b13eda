// Copyright 2025-6 Seth Pendergrass. See LICENSE.

//! Program setup: logging and the remembered library location.

use std::{fs, path::PathBuf};

use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;

use crate::error::SetupError;

/// Sets up env_logger with the format "LEVEL\tmessage".
///
/// Log levels:
/// Error: Program errors and refused deletions.
/// Warn: Deletions and skipped items.
/// Info: Exports, directory creation, tag updates.
/// Debug: Planning decisions.
/// Trace: External tool invocations.
pub fn configure_logging(verbosity: u8) {
  let level = match verbosity {
    0 => LevelFilter::Info,
    1 => LevelFilter::Debug,
    _ => LevelFilter::Trace,
  };

  Builder::new()
    .filter_level(level)
    .format(|buf, record| {
      let style = buf.default_level_style(record.level());
      writeln!(buf, "{style}{}{style:#}\t{}", record.level(), record.args())
    })
    .init();
}

/// Gets the library root from the provided arg, if present, and remembers
/// it in XDG_CONFIG_HOME/albumsync. Else, reads the remembered root.
pub fn get_or_update_library(path: Option<PathBuf>) -> Result<PathBuf, SetupError> {
  let config_path = xdg::BaseDirectories::new().get_config_file("albumsync");

  match path {
    Some(path) => {
      if !path.is_dir() {
        return Err(SetupError::LibraryNotFound(path));
      }
      if let Some(config_path) = &config_path {
        if let Some(s) = path.to_str() {
          if let Err(e) = fs::write(config_path, s) {
            log::warn!("Failed to remember the library path: {e}");
          }
        }
      }
      Ok(path)
    }
    None => {
      let config_path = config_path.ok_or(SetupError::ConflictingOptions(
        "no library path given and none remembered; pass one with -l",
      ))?;
      let remembered = fs::read_to_string(&config_path).map_err(|_| {
        SetupError::ConflictingOptions(
          "no library path given and none remembered; pass one with -l",
        )
      })?;
      let path = PathBuf::from(remembered.trim());
      if !path.is_dir() {
        return Err(SetupError::LibraryNotFound(path));
      }
      Ok(path)
    }
  }
}
