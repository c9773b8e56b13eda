// Copyright 2025-6 Seth Pendergrass. See LICENSE.

//! The destination side of an export. A [`Destination`] is a plain
//! directory tree the engine can enumerate and mutate; keeping it behind a
//! trait lets reconciliation tests swap in failure-injecting stand-ins.

use std::{fs, io, path::Path};

use crate::config::ContentMode;

pub trait Destination {
  fn exists(&self, path: &Path) -> bool;
  fn is_dir(&self, path: &Path) -> bool;

  /// File and directory names directly under `path`, unsorted.
  fn list_dir(&self, path: &Path) -> Result<Vec<String>, String>;

  fn create_dir_all(&self, path: &Path) -> Result<(), String>;

  /// Materializes `source` at `dest` according to `mode`, replacing any
  /// existing file.
  fn place(&self, source: &Path, dest: &Path, mode: ContentMode) -> Result<(), String>;

  fn remove_file(&self, path: &Path) -> Result<(), String>;

  /// Removes an empty directory.
  fn remove_dir(&self, path: &Path) -> Result<(), String>;
}

/// A destination on the local filesystem.
pub struct LocalDestination;

impl LocalDestination {
  fn resize(source: &Path, dest: &Path, size: u32) -> Result<(), String> {
    let img = image::open(source).map_err(|e| format!("failed to read {}: {e}", source.display()))?;
    let img = img.resize(size, size, image::imageops::FilterType::Lanczos3);
    img
      .save_with_format(dest, image::ImageFormat::Jpeg)
      .map_err(|e| format!("failed to write {}: {e}", dest.display()))
  }
}

fn explain(op: &str, path: &Path, e: &io::Error) -> String {
  format!("failed to {op} {}: {e}", path.display())
}

impl Destination for LocalDestination {
  fn exists(&self, path: &Path) -> bool {
    path.exists()
  }

  fn is_dir(&self, path: &Path) -> bool {
    path.is_dir()
  }

  fn list_dir(&self, path: &Path) -> Result<Vec<String>, String> {
    let mut names = Vec::new();
    for entry in fs::read_dir(path).map_err(|e| explain("list", path, &e))? {
      let entry = entry.map_err(|e| explain("list", path, &e))?;
      names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
  }

  fn create_dir_all(&self, path: &Path) -> Result<(), String> {
    fs::create_dir_all(path).map_err(|e| explain("create", path, &e))
  }

  fn place(&self, source: &Path, dest: &Path, mode: ContentMode) -> Result<(), String> {
    // Hard links refuse to overwrite, and copying over a linked destination
    // would write through to the source. Always start fresh.
    if dest.exists() {
      fs::remove_file(dest).map_err(|e| explain("replace", dest, &e))?;
    }

    match mode {
      ContentMode::Copy => {
        fs::copy(source, dest)
          .map(|_| ())
          .map_err(|e| explain("copy", dest, &e))?;
        // Copies keep the source mtime so change detection stays quiet.
        if let Ok(mtime) = fs::metadata(source).and_then(|m| m.modified()) {
          let _ = fs::File::options()
            .write(true)
            .open(dest)
            .and_then(|f| f.set_modified(mtime));
        }
        Ok(())
      }
      ContentMode::Link => fs::hard_link(source, dest).map_err(|e| explain("link", dest, &e)),
      ContentMode::Resize(size) => Self::resize(source, dest, size),
    }
  }

  fn remove_file(&self, path: &Path) -> Result<(), String> {
    fs::remove_file(path).map_err(|e| explain("delete", path, &e))
  }

  fn remove_dir(&self, path: &Path) -> Result<(), String> {
    fs::remove_dir(path).map_err(|e| explain("delete", path, &e))
  }
}

/// Deletes a directory tree bottom up through `dest`, continuing past
/// individual failures so one stuck file does not strand siblings. Returns
/// the first error encountered, if any.
pub fn remove_tree(dest: &dyn Destination, path: &Path) -> Result<(), String> {
  let mut first_error = None;

  match dest.list_dir(path) {
    Ok(names) => {
      for name in names {
        let child = path.join(&name);
        let result = if dest.is_dir(&child) {
          remove_tree(dest, &child)
        } else {
          dest.remove_file(&child)
        };
        if let Err(e) = result {
          log::warn!("{e}");
          first_error.get_or_insert(e);
        }
      }
    }
    Err(e) => {
      log::warn!("{e}");
      first_error.get_or_insert(e);
    }
  }

  if first_error.is_none() {
    if let Err(e) = dest.remove_dir(path) {
      log::warn!("{e}");
      first_error.get_or_insert(e);
    }
  }

  first_error.map_or(Ok(()), Err)
}

#[cfg(test)]
mod test {
  use std::fs;

  use super::*;

  #[test]
  fn copy_preserves_source_mtime() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("a.jpg");
    let dest = dir.path().join("b.jpg");
    fs::write(&source, b"pixels").unwrap();
    let old = std::time::SystemTime::now() - std::time::Duration::from_secs(100_000);
    fs::File::options()
      .write(true)
      .open(&source)
      .unwrap()
      .set_modified(old)
      .unwrap();

    LocalDestination.place(&source, &dest, ContentMode::Copy).unwrap();

    let src_mtime = fs::metadata(&source).unwrap().modified().unwrap();
    let dst_mtime = fs::metadata(&dest).unwrap().modified().unwrap();
    let skew = src_mtime
      .duration_since(dst_mtime)
      .unwrap_or_else(|e| e.duration());
    assert!(skew.as_secs() < 2);
  }

  #[test]
  fn place_replaces_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("a.jpg");
    let dest = dir.path().join("b.jpg");
    fs::write(&source, b"new").unwrap();
    fs::write(&dest, b"old-content").unwrap();

    LocalDestination.place(&source, &dest, ContentMode::Copy).unwrap();

    assert_eq!(fs::read(&dest).unwrap(), b"new");
  }

  #[test]
  fn link_shares_an_inode() {
    use std::os::unix::fs::MetadataExt;

    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("a.jpg");
    let dest = dir.path().join("b.jpg");
    fs::write(&source, b"pixels").unwrap();

    LocalDestination.place(&source, &dest, ContentMode::Link).unwrap();

    assert_eq!(
      fs::metadata(&source).unwrap().ino(),
      fs::metadata(&dest).unwrap().ino()
    );
  }

  #[test]
  fn remove_tree_clears_nested_directories() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("gone");
    fs::create_dir_all(root.join("sub")).unwrap();
    fs::write(root.join("a.jpg"), b"x").unwrap();
    fs::write(root.join("sub/b.jpg"), b"y").unwrap();

    remove_tree(&LocalDestination, &root).unwrap();

    assert!(!root.exists());
  }
}
