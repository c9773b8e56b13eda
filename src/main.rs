//! This is a utility for exporting an iPhoto library into a folder tree,
//! keeping the tree in sync with the library across runs.
//!
//! Copyright 2025-6 Seth Pendergrass. See LICENSE.

use std::{
  collections::HashSet,
  path::PathBuf,
  sync::{atomic::AtomicBool, Arc},
};

use clap::{ArgAction, Parser};
use regex::Regex;

mod applib;
mod config;
mod dest;
mod detect;
mod error;
mod exiftool;
mod export;
mod library;
mod naming;
mod prim;
mod setup;
mod tags;

use config::{ContentMode, MetadataScope, RunConfig};
use error::SetupError;

#[derive(Parser)]
#[command(about = "Exports an iPhoto library into a folder tree and keeps it in sync.")]
struct Args {
  /// Directory of the iPhoto library. Updates default in XDG_CONFIG_HOME.
  #[arg(short)]
  library: Option<PathBuf>,

  /// Directory to export into.
  #[arg(short, long)]
  export: PathBuf,

  /// Export events whose names match this pattern.
  #[arg(long, value_name = "PATTERN")]
  events: Option<String>,

  /// Export regular and published albums whose names match this pattern.
  #[arg(long, value_name = "PATTERN")]
  albums: Option<String>,

  /// Export smart albums whose names match this pattern.
  #[arg(long, value_name = "PATTERN")]
  smarts: Option<String>,

  /// Export one folder per tagged person.
  #[arg(long)]
  facealbums: bool,

  /// Folder name prefix for --facealbums, e.g. "Faces/".
  #[arg(long, value_name = "PREFIX", default_value = "")]
  facealbum_prefix: String,

  /// Skip albums and events whose names match this pattern.
  #[arg(short = 'x', long, value_name = "PATTERN")]
  exclude: Option<String>,

  /// Leave destination directories matching this pattern alone.
  #[arg(long, value_name = "PATTERN")]
  ignore: Option<String>,

  /// Show what would happen without changing any files.
  #[arg(short = 'n', long)]
  dryrun: bool,

  /// Allow updating existing files.
  #[arg(short, long)]
  update: bool,

  /// Allow deleting obsolete files and directories.
  #[arg(short, long)]
  delete: bool,

  /// Stop after this many new files.
  #[arg(long, value_name = "N")]
  max_create: Option<u64>,

  /// Stop after this many updates.
  #[arg(long, value_name = "N")]
  max_update: Option<u64>,

  /// Stop after this many deletions.
  #[arg(long, value_name = "N")]
  max_delete: Option<u64>,

  /// Hard link files instead of copying them.
  #[arg(long, conflicts_with = "size")]
  link: bool,

  /// Resize images so neither dimension exceeds this, exporting JPEG.
  #[arg(long, value_name = "PIXELS")]
  size: Option<u32>,

  /// Reconcile embedded tags in new and updated files.
  #[arg(long)]
  iptc: bool,

  /// Reconcile embedded tags in every exported file. Slow.
  #[arg(long)]
  iptcall: bool,

  /// Write face regions into exported files.
  #[arg(long)]
  faces: bool,

  /// Add face names to exported keywords.
  #[arg(long)]
  face_keywords: bool,

  /// Write GPS coordinates into exported files.
  #[arg(long)]
  gps: bool,

  /// Also export pre-edit originals into a companion folder.
  #[arg(long)]
  originals: bool,

  /// Use Picasa conventions (.picasaoriginals).
  #[arg(long)]
  picasa: bool,

  /// Let @folder comment lines override export folder names.
  #[arg(long)]
  folderhints: bool,

  /// Skip movies.
  #[arg(long)]
  no_movies: bool,

  /// Folder name template, e.g. "{yyyy}/{name}".
  #[arg(long, value_name = "TEMPLATE", default_value = "{name}")]
  foldertemplate: String,

  /// File name template, e.g. "{index0} {title}".
  #[arg(long, value_name = "TEMPLATE", default_value = "{title}")]
  nametemplate: String,

  /// Caption template for embedded tags.
  #[arg(long, value_name = "TEMPLATE", default_value = "{description}")]
  captiontemplate: String,

  /// Only export images with these ratings, e.g. "4,5".
  #[arg(long, value_delimiter = ',', value_name = "RATINGS")]
  ratings: Vec<u8>,

  /// Verbosity level. Max: 2.
  #[arg(short, action = ArgAction::Count)]
  verbose: u8,
}

fn main() {
  let args = Args::parse();
  setup::configure_logging(args.verbose);

  if let Err(e) = run(args) {
    log::error!("{e}");
    std::process::exit(1);
  }
}

fn run(args: Args) -> Result<(), SetupError> {
  let cfg = build_config(&args)?;
  cfg.validate()?;

  if cfg.iptc != MetadataScope::None {
    exiftool::check()?;
  }

  let library_dir = setup::get_or_update_library(args.library)?;
  let library = applib::load_library(&library_dir, cfg.ratings.as_ref())?;
  log::info!(
    "Loaded {} images from {}.",
    library.image_count(),
    library_dir.display()
  );

  let abort = Arc::new(AtomicBool::new(false));
  export::Exporter::new(&library, dest::LocalDestination, &cfg, abort).run();
  Ok(())
}

fn build_config(args: &Args) -> Result<RunConfig, SetupError> {
  Ok(RunConfig {
    export_root: args.export.clone(),
    events: pattern("--events", args.events.as_deref())?,
    albums: pattern("--albums", args.albums.as_deref())?,
    smarts: pattern("--smarts", args.smarts.as_deref())?,
    facealbums: args.facealbums,
    facealbum_prefix: args.facealbum_prefix.clone(),
    exclude: pattern("--exclude", args.exclude.as_deref())?,
    ignore: pattern("--ignore", args.ignore.as_deref())?,
    dryrun: args.dryrun,
    update: args.update,
    delete: args.delete,
    max_create: args.max_create,
    max_update: args.max_update,
    max_delete: args.max_delete,
    mode: match (args.link, args.size) {
      (true, _) => ContentMode::Link,
      (false, Some(size)) => ContentMode::Resize(size),
      (false, None) => ContentMode::Copy,
    },
    iptc: match (args.iptcall, args.iptc) {
      (true, _) => MetadataScope::All,
      (false, true) => MetadataScope::Changed,
      (false, false) => MetadataScope::None,
    },
    faces: args.faces,
    face_keywords: args.face_keywords,
    gps: args.gps,
    originals: args.originals,
    picasa: args.picasa,
    folderhints: args.folderhints,
    movies: !args.no_movies,
    foldertemplate: args.foldertemplate.clone(),
    nametemplate: args.nametemplate.clone(),
    captiontemplate: args.captiontemplate.clone(),
    ratings: if args.ratings.is_empty() {
      None
    } else {
      Some(args.ratings.iter().copied().collect::<HashSet<u8>>())
    },
    ..RunConfig::default()
  })
}

/// Selection patterns match from the start of the name, so `Trip` selects
/// `Trips` but not `My Trip`.
fn pattern(what: &'static str, value: Option<&str>) -> Result<Option<Regex>, SetupError> {
  value
    .map(|v| {
      Regex::new(&format!("^(?:{v})")).map_err(|source| SetupError::BadPattern { what, source })
    })
    .transpose()
}
