// Copyright 2025-6 Seth Pendergrass. See LICENSE.

//! Thin wrapper over the `exiftool` binary for reading and writing embedded
//! tags. Reads go through `-json -n` and serde; the parsing is pure and
//! tested without the binary installed.

use std::{path::Path, process::Command};

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::{
  error::SetupError,
  prim::GpsLocation,
  tags::{IptcData, TagPatch},
};

const DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Oldest exiftool with working MWG face region support.
const MIN_VERSION: (u32, u32) = (8, 61);

/// exiftool prints some list tags as a scalar when there is one element.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
  One(T),
  Many(Vec<T>),
}

impl<T> OneOrMany<T> {
  fn into_vec(self) -> Vec<T> {
    match self {
      Self::One(v) => vec![v],
      Self::Many(v) => v,
    }
  }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawTags {
  #[serde(rename = "Caption-Abstract")]
  caption: Option<String>,

  #[serde(rename = "Description")]
  description: Option<String>,

  #[serde(rename = "Keywords")]
  keywords: Option<OneOrMany<String>>,

  #[serde(rename = "DateTimeOriginal")]
  date_time_original: Option<String>,

  #[serde(rename = "Rating")]
  rating: Option<f64>,

  #[serde(rename = "GPSLatitude")]
  latitude: Option<f64>,

  #[serde(rename = "GPSLongitude")]
  longitude: Option<f64>,

  #[serde(rename = "RegionName")]
  region_names: Option<OneOrMany<String>>,

  #[serde(rename = "RegionAreaX")]
  region_x: Option<OneOrMany<f64>>,

  #[serde(rename = "RegionAreaY")]
  region_y: Option<OneOrMany<f64>>,

  #[serde(rename = "RegionAreaW")]
  region_w: Option<OneOrMany<f64>>,

  #[serde(rename = "RegionAreaH")]
  region_h: Option<OneOrMany<f64>>,

  #[serde(rename = "ImageWidth")]
  image_width: Option<u32>,

  #[serde(rename = "ImageHeight")]
  image_height: Option<u32>,
}

/// Verifies exiftool is installed and recent enough.
pub fn check() -> Result<(), SetupError> {
  let output = Command::new("exiftool")
    .arg("-ver")
    .output()
    .map_err(|e| SetupError::ExiftoolMissing(e.to_string()))?;

  let version = String::from_utf8_lossy(&output.stdout);
  let mut parts = version.trim().split('.');
  let major: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
  let minor: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);

  if (major, minor) < MIN_VERSION {
    return Err(SetupError::ExiftoolMissing(format!(
      "exiftool {}.{} or newer required, found {}",
      MIN_VERSION.0,
      MIN_VERSION.1,
      version.trim()
    )));
  }

  log::debug!("Using exiftool {}.", version.trim());
  Ok(())
}

/// Reads the reconciled tags back out of an exported file.
pub fn read_tags(path: &Path) -> Result<IptcData, String> {
  let mut args: Vec<String> = [
    "-json", "-n", "-m", "-q", "-q", "-d", DATE_FORMAT, "-Caption-Abstract",
    "-Description", "-Keywords", "-DateTimeOriginal", "-Rating", "-GPSLatitude",
    "-GPSLongitude", "-RegionName", "-RegionAreaX", "-RegionAreaY", "-RegionAreaW",
    "-RegionAreaH", "-ImageWidth", "-ImageHeight",
  ]
  .map(str::to_string)
  .into();
  args.push(path.display().to_string());

  let stdout = run(&args)?;
  parse_tags(&stdout)
}

/// Writes `patch` into the file at `path`. exiftool leaves a `_original`
/// backup behind on success, which is removed.
pub fn write_tags(path: &Path, patch: &TagPatch, data: &IptcData) -> Result<(), String> {
  let mut args = vec!["-m".to_string(), "-iptc:CodedCharacterSet=utf8".to_string()];

  if let Some(caption) = &patch.caption {
    args.push(format!("-Caption-Abstract={caption}"));
    args.push(format!("-Description={caption}"));
  }

  if let Some(keywords) = &patch.keywords {
    args.push("-Keywords=".to_string());
    for keyword in keywords {
      args.push(format!("-Keywords={keyword}"));
    }
  }

  if let Some(date) = patch.date_time_original {
    args.push(format!("-DateTimeOriginal={}", date.format(DATE_FORMAT)));
  }

  if let Some(rating) = patch.rating {
    args.push(format!("-Rating={rating}"));
  }

  if let Some(gps) = patch.gps {
    args.push(format!("-GPSLatitude={:.6}", gps.latitude.abs()));
    args.push(format!("-GPSLatitudeRef={}", gps.latitude_ref()));
    args.push(format!("-GPSLongitude={:.6}", gps.longitude.abs()));
    args.push(format!("-GPSLongitudeRef={}", gps.longitude_ref()));
  }

  if let Some(regions) = &patch.regions {
    for tag in ["Name", "Type", "AreaX", "AreaY", "AreaW", "AreaH"] {
      args.push(format!("-Region{tag}="));
    }
    args.push(format!("-RegionAppliedToDimensionsW={}", data.image_width));
    args.push(format!("-RegionAppliedToDimensionsH={}", data.image_height));
    args.push("-RegionAppliedToDimensionsUnit=pixel".to_string());
    for (name, rect) in regions {
      args.push(format!("-RegionName={name}"));
      args.push("-RegionType=Face".to_string());
      args.push(format!("-RegionAreaX={:.7}", rect[0]));
      args.push(format!("-RegionAreaY={:.7}", rect[1]));
      args.push(format!("-RegionAreaW={:.7}", rect[2]));
      args.push(format!("-RegionAreaH={:.7}", rect[3]));
    }
  }

  args.push(path.display().to_string());

  let stdout = run(&args)?;
  let stdout = String::from_utf8_lossy(&stdout);
  if !stdout.contains("1 image files updated") {
    return Err(format!("unexpected exiftool output: {}", stdout.trim()));
  }

  // Best effort; a leftover backup is harmless clutter.
  let mut backup = path.as_os_str().to_owned();
  backup.push("_original");
  let _ = std::fs::remove_file(&backup);

  Ok(())
}

fn run(args: &[String]) -> Result<Vec<u8>, String> {
  log::trace!("exiftool {}", args.join(" "));
  let output = Command::new("exiftool")
    .args(args)
    .output()
    .map_err(|e| format!("failed to run exiftool: {e}"))?;

  if !output.status.success() {
    return Err(format!(
      "exiftool failed: {}",
      String::from_utf8_lossy(&output.stderr).trim()
    ));
  }
  Ok(output.stdout)
}

/// Parses `exiftool -json` output for a single file.
fn parse_tags(json: &[u8]) -> Result<IptcData, String> {
  let mut files: Vec<RawTags> =
    serde_json::from_slice(json).map_err(|e| format!("bad exiftool output: {e}"))?;
  let raw = match files.len() {
    1 => files.remove(0),
    n => return Err(format!("expected tags for 1 file, got {n}")),
  };

  let mut data = IptcData {
    caption: raw
      .caption
      .or(raw.description)
      .unwrap_or_default(),
    keywords: raw.keywords.map(OneOrMany::into_vec).unwrap_or_default(),
    date_time_original: raw
      .date_time_original
      .and_then(|d| NaiveDateTime::parse_from_str(&d, DATE_FORMAT).ok()),
    rating: raw.rating.and_then(|r| u8::try_from(r as i64).ok()),
    gps: None,
    region_names: raw.region_names.map(OneOrMany::into_vec).unwrap_or_default(),
    region_rects: Vec::new(),
    image_width: raw.image_width.unwrap_or_default(),
    image_height: raw.image_height.unwrap_or_default(),
  };

  if let (Some(lat), Some(lon)) = (raw.latitude, raw.longitude) {
    data.gps = Some(GpsLocation::new(lat, lon));
  }

  let xs = raw.region_x.map(OneOrMany::into_vec).unwrap_or_default();
  let ys = raw.region_y.map(OneOrMany::into_vec).unwrap_or_default();
  let ws = raw.region_w.map(OneOrMany::into_vec).unwrap_or_default();
  let hs = raw.region_h.map(OneOrMany::into_vec).unwrap_or_default();
  if xs.len() == data.region_names.len()
    && xs.len() == ys.len()
    && xs.len() == ws.len()
    && xs.len() == hs.len()
  {
    for i in 0..xs.len() {
      data.region_rects.push([xs[i], ys[i], ws[i], hs[i]]);
    }
  } else {
    log::warn!("Mismatched face region coordinate lists; ignoring regions.");
    data.region_names.clear();
  }

  Ok(data)
}
