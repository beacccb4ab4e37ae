/*
 *
 *
 *
 *
 * MIT License
 * Copyright (c) 2025. Dwight J. Browne
 * dwight[-at-]dwightjbrowne[-dot-]com
 *
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

//! Local working artifacts and the handles that pass them between steps.
//!
//! The fetch step hands a [`RawArtifact`] to the transform step, which hands
//! a [`NormalizedArtifact`] to the load step. A step only ever reads the file
//! named by the handle it was given.

use crate::{LoaderError, LoaderResult};
use chrono::{DateTime, Utc};
use cp_client::endpoints::markets::parse_listing;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Raw snapshot persisted by the fetch step
#[derive(Debug, Clone, PartialEq)]
pub struct RawArtifact {
  pub path: PathBuf,
  pub record_count: usize,
  pub byte_len: usize,
  pub fetched_at: DateTime<Utc>,
}

/// Normalized table persisted by the transform step
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedArtifact {
  pub path: PathBuf,
  pub row_count: usize,
  pub captured_at: DateTime<Utc>,
}

impl RawArtifact {
  /// Handle for a snapshot already on disk, e.g. one left by an earlier `fetch`.
  ///
  /// The body must still be a non-empty array of market objects.
  pub fn open(path: impl Into<PathBuf>) -> LoaderResult<Self> {
    let path = path.into();
    let body = fs::read(&path).map_err(|e| LoaderError::io(&path, e))?;
    let records = parse_listing(&body)
      .map_err(|e| LoaderError::ArtifactMismatch { path: path.clone(), message: e.to_string() })?;
    let fetched_at = modified_at(&path)?;
    Ok(Self { path, record_count: records.len(), byte_len: body.len(), fetched_at })
  }
}

impl NormalizedArtifact {
  /// Handle for a normalized table already on disk.
  ///
  /// The capture time is read back from the `timestamp` column of the first row.
  pub fn open(path: impl Into<PathBuf>) -> LoaderResult<Self> {
    let path = path.into();
    let mut reader = csv::Reader::from_path(&path)?;
    let column = reader.headers()?.iter().position(|h| h == "timestamp").ok_or_else(|| {
      LoaderError::ArtifactMismatch { path: path.clone(), message: "no timestamp column".to_string() }
    })?;

    let mut row_count = 0;
    let mut captured_at = None;
    for record in reader.records() {
      let record = record?;
      if captured_at.is_none() {
        captured_at = record
          .get(column)
          .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
          .map(|t| t.with_timezone(&Utc));
      }
      row_count += 1;
    }

    let captured_at = captured_at.ok_or_else(|| LoaderError::ArtifactMismatch {
      path: path.clone(),
      message: "no rows with a capture timestamp".to_string(),
    })?;
    Ok(Self { path, row_count, captured_at })
  }
}

fn modified_at(path: &Path) -> LoaderResult<DateTime<Utc>> {
  let modified = fs::metadata(path).and_then(|m| m.modified()).map_err(|e| LoaderError::io(path, e))?;
  Ok(DateTime::<Utc>::from(modified))
}

/// Write `bytes` to `path` so that readers see either the old file or the
/// complete new one.
///
/// Data goes to a sibling `.tmp` file, is synced, then renamed over `path`.
/// On failure the temp file is removed and `path` is left untouched.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> LoaderResult<()> {
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    fs::create_dir_all(parent).map_err(|e| LoaderError::io(parent, e))?;
  }

  let tmp_path = tmp_sibling(path);
  let written = File::create(&tmp_path).and_then(|mut file| {
    file.write_all(bytes)?;
    file.sync_all()
  });

  if let Err(e) = written {
    let _ = fs::remove_file(&tmp_path);
    return Err(LoaderError::io(&tmp_path, e));
  }

  fs::rename(&tmp_path, path).map_err(|e| {
    // Clean up temp file on rename failure
    let _ = fs::remove_file(&tmp_path);
    LoaderError::io(path, e)
  })
}

fn tmp_sibling(path: &Path) -> PathBuf {
  let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
  name.push(".tmp");
  path.with_file_name(name)
}
