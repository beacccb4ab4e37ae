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

use cp_models::SchemaError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaderError {
  #[error("Upstream fetch failed: {0}")]
  Upstream(#[from] cp_core::Error),

  #[error("Malformed record at index {index}{}: {reason}", id_suffix(.id))]
  MalformedRecord { index: usize, id: Option<String>, reason: String },

  #[error("Schema mismatch in {context}: {source}")]
  SchemaMismatch {
    context: String,
    #[source]
    source: SchemaError,
  },

  #[error("Artifact {} does not match its handle: {message}", .path.display())]
  ArtifactMismatch { path: PathBuf, message: String },

  #[error("CSV error: {0}")]
  CsvError(String),

  #[error("IO error on {}: {message}", .path.display())]
  IoError { path: PathBuf, message: String },

  #[error("Serialization error: {0}")]
  SerializationError(String),

  #[error("Blob storage error: {0}")]
  StorageError(String),

  #[error("Warehouse error: {0}")]
  WarehouseError(String),

  #[error("Another run holds the lock at {}", .0.display())]
  RunInProgress(PathBuf),

  #[error("Run {run_id} already staged {object}")]
  RunAlreadyStaged { run_id: String, object: String },

  #[error("Configuration error: {0}")]
  ConfigurationError(String),
}

fn id_suffix(id: &Option<String>) -> String {
  id.as_ref().map(|id| format!(" (id '{}')", id)).unwrap_or_default()
}

impl LoaderError {
  /// IO failure tied to the path it happened on
  pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
    LoaderError::IoError { path: path.into(), message: err.to_string() }
  }

  pub fn schema(context: impl Into<String>, source: SchemaError) -> Self {
    LoaderError::SchemaMismatch { context: context.into(), source }
  }
}

// Implement conversions manually
impl From<csv::Error> for LoaderError {
  fn from(err: csv::Error) -> Self {
    LoaderError::CsvError(err.to_string())
  }
}

impl From<serde_json::Error> for LoaderError {
  fn from(err: serde_json::Error) -> Self {
    LoaderError::SerializationError(err.to_string())
  }
}

pub type LoaderResult<T> = Result<T, LoaderError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_malformed_record_display_with_id() {
    let err = LoaderError::MalformedRecord {
      index: 3,
      id: Some("bitcoin".to_string()),
      reason: "missing required field 'name'".to_string(),
    };
    assert_eq!(
      err.to_string(),
      "Malformed record at index 3 (id 'bitcoin'): missing required field 'name'"
    );
  }

  #[test]
  fn test_malformed_record_display_without_id() {
    let err =
      LoaderError::MalformedRecord { index: 0, id: None, reason: "missing required field 'id'".to_string() };
    assert_eq!(err.to_string(), "Malformed record at index 0: missing required field 'id'");
  }

  #[test]
  fn test_io_error_names_path() {
    let err = LoaderError::io(
      "/tmp/crypto.json",
      std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
    );
    assert!(err.to_string().starts_with("IO error on /tmp/crypto.json"));
  }

  #[test]
  fn test_from_core_error() {
    let err = LoaderError::from(cp_core::Error::Timeout(30));
    assert!(matches!(err, LoaderError::Upstream(_)));
    assert!(err.to_string().contains("timed out"));
  }

  #[test]
  fn test_schema_mismatch_display() {
    let err = LoaderError::schema(
      "transformed_data.csv",
      SchemaError::ColumnCount { expected: 10, found: 9 },
    );
    assert_eq!(
      err.to_string(),
      "Schema mismatch in transformed_data.csv: expected 10 columns, found 9"
    );
  }

  #[test]
  fn test_from_serde_json_error() {
    let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
    assert!(matches!(LoaderError::from(json_err), LoaderError::SerializationError(_)));
  }
}
