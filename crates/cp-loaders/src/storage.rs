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

//! Blob storage for durable copies of run artifacts.
//!
//! [`BlobStore`] is the seam a cloud bucket connector plugs into;
//! [`LocalBlobStore`] keeps buckets as directories under a root.

use crate::artifact::write_atomic;
use crate::{LoaderError, LoaderResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const BUCKET_META_FILE: &str = ".bucket.json";

/// Settings applied when a bucket is first created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketOptions {
  pub storage_class: String,
  pub location: String,
}

impl Default for BucketOptions {
  fn default() -> Self {
    Self { storage_class: "MULTI_REGIONAL".to_string(), location: "US".to_string() }
  }
}

/// Location of an uploaded object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
  pub bucket: String,
  pub object: String,
  pub size: u64,
}

impl BlobRef {
  pub fn uri(&self) -> String {
    format!("gs://{}/{}", self.bucket, self.object)
  }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
  /// Create the bucket if it does not exist yet; existing buckets are left alone
  async fn ensure_bucket(&self, bucket: &str, options: &BucketOptions) -> LoaderResult<()>;

  /// Copy a local file to `bucket/object`, replacing any object of that name
  async fn upload_file(&self, bucket: &str, local_path: &Path, object: &str)
    -> LoaderResult<BlobRef>;

  /// Whether `bucket/object` exists; a missing bucket holds no objects
  async fn exists(&self, bucket: &str, object: &str) -> LoaderResult<bool>;

  /// Read an object back
  async fn download(&self, bucket: &str, object: &str) -> LoaderResult<Vec<u8>>;

  /// Object names under `prefix`, sorted
  async fn list(&self, bucket: &str, prefix: &str) -> LoaderResult<Vec<String>>;
}

/// Buckets as directories under `root`
pub struct LocalBlobStore {
  root: PathBuf,
}

impl LocalBlobStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  fn bucket_dir(&self, bucket: &str) -> LoaderResult<PathBuf> {
    validate_name("bucket", bucket)?;
    if bucket.contains('/') {
      return Err(LoaderError::StorageError(format!("bucket name '{}' contains '/'", bucket)));
    }
    Ok(self.root.join(bucket))
  }

  fn existing_bucket(&self, bucket: &str) -> LoaderResult<PathBuf> {
    let dir = self.bucket_dir(bucket)?;
    if !dir.join(BUCKET_META_FILE).is_file() {
      return Err(LoaderError::StorageError(format!("bucket '{}' does not exist", bucket)));
    }
    Ok(dir)
  }

  fn object_path(&self, bucket_dir: &Path, object: &str) -> LoaderResult<PathBuf> {
    validate_name("object", object)?;
    Ok(bucket_dir.join(object))
  }

  /// Options a bucket was created with
  pub fn bucket_options(&self, bucket: &str) -> LoaderResult<BucketOptions> {
    let meta = self.existing_bucket(bucket)?.join(BUCKET_META_FILE);
    let text = fs::read_to_string(&meta).map_err(|e| LoaderError::io(&meta, e))?;
    Ok(serde_json::from_str(&text)?)
  }
}

/// Names must be non-empty relative paths without empty, `.` or `..` segments
fn validate_name(kind: &str, name: &str) -> LoaderResult<()> {
  let clean = !name.is_empty()
    && !Path::new(name).has_root()
    && !name.contains('\\')
    && name.split('/').all(|s| !s.is_empty() && s != "." && s != "..");
  if clean {
    Ok(())
  } else {
    Err(LoaderError::StorageError(format!("invalid {} name '{}'", kind, name)))
  }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
  async fn ensure_bucket(&self, bucket: &str, options: &BucketOptions) -> LoaderResult<()> {
    let dir = self.bucket_dir(bucket)?;
    let meta = dir.join(BUCKET_META_FILE);
    if meta.is_file() {
      debug!("Bucket {} already exists", bucket);
      return Ok(());
    }

    fs::create_dir_all(&dir).map_err(|e| LoaderError::io(&dir, e))?;
    write_atomic(&meta, &serde_json::to_vec_pretty(options)?)?;
    info!("Created bucket {} ({}, {})", bucket, options.storage_class, options.location);
    Ok(())
  }

  async fn upload_file(
    &self,
    bucket: &str,
    local_path: &Path,
    object: &str,
  ) -> LoaderResult<BlobRef> {
    let dir = self.existing_bucket(bucket)?;
    let target = self.object_path(&dir, object)?;

    let bytes = fs::read(local_path).map_err(|e| LoaderError::io(local_path, e))?;
    write_atomic(&target, &bytes)?;

    let blob = BlobRef { bucket: bucket.to_string(), object: object.to_string(), size: bytes.len() as u64 };
    info!("Uploaded {} to {} ({} bytes)", local_path.display(), blob.uri(), blob.size);
    Ok(blob)
  }

  async fn exists(&self, bucket: &str, object: &str) -> LoaderResult<bool> {
    let dir = self.bucket_dir(bucket)?;
    let path = self.object_path(&dir, object)?;
    Ok(path.is_file())
  }

  async fn download(&self, bucket: &str, object: &str) -> LoaderResult<Vec<u8>> {
    let dir = self.existing_bucket(bucket)?;
    let path = self.object_path(&dir, object)?;
    fs::read(&path).map_err(|e| LoaderError::io(&path, e))
  }

  async fn list(&self, bucket: &str, prefix: &str) -> LoaderResult<Vec<String>> {
    let dir = self.existing_bucket(bucket)?;
    let mut objects = Vec::new();
    collect_objects(&dir, &dir, &mut objects)?;
    objects.retain(|name| name.starts_with(prefix) && name != BUCKET_META_FILE);
    objects.sort();
    Ok(objects)
  }
}

/// `<name>.tmp` beside an object `<name>`, left by `write_atomic`
fn is_temp_sibling(path: &Path) -> bool {
  path.extension().is_some_and(|ext| ext == "tmp")
    && path.file_stem().is_some_and(|stem| path.with_file_name(stem).is_file())
}

fn collect_objects(root: &Path, dir: &Path, out: &mut Vec<String>) -> LoaderResult<()> {
  for entry in fs::read_dir(dir).map_err(|e| LoaderError::io(dir, e))? {
    let path = entry.map_err(|e| LoaderError::io(dir, e))?.path();
    if path.is_dir() {
      collect_objects(root, &path, out)?;
    } else if !is_temp_sibling(&path) {
      if let Ok(relative) = path.strip_prefix(root) {
        out.push(relative.to_string_lossy().replace('\\', "/"));
      }
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  async fn store_with_bucket(dir: &TempDir) -> LocalBlobStore {
    let store = LocalBlobStore::new(dir.path().join("blobs"));
    store.ensure_bucket("crypto_data", &BucketOptions::default()).await.unwrap();
    store
  }

  #[tokio::test]
  async fn test_ensure_bucket_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = store_with_bucket(&dir).await;
    let other = BucketOptions { storage_class: "STANDARD".to_string(), location: "EU".to_string() };
    store.ensure_bucket("crypto_data", &other).await.unwrap();

    assert_eq!(store.bucket_options("crypto_data").unwrap(), BucketOptions::default());
  }

  #[tokio::test]
  async fn test_upload_and_download() {
    let dir = TempDir::new().unwrap();
    let store = store_with_bucket(&dir).await;
    let local = dir.path().join("crypto.json");
    fs::write(&local, "[{\"id\":\"bitcoin\"}]").unwrap();

    let blob = store
      .upload_file("crypto_data", &local, "raw_data/crypto_raw_data20250117T100000.json")
      .await
      .unwrap();

    assert_eq!(blob.uri(), "gs://crypto_data/raw_data/crypto_raw_data20250117T100000.json");
    assert_eq!(blob.size, 18);
    assert_eq!(
      store.download("crypto_data", &blob.object).await.unwrap(),
      b"[{\"id\":\"bitcoin\"}]".to_vec()
    );
  }

  #[tokio::test]
  async fn test_list_by_prefix() {
    let dir = TempDir::new().unwrap();
    let store = store_with_bucket(&dir).await;
    let local = dir.path().join("f");
    fs::write(&local, "x").unwrap();
    for object in ["raw/b.json", "raw/a.json", "transformed/a.csv"] {
      store.upload_file("crypto_data", &local, object).await.unwrap();
    }

    assert_eq!(store.list("crypto_data", "raw/").await.unwrap(), vec!["raw/a.json", "raw/b.json"]);
    assert_eq!(store.list("crypto_data", "").await.unwrap().len(), 3);
  }

  #[tokio::test]
  async fn test_upload_requires_bucket() {
    let dir = TempDir::new().unwrap();
    let store = LocalBlobStore::new(dir.path());
    let local = dir.path().join("f");
    fs::write(&local, "x").unwrap();

    let err = store.upload_file("missing", &local, "a").await.unwrap_err();
    assert!(matches!(err, LoaderError::StorageError(_)));
  }

  #[tokio::test]
  async fn test_rejects_escaping_object_names() {
    let dir = TempDir::new().unwrap();
    let store = store_with_bucket(&dir).await;
    let local = dir.path().join("f");
    fs::write(&local, "x").unwrap();

    for bad in ["", "../escape", "/abs", "dir/", "a/./b", "./a", "a//b", "a/..", "a\\b"] {
      assert!(store.upload_file("crypto_data", &local, bad).await.is_err(), "{} accepted", bad);
    }
  }

  #[test]
  fn test_validate_name() {
    assert!(validate_name("object", "transformed_data/crypto_transformed_data20250117T100000.csv").is_ok());
    assert!(validate_name("object", "a/.hidden/b..c").is_ok());
    assert!(validate_name("bucket", "..").is_err());
    assert!(validate_name("object", "a/./b").is_err());
    assert!(validate_name("object", ".").is_err());
  }

  #[tokio::test]
  async fn test_list_keeps_user_tmp_objects() {
    let dir = TempDir::new().unwrap();
    let store = store_with_bucket(&dir).await;
    let local = dir.path().join("f");
    fs::write(&local, "x").unwrap();
    store.upload_file("crypto_data", &local, "exports/backup.tmp").await.unwrap();
    store.upload_file("crypto_data", &local, "exports/a.csv").await.unwrap();
    // Leftover of an interrupted write next to its target
    fs::write(dir.path().join("blobs/crypto_data/exports/a.csv.tmp"), "partial").unwrap();

    assert_eq!(
      store.list("crypto_data", "exports/").await.unwrap(),
      vec!["exports/a.csv", "exports/backup.tmp"]
    );
  }

  #[tokio::test]
  async fn test_exists() {
    let dir = TempDir::new().unwrap();
    let store = LocalBlobStore::new(dir.path().join("blobs"));
    assert!(!store.exists("crypto_data", "raw/a.json").await.unwrap());

    store.ensure_bucket("crypto_data", &BucketOptions::default()).await.unwrap();
    let local = dir.path().join("f");
    fs::write(&local, "x").unwrap();
    store.upload_file("crypto_data", &local, "raw/a.json").await.unwrap();

    assert!(store.exists("crypto_data", "raw/a.json").await.unwrap());
    assert!(!store.exists("crypto_data", "raw/b.json").await.unwrap());
  }
}
