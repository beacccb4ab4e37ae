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

//! One pipeline run: fetch, stage the raw snapshot, transform, stage the
//! normalized table, then append it to the warehouse.
//!
//! Steps run strictly in sequence and hand each other explicit artifact
//! handles. The first failing step ends the run; later steps never start.

use crate::artifact::{NormalizedArtifact, RawArtifact};
use crate::fetcher::Fetcher;
use crate::loader::{run_tracked, track, PipelineStep};
use crate::lock::RunLock;
use crate::storage::{BlobRef, BlobStore, BucketOptions, LocalBlobStore};
use crate::tracker::{RunTracker, StepInfo};
use crate::transformer::Transformer;
use crate::warehouse::{LoadReport, LoadRequest, LocalWarehouse, TableRef, Warehouse};
use crate::{LoaderError, LoaderResult};
use async_trait::async_trait;
use cp_core::{PipelineConfig, RunId};
use cp_models::TableSchema;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// Directory under the storage root holding local buckets
pub const BLOB_DIR: &str = "blobs";

/// Directory under the storage root holding the local warehouse
pub const WAREHOUSE_DIR: &str = "warehouse";

/// Load step: append a normalized artifact to the destination table
pub struct TableLoader {
  warehouse: Arc<dyn Warehouse>,
  table: TableRef,
  schema: TableSchema,
}

impl TableLoader {
  pub fn new(warehouse: Arc<dyn Warehouse>, table: TableRef) -> Self {
    Self { warehouse, table, schema: TableSchema::crypto_markets() }
  }

  pub fn table(&self) -> &TableRef {
    &self.table
  }

  pub fn schema(&self) -> &TableSchema {
    &self.schema
  }
}

#[async_trait]
impl PipelineStep for TableLoader {
  type Input = NormalizedArtifact;
  type Output = LoadReport;

  async fn execute(&self, input: NormalizedArtifact) -> LoaderResult<LoadReport> {
    let request = LoadRequest::append_csv(self.table.clone(), &input.path, self.schema.clone());
    self.warehouse.load_csv(&request).await
  }

  /// The file on disk must still hold the rows the handle promises
  async fn validate_input(&self, input: &NormalizedArtifact) -> LoaderResult<()> {
    let on_disk = NormalizedArtifact::open(&input.path)?;
    if on_disk.row_count != input.row_count {
      return Err(LoaderError::ArtifactMismatch {
        path: input.path.clone(),
        message: format!("expected {} rows, found {}", input.row_count, on_disk.row_count),
      });
    }
    Ok(())
  }

  fn records_in(output: &LoadReport) -> Option<usize> {
    Some(output.rows_loaded)
  }

  fn name(&self) -> &'static str {
    "load_to_warehouse"
  }
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct RunReport {
  pub run_id: RunId,
  pub raw: RawArtifact,
  pub normalized: NormalizedArtifact,
  pub raw_blob: BlobRef,
  pub normalized_blob: BlobRef,
  pub load: LoadReport,
  pub steps: Vec<StepInfo>,
}

impl RunReport {
  pub fn rows_loaded(&self) -> usize {
    self.load.rows_loaded
  }
}

pub struct Pipeline {
  config: PipelineConfig,
  fetcher: Fetcher,
  transformer: Transformer,
  loader: TableLoader,
  blob_store: Arc<dyn BlobStore>,
  warehouse: Arc<dyn Warehouse>,
  bucket_options: BucketOptions,
  tracker: RunTracker,
}

fn no_records<T>(_: &T) -> Option<usize> {
  None
}

impl Pipeline {
  pub fn new(
    config: PipelineConfig,
    fetcher: Fetcher,
    blob_store: Arc<dyn BlobStore>,
    warehouse: Arc<dyn Warehouse>,
  ) -> Self {
    let transformer = Transformer::new(config.normalized_artifact_path());
    let table = TableRef::new(&config.project, &config.dataset, &config.table);
    let loader = TableLoader::new(Arc::clone(&warehouse), table);
    Self {
      config,
      fetcher,
      transformer,
      loader,
      blob_store,
      warehouse,
      bucket_options: BucketOptions::default(),
      tracker: RunTracker::new(),
    }
  }

  /// Pipeline backed by the local blob store and warehouse under `storage_root`
  pub fn from_config(config: PipelineConfig) -> LoaderResult<Self> {
    config.validate().map_err(|e| LoaderError::ConfigurationError(e.to_string()))?;
    let fetcher = Fetcher::from_config(&config)?;
    let blob_store = Arc::new(LocalBlobStore::new(config.storage_root.join(BLOB_DIR)));
    let warehouse = Arc::new(LocalWarehouse::new(config.storage_root.join(WAREHOUSE_DIR)));
    Ok(Self::new(config, fetcher, blob_store, warehouse))
  }

  pub fn with_bucket_options(mut self, options: BucketOptions) -> Self {
    self.bucket_options = options;
    self
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  /// Steps of the current or most recent run
  pub fn tracker(&self) -> &RunTracker {
    &self.tracker
  }

  pub fn table(&self) -> &TableRef {
    self.loader.table()
  }

  /// Execute the whole chain for `run_id`
  #[instrument(skip(self, run_id), fields(run_id = %run_id))]
  pub async fn run(&self, run_id: RunId) -> LoaderResult<RunReport> {
    let _lock = RunLock::acquire(&self.config.work_dir)?;
    self.tracker.clear().await;
    self.ensure_unstaged(&run_id).await?;
    info!("Starting run {} into {}", run_id, self.loader.table());

    let raw = run_tracked(&self.fetcher, &self.tracker, ()).await?;

    self.ensure_bucket().await?;
    let raw_blob =
      self.upload("upload_raw_data", &raw.path, self.config.raw_object_name(&run_id)).await?;

    let normalized = run_tracked(&self.transformer, &self.tracker, raw.clone()).await?;
    let normalized_blob = self
      .upload("upload_transformed_data", &normalized.path, self.config.transformed_object_name(&run_id))
      .await?;

    self.ensure_destination().await?;
    let load = run_tracked(&self.loader, &self.tracker, normalized.clone()).await?;

    info!("Run {} loaded {} rows ({} in table)", run_id, load.rows_loaded, load.total_rows);
    Ok(RunReport {
      run_id,
      raw,
      normalized,
      raw_blob,
      normalized_blob,
      load,
      steps: self.tracker.get_all().await,
    })
  }

  /// Fetch only, leaving the raw artifact in the working directory
  pub async fn fetch(&self) -> LoaderResult<RawArtifact> {
    let _lock = RunLock::acquire(&self.config.work_dir)?;
    self.tracker.clear().await;
    run_tracked(&self.fetcher, &self.tracker, ()).await
  }

  /// Transform the raw artifact in the working directory
  pub async fn transform(&self) -> LoaderResult<NormalizedArtifact> {
    let _lock = RunLock::acquire(&self.config.work_dir)?;
    self.tracker.clear().await;
    let raw = RawArtifact::open(self.config.raw_artifact_path())?;
    run_tracked(&self.transformer, &self.tracker, raw).await
  }

  /// Load the normalized artifact in the working directory
  pub async fn load(&self) -> LoaderResult<LoadReport> {
    let _lock = RunLock::acquire(&self.config.work_dir)?;
    self.tracker.clear().await;
    let normalized = NormalizedArtifact::open(self.config.normalized_artifact_path())?;
    self.ensure_destination().await?;
    run_tracked(&self.loader, &self.tracker, normalized).await
  }

  async fn ensure_bucket(&self) -> LoaderResult<()> {
    let work = self.blob_store.ensure_bucket(&self.config.bucket, &self.bucket_options);
    track(&self.tracker, "create_bucket", no_records, work).await
  }

  async fn upload(&self, step: &str, local: &Path, object: String) -> LoaderResult<BlobRef> {
    let work = self.blob_store.upload_file(&self.config.bucket, local, &object);
    track(&self.tracker, step, no_records, work).await
  }

  /// A run id stages its objects once; a repeat would overwrite them
  async fn ensure_unstaged(&self, run_id: &RunId) -> LoaderResult<()> {
    let objects = [self.config.raw_object_name(run_id), self.config.transformed_object_name(run_id)];
    for object in objects {
      if self.blob_store.exists(&self.config.bucket, &object).await? {
        return Err(LoaderError::RunAlreadyStaged { run_id: run_id.to_string(), object });
      }
    }
    Ok(())
  }

  async fn ensure_destination(&self) -> LoaderResult<()> {
    let table = self.loader.table();
    let work = self.warehouse.ensure_dataset(&table.project, &table.dataset);
    track(&self.tracker, "create_dataset", no_records, work).await?;

    let work = self.warehouse.ensure_table(table, self.loader.schema());
    track(&self.tracker, "create_table", no_records, work).await
  }
}
