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

//! # cp-loaders
//!
//! Steps of the crypto market pipeline and the run that chains them:
//! - Fetch a market snapshot and keep the response verbatim
//! - Transform it into the ten column normalized table
//! - Stage both artifacts in blob storage under per-run object names
//! - Append the normalized rows to the warehouse table
//! - Repeat on a fixed schedule

pub mod artifact;
pub mod error;
pub mod fetcher;
pub mod loader;
pub mod lock;
pub mod pipeline;
pub mod scheduler;
pub mod storage;
pub mod tracker;
pub mod transformer;
pub mod warehouse;

// Re-export commonly used types
pub use artifact::{NormalizedArtifact, RawArtifact};
pub use error::{LoaderError, LoaderResult};
pub use fetcher::Fetcher;
pub use loader::{run_tracked, PipelineStep};
pub use lock::RunLock;
pub use pipeline::{Pipeline, RunReport, TableLoader};
pub use scheduler::{run_schedule, ScheduleSummary};
pub use storage::{BlobRef, BlobStore, BucketOptions, LocalBlobStore};
pub use tracker::{RunTracker, StepInfo, StepState};
pub use transformer::Transformer;
pub use warehouse::{LoadReport, LoadRequest, LocalWarehouse, TableRef, Warehouse, WriteDisposition};

// Prelude for convenient imports
pub mod prelude {
  pub use crate::{
    BlobStore, LoaderError, LoaderResult, NormalizedArtifact, Pipeline, PipelineStep, RawArtifact,
    RunReport, RunTracker, Warehouse,
  };
}
