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

//! Configuration management for the crypto market pipeline
//!
//! Every step receives a [`PipelineConfig`] explicitly; nothing reads
//! process-wide constants at run time.

use crate::error::{Error, Result};
use crate::run_id::RunId;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

/// Settings for the upstream market-data API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
  /// Optional CoinGecko API key (demo or `CG-` pro key)
  pub api_key: Option<String>,

  /// Base URL of the API, without trailing `/coins/markets`
  pub base_url: String,

  /// Fixed page of the market listing fetched every run
  pub page: u32,

  /// Request timeout in seconds
  pub timeout_secs: u64,

  /// Retries for transport failures; scheduler-level retries are preferred
  pub max_retries: u32,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      api_key: None,
      base_url: crate::COINGECKO_BASE_URL.to_string(),
      page: crate::DEFAULT_PAGE,
      timeout_secs: crate::DEFAULT_TIMEOUT_SECS,
      max_retries: 0,
    }
  }
}

/// Main configuration struct for a pipeline run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
  /// Cloud project owning the dataset
  pub project: String,

  /// Blob bucket receiving raw and normalized artifacts
  pub bucket: String,

  /// Object name prefix for raw snapshots
  pub raw_path: String,

  /// Object name prefix for normalized tables
  pub transformed_path: String,

  /// Warehouse dataset
  pub dataset: String,

  /// Warehouse table
  pub table: String,

  /// Directory holding the local working artifacts
  pub work_dir: PathBuf,

  /// Root directory of the local blob store and warehouse
  pub storage_root: PathBuf,

  /// Upstream API settings
  pub api: ApiConfig,

  /// Minutes between scheduled runs
  pub schedule_minutes: u64,
}

impl PipelineConfig {
  /// Create a config with default values for everything except the project and bucket
  pub fn new(project: impl Into<String>, bucket: impl Into<String>) -> Self {
    Self {
      project: project.into(),
      bucket: bucket.into(),
      raw_path: "raw_data/crypto_raw_data".to_string(),
      transformed_path: "transformed_data/crypto_transformed_data".to_string(),
      dataset: "crypto_db".to_string(),
      table: "crypto_tb".to_string(),
      work_dir: PathBuf::from("."),
      storage_root: PathBuf::from("./storage"),
      api: ApiConfig::default(),
      schedule_minutes: crate::DEFAULT_SCHEDULE_MINUTES,
    }
  }

  /// Load configuration from environment variables
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let project =
      env::var("CP_PROJECT").map_err(|_| Error::Config("CP_PROJECT not set".to_string()))?;
    let bucket =
      env::var("CP_BUCKET").map_err(|_| Error::Config("CP_BUCKET not set".to_string()))?;

    let mut config = Self::new(project, bucket);
    config.apply_env()?;
    config.validate()?;
    Ok(config)
  }

  /// Override optional settings from any environment variables that are set
  pub fn apply_env(&mut self) -> Result<()> {
    if let Ok(v) = env::var("CP_RAW_PATH") {
      self.raw_path = v;
    }
    if let Ok(v) = env::var("CP_TRANSFORMED_PATH") {
      self.transformed_path = v;
    }
    if let Ok(v) = env::var("CP_DATASET") {
      self.dataset = v;
    }
    if let Ok(v) = env::var("CP_TABLE") {
      self.table = v;
    }
    if let Ok(v) = env::var("CP_WORK_DIR") {
      self.work_dir = PathBuf::from(v);
    }
    if let Ok(v) = env::var("CP_STORAGE_ROOT") {
      self.storage_root = PathBuf::from(v);
    }

    let api_key = env::var("COINGECKO_API_KEY").ok().filter(|k| !k.trim().is_empty());
    self.api.base_url = env::var("CP_BASE_URL")
      .unwrap_or_else(|_| crate::default_base_url(api_key.as_deref()).to_string());
    self.api.api_key = api_key;
    self.api.page = parse_env("CP_PAGE", self.api.page)?;
    self.api.timeout_secs = parse_env("CP_TIMEOUT_SECS", self.api.timeout_secs)?;
    self.api.max_retries = parse_env("CP_MAX_RETRIES", self.api.max_retries)?;
    self.schedule_minutes = parse_env("CP_SCHEDULE_MINUTES", self.schedule_minutes)?;
    Ok(())
  }

  /// Reject values the steps cannot work with
  pub fn validate(&self) -> Result<()> {
    for (name, value) in [
      ("project", &self.project),
      ("bucket", &self.bucket),
      ("dataset", &self.dataset),
      ("table", &self.table),
    ] {
      if value.trim().is_empty() {
        return Err(Error::Config(format!("{} must not be empty", name)));
      }
    }

    Url::parse(&self.api.base_url)
      .map_err(|e| Error::Config(format!("Invalid base URL '{}': {}", self.api.base_url, e)))?;

    if self.api.page == 0 {
      return Err(Error::Config("page numbers start at 1".to_string()));
    }
    if self.api.timeout_secs == 0 {
      return Err(Error::Config("timeout must be at least one second".to_string()));
    }
    if self.schedule_minutes == 0 {
      return Err(Error::Config("schedule interval must be at least one minute".to_string()));
    }
    if self.api.max_retries > crate::MAX_RETRIES_LIMIT {
      return Err(Error::Config(format!(
        "max retries must be at most {}, got {}",
        crate::MAX_RETRIES_LIMIT,
        self.api.max_retries
      )));
    }
    Ok(())
  }

  pub fn raw_artifact_path(&self) -> PathBuf {
    self.work_dir.join(crate::RAW_ARTIFACT_FILE)
  }

  pub fn normalized_artifact_path(&self) -> PathBuf {
    self.work_dir.join(crate::NORMALIZED_ARTIFACT_FILE)
  }

  /// Durable object name of a run's raw snapshot
  pub fn raw_object_name(&self, run: &RunId) -> String {
    format!("{}{}.json", self.raw_path, run.ts_nodash())
  }

  /// Durable object name of a run's normalized table
  pub fn transformed_object_name(&self, run: &RunId) -> String {
    format!("{}{}.csv", self.transformed_path, run.ts_nodash())
  }

  /// `dataset.table` as used in load logs
  pub fn qualified_table(&self) -> String {
    format!("{}.{}", self.dataset, self.table)
  }
}

fn parse_env<T: FromStr>(name: &str, default: T) -> Result<T> {
  match env::var(name) {
    Ok(raw) => raw.trim().parse().map_err(|_| Error::Config(format!("Invalid {}", name))),
    Err(_) => Ok(default),
  }
}
