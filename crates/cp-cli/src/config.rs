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

use anyhow::{Context, Result};
use clap::Args;
use cp_core::PipelineConfig;
use std::path::PathBuf;

/// Settings shared by every command that touches the pipeline
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
  /// Cloud project owning the bucket and the warehouse dataset
  #[arg(long, env = "CP_PROJECT", global = true)]
  pub project: Option<String>,

  /// Bucket receiving the raw and transformed artifacts
  #[arg(long, env = "CP_BUCKET", global = true)]
  pub bucket: Option<String>,

  /// Directory holding the local working artifacts
  #[arg(long, global = true)]
  pub work_dir: Option<PathBuf>,

  /// Root of the local blob store and warehouse
  #[arg(long, global = true)]
  pub storage_root: Option<PathBuf>,

  /// Page of the market listing to fetch
  #[arg(long, global = true)]
  pub page: Option<u32>,
}

/// Build the pipeline config: required values from flags or environment,
/// optional values from the environment, then flag overrides.
pub fn load(args: &ConfigArgs) -> Result<PipelineConfig> {
  let project = args.project.clone().context("CP_PROJECT not set and --project not given")?;
  let bucket = args.bucket.clone().context("CP_BUCKET not set and --bucket not given")?;

  let mut config = PipelineConfig::new(project, bucket);
  config.apply_env().context("Invalid pipeline environment")?;

  if let Some(dir) = &args.work_dir {
    config.work_dir = dir.clone();
  }
  if let Some(root) = &args.storage_root {
    config.storage_root = root.clone();
  }
  if let Some(page) = args.page {
    config.api.page = page;
  }

  config.validate().context("Invalid pipeline configuration")?;
  Ok(config)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  #[serial]
  fn test_flags_override_defaults() {
    let args = ConfigArgs {
      project: Some("p".to_string()),
      bucket: Some("b".to_string()),
      work_dir: Some(PathBuf::from("/tmp/work")),
      storage_root: None,
      page: Some(3),
    };
    let config = load(&args).unwrap();
    assert_eq!(config.work_dir, PathBuf::from("/tmp/work"));
    assert_eq!(config.api.page, 3);
  }

  #[test]
  #[serial]
  fn test_missing_bucket_is_reported() {
    let args = ConfigArgs { project: Some("p".to_string()), ..ConfigArgs::default() };
    let err = load(&args).unwrap_err();
    assert!(err.to_string().contains("CP_BUCKET"));
  }

  #[test]
  #[serial]
  fn test_zero_page_rejected() {
    let args = ConfigArgs {
      project: Some("p".to_string()),
      bucket: Some("b".to_string()),
      page: Some(0),
      ..ConfigArgs::default()
    };
    assert!(load(&args).is_err());
  }
}
