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
use cp_core::PipelineConfig;
use cp_loaders::Pipeline;

/// Fetch a snapshot into the working directory
pub async fn fetch(config: PipelineConfig) -> Result<()> {
  let pipeline = Pipeline::from_config(config)?;
  let raw = pipeline.fetch().await.context("Fetch failed")?;
  println!("Fetched {} records ({} bytes) into {}", raw.record_count, raw.byte_len, raw.path.display());
  Ok(())
}

/// Transform the raw snapshot already in the working directory
pub async fn transform(config: PipelineConfig) -> Result<()> {
  let pipeline = Pipeline::from_config(config)?;
  let normalized = pipeline.transform().await.context("Transform failed")?;
  println!(
    "Wrote {} rows captured at {} to {}",
    normalized.row_count,
    cp_models::market::format_timestamp(&normalized.captured_at),
    normalized.path.display()
  );
  Ok(())
}

/// Append the normalized table in the working directory to the warehouse
pub async fn load(config: PipelineConfig) -> Result<()> {
  let pipeline = Pipeline::from_config(config)?;
  let report = pipeline.load().await.context("Load failed")?;
  println!("Loaded {} rows into {} ({} total)", report.rows_loaded, report.table, report.total_rows);
  Ok(())
}
