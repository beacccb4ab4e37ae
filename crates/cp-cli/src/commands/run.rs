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
use cp_core::{PipelineConfig, RunId};
use cp_loaders::Pipeline;
use tracing::info;

#[derive(Args, Debug)]
pub struct RunArgs {
  /// Logical run time, `YYYYMMDDTHHMMSS[ffffff]` or RFC 3339 (defaults to now)
  #[arg(long)]
  run_id: Option<String>,

  /// Print the report as JSON
  #[arg(long)]
  json: bool,
}

pub async fn execute(args: RunArgs, config: PipelineConfig) -> Result<()> {
  let run_id = match &args.run_id {
    Some(raw) => raw.parse::<RunId>().with_context(|| format!("Invalid run id '{}'", raw))?,
    None => RunId::now(),
  };

  let pipeline = Pipeline::from_config(config).context("Failed to build pipeline")?;
  info!("Running pipeline once as {}", run_id);

  let result = pipeline.run(run_id).await;
  let steps = pipeline.tracker().get_all().await;

  let report = match result {
    Ok(report) => report,
    Err(e) => {
      println!("Run {} failed:", run_id);
      super::print_steps(&steps);
      return Err(e).context(format!("Run {} failed", run_id));
    }
  };

  if args.json {
    let summary = serde_json::json!({
      "run_id": report.run_id.to_string(),
      "raw_object": report.raw_blob.uri(),
      "transformed_object": report.normalized_blob.uri(),
      "records_fetched": report.raw.record_count,
      "rows_loaded": report.rows_loaded(),
      "table": report.load.table.to_string(),
      "table_rows": report.load.total_rows,
      "captured_at": cp_models::market::format_timestamp(&report.normalized.captured_at),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    return Ok(());
  }

  println!("Run {} complete", report.run_id);
  println!("  Raw snapshot:      {} ({} records)", report.raw_blob.uri(), report.raw.record_count);
  println!("  Normalized table:  {}", report.normalized_blob.uri());
  println!("  Loaded:            {} rows into {} ({} total)", report.rows_loaded(), report.load.table, report.load.total_rows);
  super::print_steps(&report.steps);
  Ok(())
}
