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
use cp_loaders::{run_schedule, Pipeline};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct ScheduleArgs {
  /// Minutes between runs (defaults to CP_SCHEDULE_MINUTES)
  #[arg(long)]
  interval_minutes: Option<u64>,

  /// Stop after this many runs
  #[arg(long)]
  max_runs: Option<usize>,
}

pub async fn execute(args: ScheduleArgs, config: PipelineConfig) -> Result<()> {
  let minutes = args.interval_minutes.unwrap_or(config.schedule_minutes);
  if minutes == 0 {
    anyhow::bail!("--interval-minutes must be at least 1");
  }
  let interval = Duration::from_secs(minutes * 60);
  let pipeline = Pipeline::from_config(config).context("Failed to build pipeline")?;

  tokio::select! {
    summary = run_schedule(&pipeline, interval, args.max_runs) => {
      println!(
        "Schedule finished: {} runs, {} succeeded, {} failed, {} rows loaded",
        summary.runs, summary.succeeded, summary.failed, summary.rows_loaded
      );
      if summary.failed > 0 {
        warn!("{} scheduled runs failed", summary.failed);
      }
    }
    _ = tokio::signal::ctrl_c() => {
      info!("Interrupted, stopping schedule");
    }
  }
  Ok(())
}
