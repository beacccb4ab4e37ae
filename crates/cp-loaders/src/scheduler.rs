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

//! Fixed-interval run loop.
//!
//! Runs never overlap: the next tick is only awaited once the current run
//! has returned. Ticks missed while a run was in progress are skipped, not
//! replayed. A failed run is logged and the loop carries on.

use crate::pipeline::Pipeline;
use cp_core::RunId;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

/// Counts of a finished schedule loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleSummary {
  pub runs: usize,
  pub succeeded: usize,
  pub failed: usize,
  pub rows_loaded: usize,
}

/// Run `pipeline` every `interval`, starting immediately.
///
/// Stops after `max_runs` runs when given; otherwise loops until the future
/// is dropped.
pub async fn run_schedule(
  pipeline: &Pipeline,
  interval: Duration,
  max_runs: Option<usize>,
) -> ScheduleSummary {
  let mut ticker = time::interval(interval);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
  let mut summary = ScheduleSummary::default();

  info!("Scheduling runs every {:?}", interval);
  while max_runs.map_or(true, |max| summary.runs < max) {
    ticker.tick().await;
    let run_id = RunId::now();
    summary.runs += 1;

    match pipeline.run(run_id).await {
      Ok(report) => {
        summary.succeeded += 1;
        summary.rows_loaded += report.rows_loaded();
        info!("Run {} succeeded: {} rows loaded", run_id, report.rows_loaded());
      }
      Err(e) => {
        summary.failed += 1;
        error!("Run {} failed: {}", run_id, e);
      }
    }
  }

  if summary.failed > 0 {
    warn!("{} of {} scheduled runs failed", summary.failed, summary.runs);
  }
  summary
}

#[cfg(test)]
mod tests {
  use super::*;
  use cp_core::{ApiConfig, PipelineConfig};
  use tempfile::TempDir;
  use wiremock::matchers::method;
  use wiremock::{Mock, MockServer, ResponseTemplate};

  const BODY: &str = r#"[{"id":"bitcoin","symbol":"btc","name":"Bitcoin","current_price":65000.5,
    "total_volume":null,"price_change_24h":null,"total_supply":null,"max_supply":null,"last_updated":null}]"#;

  fn pipeline(server: &MockServer, dir: &TempDir) -> Pipeline {
    let mut config = PipelineConfig::new("proj", "crypto_data");
    config.work_dir = dir.path().join("work");
    config.storage_root = dir.path().join("storage");
    config.api = ApiConfig { base_url: server.uri(), timeout_secs: 5, ..ApiConfig::default() };
    Pipeline::from_config(config).unwrap()
  }

  #[tokio::test]
  async fn test_schedule_stops_after_max_runs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(200).set_body_string(BODY))
      .mount(&server)
      .await;
    let dir = TempDir::new().unwrap();

    let summary = run_schedule(&pipeline(&server, &dir), Duration::from_millis(10), Some(2)).await;

    assert_eq!(summary, ScheduleSummary { runs: 2, succeeded: 2, failed: 0, rows_loaded: 2 });
  }

  #[tokio::test]
  async fn test_schedule_continues_after_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(200).set_body_string(BODY))
      .up_to_n_times(1)
      .mount(&server)
      .await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(500)).mount(&server).await;
    let dir = TempDir::new().unwrap();

    let summary = run_schedule(&pipeline(&server, &dir), Duration::from_millis(10), Some(3)).await;

    assert_eq!(summary.runs, 3);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 2);
  }

  #[tokio::test]
  async fn test_schedule_recovers_from_leftover_lock() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(200).set_body_string(BODY))
      .mount(&server)
      .await;
    let dir = TempDir::new().unwrap();
    let work = dir.path().join("work");
    std::fs::create_dir_all(&work).unwrap();
    let acquired = chrono::Utc::now() - chrono::Duration::hours(3);
    std::fs::write(
      work.join(crate::lock::LOCK_FILE),
      format!("pid={} acquired={}\n", std::process::id(), acquired.to_rfc3339()),
    )
    .unwrap();

    let summary = run_schedule(&pipeline(&server, &dir), Duration::from_millis(10), Some(2)).await;

    assert_eq!(summary, ScheduleSummary { runs: 2, succeeded: 2, failed: 0, rows_loaded: 2 });
    assert!(!work.join(crate::lock::LOCK_FILE).exists());
  }
}
