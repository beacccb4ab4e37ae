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

use chrono::DateTime;
use cp_core::{ApiConfig, PipelineConfig, RunId};
use cp_loaders::prelude::*;
use cp_loaders::{LocalBlobStore, LocalWarehouse, StepState};
use cp_models::TableSchema;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FIRST: &str = r#"[
  {"id":"bitcoin","symbol":"btc","name":"Bitcoin","image":"https://assets/btc.png","current_price":65000.5,
   "market_cap":1280000000000,"total_volume":21000000000,"price_change_24h":-120.3,
   "total_supply":19800000,"max_supply":21000000,"last_updated":"2025-01-17T10:00:00.000Z"},
  {"id":"tether","symbol":"usdt","name":"Tether","current_price":"1.0001","total_volume":52000000000,
   "price_change_24h":0.0002,"total_supply":118000000000,"max_supply":null,"last_updated":"2025-01-17T09:59:58.120Z"}
]"#;

const SECOND: &str = r#"[
  {"id":"ethereum","symbol":"eth","name":"Ethereum","current_price":3400.25,"total_volume":900000000,
   "price_change_24h":12.5,"total_supply":120000000,"max_supply":null,"last_updated":"2025-01-17T10:10:00Z"}
]"#;

struct Harness {
  _dir: TempDir,
  config: PipelineConfig,
  server: MockServer,
}

impl Harness {
  async fn new() -> Self {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let mut config = PipelineConfig::new("test-project", "crypto_data");
    config.work_dir = dir.path().join("work");
    config.storage_root = dir.path().join("storage");
    config.api = ApiConfig { base_url: server.uri(), timeout_secs: 5, ..ApiConfig::default() };
    Self { _dir: dir, config, server }
  }

  async fn respond_once(&self, body: &str) {
    Mock::given(method("GET"))
      .and(path("/coins/markets"))
      .and(query_param("vs_currency", "usd"))
      .and(query_param("order", "market_cap_asc"))
      .and(query_param("page", "10"))
      .and(query_param("sparkline", "false"))
      .respond_with(ResponseTemplate::new(200).set_body_string(body))
      .up_to_n_times(1)
      .mount(&self.server)
      .await;
  }

  fn pipeline(&self) -> Pipeline {
    Pipeline::from_config(self.config.clone()).unwrap()
  }

  fn blobs(&self) -> LocalBlobStore {
    LocalBlobStore::new(self.config.storage_root.join(cp_loaders::pipeline::BLOB_DIR))
  }

  fn warehouse(&self) -> LocalWarehouse {
    LocalWarehouse::new(self.config.storage_root.join(cp_loaders::pipeline::WAREHOUSE_DIR))
  }
}

#[tokio::test]
async fn two_runs_stage_distinct_objects_and_append_two_batches() {
  let harness = Harness::new().await;
  harness.respond_once(FIRST).await;
  harness.respond_once(SECOND).await;
  let pipeline = harness.pipeline();

  let first_id: RunId = "20250117T100000".parse().unwrap();
  let second_id: RunId = "20250117T101000".parse().unwrap();
  let first = pipeline.run(first_id).await.unwrap();
  let second = pipeline.run(second_id).await.unwrap();

  assert_eq!(first.rows_loaded(), 2);
  assert_eq!(second.rows_loaded(), 1);
  assert_eq!(second.load.total_rows, 3);
  assert!(first.steps.iter().chain(&second.steps).all(|s| s.state == StepState::Success));

  let blobs = harness.blobs();
  assert_eq!(
    blobs.list("crypto_data", "raw_data/").await.unwrap(),
    vec![
      "raw_data/crypto_raw_data20250117T100000.json",
      "raw_data/crypto_raw_data20250117T101000.json",
    ]
  );
  assert_eq!(
    blobs.list("crypto_data", "transformed_data/").await.unwrap(),
    vec![
      "transformed_data/crypto_transformed_data20250117T100000.csv",
      "transformed_data/crypto_transformed_data20250117T101000.csv",
    ]
  );

  // Staged raw copy is the upstream body, byte for byte
  let staged = blobs.download("crypto_data", &first.raw_blob.object).await.unwrap();
  assert_eq!(String::from_utf8(staged).unwrap(), FIRST);

  let rows = harness.warehouse().rows(pipeline.table()).unwrap();
  let ids: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
  assert_eq!(ids, vec!["bitcoin", "tether", "ethereum"]);

  // Batches carry their own capture time, shared by every row of the batch
  assert_eq!(rows[0][9], rows[1][9]);
  let captured = |row: &Vec<String>| DateTime::parse_from_rfc3339(&row[9]).unwrap();
  assert!(captured(&rows[2]) >= captured(&rows[0]));
}

#[tokio::test]
async fn back_to_back_runs_keep_both_staged_copies() {
  let harness = Harness::new().await;
  harness.respond_once(FIRST).await;
  harness.respond_once(SECOND).await;
  let pipeline = harness.pipeline();

  let first = pipeline.run(RunId::now()).await.unwrap();
  let second = pipeline.run(RunId::now()).await.unwrap();

  assert_ne!(first.run_id, second.run_id);
  assert_ne!(first.raw_blob.object, second.raw_blob.object);
  let blobs = harness.blobs();
  assert_eq!(blobs.list("crypto_data", "raw_data/").await.unwrap().len(), 2);
  assert_eq!(blobs.list("crypto_data", "transformed_data/").await.unwrap().len(), 2);
  assert_eq!(second.load.total_rows, 3);

  let staged = blobs.download("crypto_data", &first.raw_blob.object).await.unwrap();
  assert_eq!(String::from_utf8(staged).unwrap(), FIRST);
}

#[tokio::test]
async fn loaded_rows_follow_the_table_contract() {
  let harness = Harness::new().await;
  harness.respond_once(FIRST).await;
  let pipeline = harness.pipeline();

  let report = pipeline.run("20250117T100500".parse().unwrap()).await.unwrap();

  let csv = fs::read_to_string(&report.normalized.path).unwrap();
  let header = csv.lines().next().unwrap();
  assert_eq!(header, TableSchema::crypto_markets().field_names().join(","));

  let rows = harness.warehouse().rows(pipeline.table()).unwrap();
  assert_eq!(
    rows[0][..9].to_vec(),
    vec![
      "bitcoin", "btc", "Bitcoin", "65000.5", "21000000000", "-120.3", "19800000", "21000000",
      "2025-01-17T10:00:00Z",
    ]
  );
  // String price coerced, null max_supply kept empty
  assert_eq!(rows[1][3], "1.0001");
  assert_eq!(rows[1][7], "");
  assert_eq!(rows[1][8], "2025-01-17T09:59:58.120Z");
}

#[tokio::test]
async fn failed_fetch_loads_nothing() {
  let harness = Harness::new().await;
  harness.respond_once(FIRST).await;
  let pipeline = harness.pipeline();
  pipeline.run("20250117T100000".parse().unwrap()).await.unwrap();

  // Mock exhausted: the upstream now answers 404
  let err = pipeline.run("20250117T101000".parse().unwrap()).await.unwrap_err();
  assert!(matches!(err, LoaderError::Upstream(_)));

  let warehouse = harness.warehouse();
  assert_eq!(warehouse.row_count(pipeline.table()).await.unwrap(), 2);
  assert_eq!(harness.blobs().list("crypto_data", "raw_data/").await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_run_is_refused() {
  let harness = Harness::new().await;
  harness.respond_once(FIRST).await;
  let pipeline = harness.pipeline();
  let _held = cp_loaders::RunLock::acquire(&harness.config.work_dir).unwrap();

  let err = pipeline.run(RunId::now()).await.unwrap_err();
  assert!(matches!(err, LoaderError::RunInProgress(_)));
  assert!(pipeline.tracker().get_all().await.is_empty());
}
