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

//! Fetch step: one market snapshot from the upstream API, persisted verbatim.

use crate::artifact::{write_atomic, RawArtifact};
use crate::loader::PipelineStep;
use crate::LoaderResult;
use async_trait::async_trait;
use cp_client::CoinGeckoClient;
use cp_core::PipelineConfig;
use std::path::PathBuf;
use tracing::{info, instrument};

pub struct Fetcher {
  client: CoinGeckoClient,
  raw_path: PathBuf,
}

impl Fetcher {
  pub fn new(client: CoinGeckoClient, raw_path: impl Into<PathBuf>) -> Self {
    Self { client, raw_path: raw_path.into() }
  }

  pub fn from_config(config: &PipelineConfig) -> LoaderResult<Self> {
    Ok(Self::new(CoinGeckoClient::new(&config.api)?, config.raw_artifact_path()))
  }

  pub fn raw_path(&self) -> &PathBuf {
    &self.raw_path
  }

  /// Fetch one snapshot and write the response body, byte for byte, to the
  /// raw artifact path.
  ///
  /// Nothing is written unless the fetch succeeded and the body has the
  /// expected shape.
  #[instrument(skip(self), fields(path = %self.raw_path.display()))]
  pub async fn fetch_snapshot(&self) -> LoaderResult<RawArtifact> {
    let snapshot = self.client.markets().fetch_snapshot().await?;

    write_atomic(&self.raw_path, &snapshot.body)?;
    info!("Wrote raw snapshot: {} records, {} bytes", snapshot.records.len(), snapshot.body.len());

    Ok(RawArtifact {
      path: self.raw_path.clone(),
      record_count: snapshot.records.len(),
      byte_len: snapshot.body.len(),
      fetched_at: snapshot.fetched_at,
    })
  }
}

#[async_trait]
impl PipelineStep for Fetcher {
  type Input = ();
  type Output = RawArtifact;

  async fn execute(&self, _input: ()) -> LoaderResult<RawArtifact> {
    self.fetch_snapshot().await
  }

  fn records_in(output: &RawArtifact) -> Option<usize> {
    Some(output.record_count)
  }

  fn name(&self) -> &'static str {
    "fetch_data_from_api"
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::LoaderError;
  use cp_core::ApiConfig;
  use std::fs;
  use tempfile::TempDir;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  const BODY: &str = "[{\"id\":\"bitcoin\",\"symbol\":\"btc\",\"name\":\"Bitcoin\",\"current_price\":65000.5,\"image\":\"https://x/btc.png\"}]\n";

  fn fetcher(server: &MockServer, dir: &TempDir) -> Fetcher {
    let api = ApiConfig { base_url: server.uri(), timeout_secs: 5, ..ApiConfig::default() };
    Fetcher::new(CoinGeckoClient::new(&api).unwrap(), dir.path().join("crypto.json"))
  }

  #[tokio::test]
  async fn test_fetch_writes_body_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/coins/markets"))
      .respond_with(ResponseTemplate::new(200).set_body_string(BODY))
      .mount(&server)
      .await;
    let dir = TempDir::new().unwrap();

    let artifact = fetcher(&server, &dir).fetch_snapshot().await.unwrap();

    assert_eq!(artifact.record_count, 1);
    assert_eq!(artifact.byte_len, BODY.len());
    assert_eq!(fs::read(&artifact.path).unwrap(), BODY.as_bytes());
  }

  #[tokio::test]
  async fn test_fetch_keeps_bom_and_raw_bytes() {
    // Leading BOM and trailing whitespace are part of the artifact
    let body = [b"\xEF\xBB\xBF".as_slice(), BODY.as_bytes(), b" \r\n".as_slice()].concat();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/coins/markets"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_raw(body.clone(), "application/json; charset=iso-8859-1"),
      )
      .mount(&server)
      .await;
    let dir = TempDir::new().unwrap();

    let artifact = fetcher(&server, &dir).fetch_snapshot().await.unwrap();

    assert_eq!(artifact.record_count, 1);
    assert_eq!(artifact.byte_len, body.len());
    assert_eq!(fs::read(&artifact.path).unwrap(), body);
  }

  #[tokio::test]
  async fn test_non_utf8_body_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(200).set_body_raw(
        b"[{\"id\":\"bitcoin\",\"symbol\":\"btc\",\"name\":\"Bit\xE7oin\"}]".to_vec(),
        "application/json",
      ))
      .mount(&server)
      .await;
    let dir = TempDir::new().unwrap();

    let err = fetcher(&server, &dir).fetch_snapshot().await.unwrap_err();

    assert!(matches!(err, LoaderError::Upstream(cp_core::Error::InvalidResponse(_))));
    assert!(!dir.path().join("crypto.json").exists());
  }

  #[tokio::test]
  async fn test_fetch_failure_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(500)).mount(&server).await;
    let dir = TempDir::new().unwrap();

    let err = fetcher(&server, &dir).fetch_snapshot().await.unwrap_err();

    assert!(matches!(err, LoaderError::Upstream(cp_core::Error::Status { status: 500, .. })));
    assert!(!dir.path().join("crypto.json").exists());
  }

  #[tokio::test]
  async fn test_malformed_body_keeps_previous_artifact() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(200).set_body_string("{\"oops\":1}"))
      .mount(&server)
      .await;
    let dir = TempDir::new().unwrap();
    let raw = dir.path().join("crypto.json");
    fs::write(&raw, "[]").unwrap();

    assert!(fetcher(&server, &dir).fetch_snapshot().await.is_err());
    assert_eq!(fs::read_to_string(&raw).unwrap(), "[]");
  }
}
