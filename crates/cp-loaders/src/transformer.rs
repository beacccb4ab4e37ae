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

//! Transform step: raw snapshot to the destination table's tabular form.
//!
//! Rules per record, in input order:
//! - `id`, `symbol`, `name` are copied verbatim and must be non-empty strings
//! - numeric fields coerce to `f64`; JSON numbers and numeric strings are
//!   accepted, `null`/absent/empty stays null and is never defaulted
//! - `last_updated` parses as RFC 3339 (null stays null)
//! - `timestamp` is the batch capture time, read once per invocation
//!
//! A single malformed record fails the whole batch.

use crate::artifact::{write_atomic, NormalizedArtifact, RawArtifact};
use crate::loader::PipelineStep;
use crate::{LoaderError, LoaderResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, Utc};
use cp_client::endpoints::markets::parse_listing;
use cp_models::{NormalizedRecord, RawMarketRecord, TableSchema};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

pub struct Transformer {
  output_path: PathBuf,
  schema: TableSchema,
}

impl Transformer {
  pub fn new(output_path: impl Into<PathBuf>) -> Self {
    Self { output_path: output_path.into(), schema: TableSchema::crypto_markets() }
  }

  pub fn output_path(&self) -> &Path {
    &self.output_path
  }

  /// Transform the snapshot named by `raw`, stamping rows with the current time
  pub async fn transform(&self, raw: &RawArtifact) -> LoaderResult<NormalizedArtifact> {
    self.transform_at(raw, capture_time()).await
  }

  /// Transform the snapshot named by `raw`, stamping rows with `captured_at`
  #[instrument(skip(self, raw), fields(raw = %raw.path.display()))]
  pub async fn transform_at(
    &self,
    raw: &RawArtifact,
    captured_at: DateTime<Utc>,
  ) -> LoaderResult<NormalizedArtifact> {
    let records = read_raw(raw)?;
    let normalized = normalize_batch(&records, captured_at)?;

    let bytes = self.render_csv(&normalized)?;
    write_atomic(&self.output_path, &bytes)?;
    info!("Wrote {} normalized rows to {}", normalized.len(), self.output_path.display());

    Ok(NormalizedArtifact {
      path: self.output_path.clone(),
      row_count: normalized.len(),
      captured_at,
    })
  }

  /// Header plus one row per record, each row checked against the schema
  fn render_csv(&self, records: &[NormalizedRecord]) -> LoaderResult<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(self.schema.field_names())?;

    for (index, record) in records.iter().enumerate() {
      let row = record.to_row();
      self
        .schema
        .validate_row(&row)
        .map_err(|e| LoaderError::schema(format!("normalized row {}", index), e))?;
      wtr.write_record(&row)?;
    }

    wtr.into_inner().map_err(|e| LoaderError::CsvError(e.to_string()))
  }
}

#[async_trait]
impl PipelineStep for Transformer {
  type Input = RawArtifact;
  type Output = NormalizedArtifact;

  async fn execute(&self, input: RawArtifact) -> LoaderResult<NormalizedArtifact> {
    self.transform(&input).await
  }

  async fn validate_input(&self, input: &RawArtifact) -> LoaderResult<()> {
    if !input.path.is_file() {
      return Err(LoaderError::ArtifactMismatch {
        path: input.path.clone(),
        message: "raw artifact is missing".to_string(),
      });
    }
    Ok(())
  }

  fn records_in(output: &NormalizedArtifact) -> Option<usize> {
    Some(output.row_count)
  }

  fn name(&self) -> &'static str {
    "transform_data"
  }
}

/// Current time at the warehouse TIMESTAMP resolution (microseconds),
/// rounded up so it never precedes the moment it was taken
pub fn capture_time() -> DateTime<Utc> {
  ceil_to_micros(Utc::now())
}

fn ceil_to_micros(t: DateTime<Utc>) -> DateTime<Utc> {
  let truncated = t.trunc_subsecs(6);
  if truncated == t {
    t
  } else {
    truncated + Duration::microseconds(1)
  }
}

/// Read and parse the raw artifact, checking it is the one the handle describes
fn read_raw(raw: &RawArtifact) -> LoaderResult<Vec<RawMarketRecord>> {
  let body = fs::read(&raw.path).map_err(|e| LoaderError::io(&raw.path, e))?;

  let records = parse_listing(&body).map_err(|e| LoaderError::ArtifactMismatch {
    path: raw.path.clone(),
    message: e.to_string(),
  })?;

  if records.len() != raw.record_count {
    return Err(LoaderError::ArtifactMismatch {
      path: raw.path.clone(),
      message: format!("expected {} records, found {}", raw.record_count, records.len()),
    });
  }
  Ok(records)
}

/// Normalize a whole batch with one shared capture time.
///
/// Output order equals input order; the first malformed record fails the batch.
pub fn normalize_batch(
  records: &[RawMarketRecord],
  captured_at: DateTime<Utc>,
) -> LoaderResult<Vec<NormalizedRecord>> {
  let normalized = records
    .iter()
    .enumerate()
    .map(|(index, raw)| normalize_record(index, raw, captured_at))
    .collect::<LoaderResult<Vec<_>>>()?;

  let unbounded = normalized.iter().filter(|r| r.max_supply.is_none()).count();
  if unbounded > 0 {
    debug!("{} of {} assets have no max_supply", unbounded, normalized.len());
  }
  Ok(normalized)
}

/// Project one raw record onto the destination schema
pub fn normalize_record(
  index: usize,
  raw: &RawMarketRecord,
  captured_at: DateTime<Utc>,
) -> LoaderResult<NormalizedRecord> {
  let malformed = |reason: String| LoaderError::MalformedRecord {
    index,
    id: raw.id_hint().map(str::to_string),
    reason,
  };

  Ok(NormalizedRecord {
    id: required_string("id", raw.id.as_ref()).map_err(malformed)?,
    symbol: required_string("symbol", raw.symbol.as_ref()).map_err(malformed)?,
    name: required_string("name", raw.name.as_ref()).map_err(malformed)?,
    current_price: coerce_float("current_price", raw.current_price.as_ref()).map_err(malformed)?,
    total_volume: coerce_float("total_volume", raw.total_volume.as_ref()).map_err(malformed)?,
    price_change_24h: coerce_float("price_change_24h", raw.price_change_24h.as_ref())
      .map_err(malformed)?,
    total_supply: coerce_float("total_supply", raw.total_supply.as_ref()).map_err(malformed)?,
    max_supply: coerce_float("max_supply", raw.max_supply.as_ref()).map_err(malformed)?,
    last_updated: coerce_timestamp("last_updated", raw.last_updated.as_ref())
      .map_err(malformed)?,
    timestamp: captured_at,
  })
}

fn required_string(field: &str, value: Option<&Value>) -> Result<String, String> {
  match value {
    Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
    Some(Value::String(_)) => Err(format!("required field '{}' is empty", field)),
    None => Err(format!("missing required field '{}'", field)),
    Some(other) => Err(format!("required field '{}' is not a string: {}", field, other)),
  }
}

/// Coerce a loosely typed numeric field; null in, null out.
pub fn coerce_float(field: &str, value: Option<&Value>) -> Result<Option<f64>, String> {
  let parsed = match value {
    None => return Ok(None),
    Some(Value::Number(n)) => n.as_f64(),
    Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
    Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
    Some(_) => None,
  };

  match parsed {
    Some(v) if v.is_finite() => Ok(Some(v)),
    _ => Err(format!("field '{}' is not a finite number: {}", field, describe(value))),
  }
}

/// Parse an upstream timestamp; values without an offset are taken as UTC.
pub fn coerce_timestamp(
  field: &str,
  value: Option<&Value>,
) -> Result<Option<DateTime<Utc>>, String> {
  let text = match value {
    None => return Ok(None),
    Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
    Some(Value::String(s)) => s.trim(),
    Some(other) => return Err(format!("field '{}' is not a timestamp string: {}", field, other)),
  };

  if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
    return Ok(Some(dt.with_timezone(&Utc)));
  }
  NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
    .map(|naive| Some(naive.and_utc()))
    .map_err(|_| format!("field '{}' is not an ISO 8601 timestamp: {}", field, text))
}

fn describe(value: Option<&Value>) -> String {
  value.map(Value::to_string).unwrap_or_else(|| "null".to_string())
}
