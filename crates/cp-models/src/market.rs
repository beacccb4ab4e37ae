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

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One asset from the `/coins/markets` listing, as received.
///
/// Every carried field is kept as a raw JSON value: the upstream is loosely
/// typed and coercion happens in the transform step, where a failure can be
/// reported against the record's position. JSON `null` and an absent key
/// both land as `None`. Fields the pipeline does not carry are ignored here
/// but survive verbatim in the raw artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMarketRecord {
  #[serde(default)]
  pub id: Option<Value>,

  #[serde(default)]
  pub symbol: Option<Value>,

  #[serde(default)]
  pub name: Option<Value>,

  #[serde(default)]
  pub current_price: Option<Value>,

  #[serde(default)]
  pub total_volume: Option<Value>,

  #[serde(default)]
  pub price_change_24h: Option<Value>,

  #[serde(default)]
  pub total_supply: Option<Value>,

  /// Unbounded for some assets, so `None` is a legitimate steady state
  #[serde(default)]
  pub max_supply: Option<Value>,

  #[serde(default)]
  pub last_updated: Option<Value>,
}

impl RawMarketRecord {
  /// Best-effort identifier for error messages
  pub fn id_hint(&self) -> Option<&str> {
    self.id.as_ref().and_then(Value::as_str)
  }
}

/// Warehouse-ready projection of a [`RawMarketRecord`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
  pub id: String,
  pub symbol: String,
  pub name: String,
  pub current_price: Option<f64>,
  pub total_volume: Option<f64>,
  pub price_change_24h: Option<f64>,
  pub total_supply: Option<f64>,
  pub max_supply: Option<f64>,
  pub last_updated: Option<DateTime<Utc>>,
  /// Capture time of the transform step, shared by the whole batch
  pub timestamp: DateTime<Utc>,
}

impl NormalizedRecord {
  /// Number of columns in the tabular form
  pub const COLUMN_COUNT: usize = 10;

  /// Render the record as CSV fields in destination schema order.
  ///
  /// `None` becomes an empty field.
  pub fn to_row(&self) -> [String; Self::COLUMN_COUNT] {
    [
      self.id.clone(),
      self.symbol.clone(),
      self.name.clone(),
      format_float(self.current_price),
      format_float(self.total_volume),
      format_float(self.price_change_24h),
      format_float(self.total_supply),
      format_float(self.max_supply),
      self.last_updated.map(|t| format_timestamp(&t)).unwrap_or_default(),
      format_timestamp(&self.timestamp),
    ]
  }
}

/// Shortest decimal that round-trips, never in exponent form.
///
/// `2.1e10` renders as `21000000000`, `19800000.0` as `19800000`.
pub fn format_float(value: Option<f64>) -> String {
  value.map(|v| v.to_string()).unwrap_or_default()
}

/// RFC 3339 in UTC with a `Z` suffix and only the fractional digits needed
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
  value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use pretty_assertions::assert_eq;
  use serde_json::json;

  fn bitcoin() -> NormalizedRecord {
    NormalizedRecord {
      id: "bitcoin".to_string(),
      symbol: "btc".to_string(),
      name: "Bitcoin".to_string(),
      current_price: Some(65000.5),
      total_volume: Some(2.1e10),
      price_change_24h: Some(-120.3),
      total_supply: Some(19_800_000.0),
      max_supply: Some(21_000_000.0),
      last_updated: Some(Utc.with_ymd_and_hms(2025, 1, 17, 10, 0, 0).unwrap()),
      timestamp: Utc.with_ymd_and_hms(2025, 1, 17, 10, 5, 0).unwrap(),
    }
  }

  #[test]
  fn test_to_row_matches_reference_line() {
    assert_eq!(
      bitcoin().to_row().join(","),
      "bitcoin,btc,Bitcoin,65000.5,21000000000,-120.3,19800000,21000000,2025-01-17T10:00:00Z,2025-01-17T10:05:00Z"
    );
  }

  #[test]
  fn test_nulls_render_empty() {
    let record = NormalizedRecord {
      current_price: None,
      max_supply: None,
      last_updated: None,
      ..bitcoin()
    };
    let row = record.to_row();
    assert_eq!(row[3], "");
    assert_eq!(row[7], "");
    assert_eq!(row[8], "");
    assert_eq!(row[9], "2025-01-17T10:05:00Z");
  }

  #[test]
  fn test_format_timestamp_keeps_millis() {
    let t = Utc.with_ymd_and_hms(2025, 1, 17, 10, 0, 0).unwrap() + chrono::Duration::milliseconds(123);
    assert_eq!(format_timestamp(&t), "2025-01-17T10:00:00.123Z");
  }

  #[test]
  fn test_format_float_small_values() {
    assert_eq!(format_float(Some(0.000123)), "0.000123");
    assert_eq!(format_float(Some(0.0)), "0");
  }

  #[test]
  fn test_raw_record_null_and_absent_are_none() {
    let raw: RawMarketRecord = serde_json::from_value(json!({
      "id": "bitcoin",
      "symbol": "btc",
      "name": "Bitcoin",
      "max_supply": null,
      "market_cap": 1
    }))
    .unwrap();
    assert_eq!(raw.max_supply, None);
    assert_eq!(raw.current_price, None);
    assert_eq!(raw.id_hint(), Some("bitcoin"));
  }

  #[test]
  fn test_raw_record_keeps_loose_numbers() {
    let raw: RawMarketRecord =
      serde_json::from_value(json!({"id": "x", "current_price": "1.5"})).unwrap();
    assert_eq!(raw.current_price, Some(json!("1.5")));
  }
}
