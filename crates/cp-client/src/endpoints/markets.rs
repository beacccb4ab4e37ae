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

//! `/coins/markets` listing endpoint

use crate::transport::{strip_bom, Transport};
use chrono::{DateTime, Utc};
use cp_core::{Error, Result};
use cp_models::RawMarketRecord;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

const MARKETS_PATH: &str = "/coins/markets";

/// Query parameters of a market listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketQuery {
  /// Quote currency, `usd` for the pipeline
  pub vs_currency: String,
  /// Sort order, `market_cap_asc` for the pipeline
  pub order: String,
  /// 1-based page number
  pub page: u32,
  /// Include 7-day sparkline data
  pub sparkline: bool,
}

impl MarketQuery {
  /// Fixed query of a pipeline snapshot: USD, ascending market cap, no sparkline
  pub fn snapshot(page: u32) -> Self {
    Self { vs_currency: "usd".to_string(), order: "market_cap_asc".to_string(), page, sparkline: false }
  }

  fn params(&self) -> Vec<(&'static str, String)> {
    vec![
      ("vs_currency", self.vs_currency.clone()),
      ("order", self.order.clone()),
      ("page", self.page.to_string()),
      ("sparkline", self.sparkline.to_string()),
    ]
  }
}

/// One point-in-time response of the listing endpoint
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
  /// Response body exactly as received
  pub body: Vec<u8>,
  /// Records parsed from `body`, in response order
  pub records: Vec<RawMarketRecord>,
  /// When the response was received
  pub fetched_at: DateTime<Utc>,
}

/// Market listing endpoint
pub struct MarketsEndpoint {
  transport: Arc<Transport>,
  query: MarketQuery,
}

impl MarketsEndpoint {
  /// Create a new endpoint instance for a fixed query
  pub fn new(transport: Arc<Transport>, query: MarketQuery) -> Self {
    Self { transport, query }
  }

  /// Query sent by [`fetch_snapshot`](Self::fetch_snapshot)
  pub fn query(&self) -> &MarketQuery {
    &self.query
  }

  /// Fetch one snapshot of the market listing.
  ///
  /// The body must be a non-empty JSON array of objects. Anything else,
  /// including an empty array, is rejected so that no caller persists a
  /// snapshot the transform step cannot use.
  #[instrument(skip(self), fields(page = self.query.page, order = %self.query.order))]
  pub async fn fetch_snapshot(&self) -> Result<MarketSnapshot> {
    let body = self.transport.get_bytes(MARKETS_PATH, &self.query.params()).await?;
    let records = parse_listing(&body)?;
    info!("Fetched {} market records", records.len());

    Ok(MarketSnapshot { body, records, fetched_at: Utc::now() })
  }
}

/// Parse a listing body into records, checking its shape.
///
/// A leading UTF-8 byte order mark is skipped; the body must otherwise be
/// UTF-8 JSON.
pub fn parse_listing(body: &[u8]) -> Result<Vec<RawMarketRecord>> {
  let value: Value = serde_json::from_slice(strip_bom(body))
    .map_err(|e| Error::InvalidResponse(format!("body is not valid JSON: {}", e)))?;

  let Value::Array(items) = value else {
    return Err(Error::InvalidResponse("expected a JSON array of assets".to_string()));
  };

  if items.is_empty() {
    return Err(Error::InvalidResponse("listing returned no assets".to_string()));
  }

  items
    .into_iter()
    .enumerate()
    .map(|(index, item)| {
      if !item.is_object() {
        return Err(Error::InvalidResponse(format!("item {} is not a JSON object", index)));
      }
      serde_json::from_value::<RawMarketRecord>(item).map_err(Error::from)
    })
    .collect()
}
