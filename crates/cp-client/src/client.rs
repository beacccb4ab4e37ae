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

//! Entry point of the API client.

use crate::endpoints::markets::{MarketQuery, MarketsEndpoint};
use crate::transport::Transport;
use cp_core::{ApiConfig, Result};
use std::sync::Arc;

/// Main CoinGecko API client
///
/// Holds one configured [`Transport`] and hands out endpoint groups that
/// share it.
pub struct CoinGeckoClient {
  transport: Arc<Transport>,
  page: u32,
}

impl CoinGeckoClient {
  /// Create a new client
  ///
  /// # Errors
  ///
  /// Returns an error if the HTTP client cannot be created.
  pub fn new(config: &ApiConfig) -> Result<Self> {
    Ok(Self { transport: Arc::new(Transport::new(config)?), page: config.page })
  }

  /// Market listing endpoint, preset to the configured fixed page
  pub fn markets(&self) -> MarketsEndpoint {
    MarketsEndpoint::new(self.transport.clone(), MarketQuery::snapshot(self.page))
  }

  /// Base URL requests are sent to
  pub fn base_url(&self) -> &str {
    self.transport.base_url()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_client_creation() {
    let config = ApiConfig { page: 3, ..ApiConfig::default() };
    let client = CoinGeckoClient::new(&config).unwrap();
    assert_eq!(client.base_url(), cp_core::COINGECKO_BASE_URL);
    assert_eq!(client.markets().query().page, 3);
  }
}
