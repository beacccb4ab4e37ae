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

//! # cp-core
//!
//! Shared building blocks for the crypto market pipeline: the explicit
//! [`PipelineConfig`] handed to every step, the core [`Error`] type and the
//! [`RunId`] that qualifies durable object paths per scheduled run.

pub mod config;
pub mod error;
pub mod run_id;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{ApiConfig, PipelineConfig};
pub use error::{Error, Result};
pub use run_id::RunId;

/// Public CoinGecko API host
pub const COINGECKO_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Pro CoinGecko API host, selected for `CG-` keys
pub const COINGECKO_PRO_BASE_URL: &str = "https://pro-api.coingecko.com/api/v3";

/// Page of `/coins/markets` fetched each run
pub const DEFAULT_PAGE: u32 = 10;

/// Request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Minutes between scheduled runs
pub const DEFAULT_SCHEDULE_MINUTES: u64 = 10;

/// Upper bound on retries of one upstream request
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Local file name of the raw snapshot inside the working directory
pub const RAW_ARTIFACT_FILE: &str = "crypto.json";

/// Local file name of the normalized table inside the working directory
pub const NORMALIZED_ARTIFACT_FILE: &str = "transformed_data.csv";

/// Returns the default API host for an optional key.
///
/// Keys starting with `CG-` belong to the pro tier.
pub fn default_base_url(api_key: Option<&str>) -> &'static str {
  match api_key {
    Some(key) if key.starts_with("CG-") => COINGECKO_PRO_BASE_URL,
    _ => COINGECKO_BASE_URL,
  }
}
