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

//! HTTP transport layer for CoinGecko API requests

use cp_core::{ApiConfig, Error, Result};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

const MAX_BACKOFF_SECS: u64 = 60;

/// HTTP transport layer for making requests to the CoinGecko API
pub struct Transport {
  client: Client,
  base_url: String,
  api_key: Option<String>,
  timeout: Duration,
  max_retries: u32,
}

impl Transport {
  /// Create a new transport instance
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(concat!("cp-client/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| Error::Http(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Self {
      client,
      base_url: config.base_url.trim_end_matches('/').to_string(),
      api_key: config.api_key.clone(),
      timeout: Duration::from_secs(config.timeout_secs),
      max_retries: config.max_retries,
    })
  }

  /// Create a mock transport for testing
  #[cfg(test)]
  pub fn new_mock() -> Self {
    Self {
      client: Client::new(),
      base_url: "https://mock.coingecko.com/api/v3".to_string(),
      api_key: Some("test_key".to_string()),
      timeout: Duration::from_secs(30),
      max_retries: 0,
    }
  }

  /// GET `path` and return the body bytes unmodified.
  ///
  /// # Arguments
  ///
  /// * `path` - Endpoint path relative to the base URL, e.g. `/coins/markets`
  /// * `params` - Query parameters, appended in order
  ///
  /// Transport failures, timeouts, 5xx and 429 responses are retried up to
  /// `max_retries` times with exponential backoff. Other statuses fail at once.
  #[instrument(skip(self, params))]
  pub async fn get_bytes(&self, path: &str, params: &[(&str, String)]) -> Result<Vec<u8>> {
    let url = self.build_url(path, params)?;
    debug!("Making request to: {}", self.redact(&url));

    let mut attempt = 0;
    loop {
      if attempt > 0 {
        let delay = backoff_delay(attempt);
        warn!("Retrying request in {}ms (attempt {})", delay.as_millis(), attempt + 1);
        tokio::time::sleep(delay).await;
      }

      let outcome = match self.make_request(&url).await {
        Ok(response) => self.read_body(response).await,
        Err(e) => Err(e),
      };

      match outcome {
        Ok(body) => {
          self.check_api_error(&body)?;
          info!("Received {} bytes from {}", body.len(), path);
          return Ok(body);
        }
        Err(e) if attempt < self.max_retries && Self::is_retryable(&e) => {
          warn!("Request failed (attempt {}): {}", attempt + 1, e);
          attempt += 1;
        }
        Err(e) => return Err(e),
      }
    }
  }

  /// Build the full URL for an API request
  fn build_url(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
    let mut url = Url::parse(&format!("{}{}", self.base_url, path))
      .map_err(|e| Error::Http(format!("Invalid base URL: {}", e)))?;

    {
      let mut query_pairs = url.query_pairs_mut();
      for (key, value) in params {
        query_pairs.append_pair(key, value);
      }
      if let Some(key) = &self.api_key {
        query_pairs.append_pair(Self::auth_param(key), key);
      }
    }

    Ok(url)
  }

  /// Query parameter carrying the API key for its tier
  fn auth_param(api_key: &str) -> &'static str {
    if api_key.starts_with("CG-") { "x_cg_pro_api_key" } else { "x_cg_demo_api_key" }
  }

  /// Make the actual HTTP request
  async fn make_request(&self, url: &Url) -> Result<Response> {
    let response = self
      .client
      .get(url.clone())
      .header("accept", "application/json")
      .send()
      .await
      .map_err(|e| self.map_reqwest_error(e))?;

    let status = response.status();

    if status.is_success() {
      debug!("Request successful with status: {}", status);
      return Ok(response);
    }

    error!("Request failed with status: {}", status);
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::TOO_MANY_REQUESTS {
      return Err(Error::RateLimit(truncate(&body, 200)));
    }
    Err(Error::Status { status: status.as_u16(), body: truncate(&body, 200) })
  }

  async fn read_body(&self, response: Response) -> Result<Vec<u8>> {
    let body = response.bytes().await.map_err(|e| self.map_reqwest_error(e))?;
    Ok(body.to_vec())
  }

  fn map_reqwest_error(&self, err: reqwest::Error) -> Error {
    if err.is_timeout() {
      Error::Timeout(self.timeout.as_secs())
    } else {
      Error::Http(format!("Request failed: {}", err))
    }
  }

  fn is_retryable(err: &Error) -> bool {
    match err {
      Error::Http(_) | Error::Timeout(_) | Error::RateLimit(_) => true,
      Error::Status { status, .. } => *status >= 500,
      _ => false,
    }
  }

  /// Check for CoinGecko error envelopes delivered with a success status
  fn check_api_error(&self, body: &[u8]) -> Result<()> {
    let Ok(text) = std::str::from_utf8(strip_bom(body)) else {
      return Ok(());
    };
    let trimmed = text.trim_start();
    if !trimmed.starts_with('{') {
      return Ok(());
    }

    let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
      return Ok(());
    };

    if let Some(message) = value.pointer("/status/error_message").and_then(|m| m.as_str()) {
      let code = value.pointer("/status/error_code").and_then(|c| c.as_u64());
      if code == Some(429) {
        return Err(Error::RateLimit(message.to_string()));
      }
      return Err(Error::InvalidResponse(format!("API error: {}", message)));
    }

    if let Some(message) = value.get("error").and_then(|m| m.as_str()) {
      return Err(Error::InvalidResponse(format!("API error: {}", message)));
    }

    Ok(())
  }

  /// URL with the API key value masked, for logs
  fn redact(&self, url: &Url) -> String {
    let text = url.to_string();
    match &self.api_key {
      Some(key) if !key.is_empty() => text.replace(key.as_str(), "***"),
      _ => text,
    }
  }

  /// Get the base URL being used
  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  /// Get request timeout duration
  pub fn timeout(&self) -> Duration {
    self.timeout
  }
}

/// Delay before retry `attempt` (1-based): 2s, 4s, 8s, ... capped at 60s
fn backoff_delay(attempt: u32) -> Duration {
  let secs = 2_u64.saturating_pow(attempt).min(MAX_BACKOFF_SECS);
  Duration::from_secs(secs)
}

/// Body without a leading UTF-8 byte order mark
pub(crate) fn strip_bom(body: &[u8]) -> &[u8] {
  body.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(body)
}

fn truncate(text: &str, max_chars: usize) -> String {
  text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_build_url() {
    let transport = Transport::new_mock();
    let params = [("vs_currency", "usd".to_string()), ("page", "10".to_string())];

    let url = transport.build_url("/coins/markets", &params).unwrap().to_string();

    assert!(url.starts_with("https://mock.coingecko.com/api/v3/coins/markets?"));
    assert!(url.contains("vs_currency=usd"));
    assert!(url.contains("page=10"));
    assert!(url.contains("x_cg_demo_api_key=test_key"));
  }

  #[test]
  fn test_auth_param_for_pro_key() {
    assert_eq!(Transport::auth_param("CG-abc"), "x_cg_pro_api_key");
    assert_eq!(Transport::auth_param("abc"), "x_cg_demo_api_key");
  }

  #[test]
  fn test_redact_hides_key() {
    let transport = Transport::new_mock();
    let url = transport.build_url("/coins/markets", &[]).unwrap();
    let shown = transport.redact(&url);
    assert!(!shown.contains("test_key"));
    assert!(shown.contains("***"));
  }

  #[test]
  fn test_check_api_error_rate_limit() {
    let transport = Transport::new_mock();
    let response = r#"{"status":{"error_code":429,"error_message":"You've exceeded the Rate Limit."}}"#;

    let result = transport.check_api_error(response.as_bytes());
    assert!(matches!(result, Err(Error::RateLimit(_))));
  }

  #[test]
  fn test_check_api_error_plain_error() {
    let transport = Transport::new_mock();
    let result = transport.check_api_error(br#"{"error":"invalid vs_currency"}"#);
    assert!(matches!(result, Err(Error::InvalidResponse(_))));
  }

  #[test]
  fn test_check_api_error_success() {
    let transport = Transport::new_mock();
    assert!(transport.check_api_error(br#"[{"id":"bitcoin"}]"#).is_ok());
    assert!(transport.check_api_error(b"[]").is_ok());
    assert!(transport.check_api_error(b"[\xFF]").is_ok());
  }

  #[test]
  fn test_check_api_error_after_bom() {
    let transport = Transport::new_mock();
    let body = b"\xEF\xBB\xBF{\"error\":\"invalid vs_currency\"}";
    assert!(matches!(transport.check_api_error(body), Err(Error::InvalidResponse(_))));
  }

  #[test]
  fn test_backoff_delay_is_bounded() {
    assert_eq!(backoff_delay(1), Duration::from_secs(2));
    assert_eq!(backoff_delay(3), Duration::from_secs(8));
    assert_eq!(backoff_delay(6), Duration::from_secs(60));
    assert_eq!(backoff_delay(u32::MAX), Duration::from_secs(60));
  }

  #[test]
  fn test_retryable_errors() {
    assert!(Transport::is_retryable(&Error::Timeout(30)));
    assert!(Transport::is_retryable(&Error::Status { status: 502, body: String::new() }));
    assert!(!Transport::is_retryable(&Error::Status { status: 404, body: String::new() }));
    assert!(!Transport::is_retryable(&Error::InvalidResponse("x".to_string())));
  }
}
