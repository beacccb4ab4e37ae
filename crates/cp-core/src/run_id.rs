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

//! Run identifiers.
//!
//! A run is keyed by its logical time, rendered in the compact `ts_nodash`
//! form (`20250117T100500`). Times with a fractional second carry six more
//! digits of microseconds (`20250117T100500123456`). Durable object names
//! embed it so that successive runs never share a blob path.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, Timelike, Utc};
use std::fmt;
use std::str::FromStr;

const TS_NODASH_FORMAT: &str = "%Y%m%dT%H%M%S";
const TS_NODASH_LEN: usize = 15;
const MICROS_LEN: usize = 6;

/// Identifier of one scheduled pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(DateTime<Utc>);

impl RunId {
  /// Run keyed by the current wall-clock microsecond
  pub fn now() -> Self {
    Self::at(Utc::now())
  }

  /// Run keyed by a logical time, truncated to microseconds
  pub fn at(logical_time: DateTime<Utc>) -> Self {
    Self(logical_time.trunc_subsecs(6))
  }

  pub fn logical_time(&self) -> DateTime<Utc> {
    self.0
  }

  /// Compact `YYYYMMDDTHHMMSS` rendering, followed by `ffffff` when the
  /// time has a fractional second
  pub fn ts_nodash(&self) -> String {
    let seconds = self.0.format(TS_NODASH_FORMAT);
    match self.0.nanosecond() / 1_000 {
      0 => seconds.to_string(),
      micros => format!("{}{:06}", seconds, micros),
    }
  }
}

impl fmt::Display for RunId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.ts_nodash())
  }
}

impl FromStr for RunId {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    if let Some(run) = parse_ts_nodash(s) {
      return Ok(run);
    }
    DateTime::parse_from_rfc3339(s)
      .map(|dt| Self::at(dt.with_timezone(&Utc)))
      .map_err(|_| Error::Parse(format!("invalid run id '{}'", s)))
  }
}

fn parse_ts_nodash(s: &str) -> Option<RunId> {
  let (seconds, micros) = match s.len() {
    TS_NODASH_LEN => (s, None),
    len if len == TS_NODASH_LEN + MICROS_LEN && s.is_char_boundary(TS_NODASH_LEN) => {
      let (seconds, fraction) = s.split_at(TS_NODASH_LEN);
      if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
      }
      (seconds, Some(fraction.parse::<i64>().ok()?))
    }
    _ => return None,
  };
  let naive = NaiveDateTime::parse_from_str(seconds, TS_NODASH_FORMAT).ok()?;
  Some(RunId::at(naive.and_utc() + Duration::microseconds(micros.unwrap_or(0))))
}
