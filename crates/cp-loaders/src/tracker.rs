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

//! Step tracking for monitoring pipeline runs
//! In-memory only; the report of a run is built from it.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
  Running,
  Success,
  Failed,
}

#[derive(Debug, Clone)]
pub struct StepInfo {
  pub step_name: String,
  pub start_time: DateTime<Utc>,
  pub end_time: Option<DateTime<Utc>>,
  pub state: StepState,
  pub error_message: Option<String>,
  pub records_processed: Option<usize>,
}

impl StepInfo {
  pub fn duration_ms(&self) -> Option<i64> {
    self.end_time.map(|end| (end - self.start_time).num_milliseconds())
  }
}

/// In-memory step tracker, cheap to clone
#[derive(Clone, Default)]
pub struct RunTracker {
  steps: Arc<Mutex<Vec<StepInfo>>>,
}

impl RunTracker {
  pub fn new() -> Self {
    Self::default()
  }

  pub async fn start(&self, step_name: &str) {
    let mut steps = self.steps.lock().await;
    steps.push(StepInfo {
      step_name: step_name.to_string(),
      start_time: Utc::now(),
      end_time: None,
      state: StepState::Running,
      error_message: None,
      records_processed: None,
    });
  }

  /// Close the most recently started step as successful
  pub async fn succeed(&self, records_processed: Option<usize>) {
    let mut steps = self.steps.lock().await;
    if let Some(last) = steps.last_mut() {
      last.state = StepState::Success;
      last.end_time = Some(Utc::now());
      last.records_processed = records_processed;
    }
  }

  /// Close the most recently started step as failed
  pub async fn fail(&self, error_message: &str) {
    let mut steps = self.steps.lock().await;
    if let Some(last) = steps.last_mut() {
      last.state = StepState::Failed;
      last.end_time = Some(Utc::now());
      last.error_message = Some(error_message.to_string());
    }
  }

  pub async fn get_all(&self) -> Vec<StepInfo> {
    self.steps.lock().await.clone()
  }

  pub async fn clear(&self) {
    self.steps.lock().await.clear();
  }
}
