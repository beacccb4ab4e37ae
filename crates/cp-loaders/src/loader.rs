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

//! Base trait for pipeline steps

use crate::tracker::RunTracker;
use crate::LoaderResult;
use async_trait::async_trait;
use std::future::Future;
use tracing::{error, info};

/// One step of a pipeline run.
///
/// Steps are chained by value: the output of one is the input of the next.
#[async_trait]
pub trait PipelineStep: Send + Sync {
  /// The handle this step consumes
  type Input: Send + Sync;

  /// The handle this step produces
  type Output: Send;

  /// Run the step to completion
  async fn execute(&self, input: Self::Input) -> LoaderResult<Self::Output>;

  /// Validate input before executing
  async fn validate_input(&self, _input: &Self::Input) -> LoaderResult<()> {
    Ok(())
  }

  /// Records handled, for tracking
  fn records_in(_output: &Self::Output) -> Option<usize> {
    None
  }

  /// Get step name for logging/tracking
  fn name(&self) -> &'static str;
}

/// Validate and execute `step`, recording its outcome in `tracker`.
pub async fn run_tracked<S: PipelineStep>(
  step: &S,
  tracker: &RunTracker,
  input: S::Input,
) -> LoaderResult<S::Output> {
  let work = async move {
    step.validate_input(&input).await?;
    step.execute(input).await
  };
  track(tracker, step.name(), S::records_in, work).await
}

/// Record `work` in `tracker` as a step called `name`.
pub async fn track<T, F>(
  tracker: &RunTracker,
  name: &str,
  records: fn(&T) -> Option<usize>,
  work: F,
) -> LoaderResult<T>
where
  F: Future<Output = LoaderResult<T>>,
{
  tracker.start(name).await;
  info!("Starting step {}", name);

  let result = work.await;

  match &result {
    Ok(output) => {
      let records = records(output);
      tracker.succeed(records).await;
      info!("Step {} finished ({} records)", name, records.map_or("-".to_string(), |n| n.to_string()));
    }
    Err(e) => {
      tracker.fail(&e.to_string()).await;
      error!("Step {} failed: {}", name, e);
    }
  }
  result
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tracker::StepState;
  use crate::LoaderError;

  struct Doubler;

  #[async_trait]
  impl PipelineStep for Doubler {
    type Input = Vec<u32>;
    type Output = Vec<u32>;

    async fn execute(&self, input: Vec<u32>) -> LoaderResult<Vec<u32>> {
      Ok(input.into_iter().map(|v| v * 2).collect())
    }

    async fn validate_input(&self, input: &Vec<u32>) -> LoaderResult<()> {
      if input.is_empty() {
        return Err(LoaderError::ConfigurationError("nothing to double".to_string()));
      }
      Ok(())
    }

    fn records_in(output: &Vec<u32>) -> Option<usize> {
      Some(output.len())
    }

    fn name(&self) -> &'static str {
      "double"
    }
  }

  #[tokio::test]
  async fn test_run_tracked_success() {
    let tracker = RunTracker::new();
    let out = run_tracked(&Doubler, &tracker, vec![1, 2]).await.unwrap();
    assert_eq!(out, vec![2, 4]);

    let steps = tracker.get_all().await;
    assert_eq!(steps[0].step_name, "double");
    assert_eq!(steps[0].state, StepState::Success);
    assert_eq!(steps[0].records_processed, Some(2));
  }

  #[tokio::test]
  async fn test_run_tracked_validation_failure() {
    let tracker = RunTracker::new();
    assert!(run_tracked(&Doubler, &tracker, vec![]).await.is_err());
    assert_eq!(tracker.get_all().await[0].state, StepState::Failed);
  }

  #[tokio::test]
  async fn test_track_records_error_message() {
    let tracker = RunTracker::new();
    let failing = async { Err(LoaderError::StorageError("denied".to_string())) };
    let result = track::<(), _>(&tracker, "create_bucket", |_| None, failing).await;

    assert!(result.is_err());
    let steps = tracker.get_all().await;
    assert_eq!(steps[0].step_name, "create_bucket");
    assert_eq!(steps[0].error_message.as_deref(), Some("Blob storage error: denied"));
  }
}
