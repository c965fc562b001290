//! Runtime configuration of the pipeline.

use std::time::Duration;

use billserve_core::party::PartyBuckets;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
  /// Maximum number of tasks executing at once.
  pub workers:       usize,
  /// Extra attempts for a task that failed with a retryable error.
  pub task_retries:  u32,
  pub retry_delay:   Duration,
  pub party_buckets: PartyBuckets,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      workers:       4,
      task_retries:  0,
      retry_delay:   Duration::from_secs(1),
      party_buckets: PartyBuckets::default(),
    }
  }
}
