//! Coordinator-level tuning.
//!
//! Per-queue limits live on each [`Handler`](crate::handler::Handler); this
//! module only sizes the two shared channels around the coordinator.

use crate::error::{BatchError, BatchResult};
use serde::{Deserialize, Serialize};

/// Default capacity of the producer to coordinator channel.
pub const DEFAULT_SUBMIT_CAPACITY: usize = 1024;

/// Default capacity of the worker to output-sink channel.
pub const DEFAULT_OUTPUT_CAPACITY: usize = 1024;

/// Channel sizing for a [`Coordinator`](crate::coordinator::Coordinator).
///
/// Both channels are bounded. A full submit channel suspends producers; a full
/// output channel suspends flushing workers until the sink catches up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
  /// Events a producer may queue ahead of the routing loop.
  pub submit_capacity: usize,
  /// Flushed batches that may wait for the output sink.
  pub output_capacity: usize,
}

impl Default for CoordinatorConfig {
  fn default() -> Self {
    Self {
      submit_capacity: DEFAULT_SUBMIT_CAPACITY,
      output_capacity: DEFAULT_OUTPUT_CAPACITY,
    }
  }
}

impl CoordinatorConfig {
  /// Sets the submit channel capacity.
  pub fn with_submit_capacity(mut self, capacity: usize) -> Self {
    self.submit_capacity = capacity;
    self
  }

  /// Sets the output channel capacity.
  pub fn with_output_capacity(mut self, capacity: usize) -> Self {
    self.output_capacity = capacity;
    self
  }

  /// Rejects zero capacities.
  pub fn validate(&self) -> BatchResult<()> {
    if self.submit_capacity == 0 {
      return Err(BatchError::InvalidCapacity {
        name: "submit_capacity",
      });
    }
    if self.output_capacity == 0 {
      return Err(BatchError::InvalidCapacity {
        name: "output_capacity",
      });
    }
    Ok(())
  }
}
