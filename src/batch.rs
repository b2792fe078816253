//! Flushed batches, the unit handed from workers to the output sink.
//!
//! Every flush travels as one [`Batch`], so the sink forwards its events
//! contiguously and never interleaves two flushes.

use crate::handler::QueueKey;
use chrono::{DateTime, Utc};
use std::fmt;

/// Why a batch was emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlushReason {
  /// The queue reached its handler's `max_size`.
  Size,
  /// The queue's wait duration elapsed.
  Timeout,
  /// The coordinator was cancelled while the queue was open.
  Shutdown,
  /// The event matched no handler and skipped queueing.
  Passthrough,
}

impl FlushReason {
  /// Stable lowercase label, used in logs and metrics.
  pub fn as_str(self) -> &'static str {
    match self {
      FlushReason::Size => "size",
      FlushReason::Timeout => "timeout",
      FlushReason::Shutdown => "shutdown",
      FlushReason::Passthrough => "passthrough",
    }
  }
}

impl fmt::Display for FlushReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One indivisible output unit.
#[derive(Clone, Debug)]
pub struct Batch<E> {
  /// Queue the events came from; `None` for passthrough.
  pub key: Option<QueueKey>,
  /// Name of the handler that owned the queue; `None` for passthrough.
  pub handler: Option<String>,
  /// What ended the queue.
  pub reason: FlushReason,
  /// When the queue opened (or the passthrough event arrived).
  pub opened_at: DateTime<Utc>,
  /// Whether `events` is reducer output rather than the raw buffer.
  pub reduced: bool,
  /// Events to publish, in order.
  pub events: Vec<E>,
}

impl<E> Batch<E> {
  /// Wraps an unmatched event.
  pub fn passthrough(event: E) -> Self {
    Self {
      key: None,
      handler: None,
      reason: FlushReason::Passthrough,
      opened_at: Utc::now(),
      reduced: false,
      events: vec![event],
    }
  }

  /// Number of events to publish.
  pub fn len(&self) -> usize {
    self.events.len()
  }

  /// True when there is nothing to publish.
  pub fn is_empty(&self) -> bool {
    self.events.is_empty()
  }
}
