//! # Error Types
//!
//! The batching core has a deliberately narrow error surface:
//!
//! - **[`BatchError`]**: configuration problems detected before any task starts,
//!   the `Closed` condition once a coordinator stopped admitting events, and
//!   `Aborted` if the routing loop itself died.
//! - **[`SubmitError`]**: the rejection returned by `submit` after shutdown. It
//!   hands the event back so the caller decides what to do with it.
//!
//! Policy failures (a matcher or reducer that panics) are not errors in this
//! sense. They are contained where they happen and surface only through logs
//! and metrics; see [`crate::coordinator`].

use std::fmt;
use thiserror::Error;

/// Errors raised while setting up or talking to a coordinator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
  /// A handler was registered with `max_size == 0`.
  #[error("handler '{handler}': max_size must be greater than zero")]
  InvalidMaxSize {
    /// Name of the offending handler.
    handler: String,
  },
  /// A channel capacity in [`CoordinatorConfig`](crate::config::CoordinatorConfig) was zero.
  #[error("{name} must be greater than zero")]
  InvalidCapacity {
    /// Name of the offending setting.
    name: &'static str,
  },
  /// The coordinator is shutting down or already drained.
  #[error("coordinator closed")]
  Closed,
  /// The routing loop task ended abnormally.
  #[error("coordinator task failed: {0}")]
  Aborted(String),
}

/// Result alias for coordinator setup.
pub type BatchResult<T> = Result<T, BatchError>;

/// An event rejected because the coordinator no longer admits submissions.
///
/// The rejected event is returned untouched in the `0` field.
#[derive(PartialEq, Eq)]
pub struct SubmitError<E>(pub E);

impl<E> SubmitError<E> {
  /// Returns the rejected event.
  pub fn into_inner(self) -> E {
    self.0
  }
}

impl<E> fmt::Debug for SubmitError<E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SubmitError").finish_non_exhaustive()
  }
}

impl<E> fmt::Display for SubmitError<E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", BatchError::Closed)
  }
}

impl<E> std::error::Error for SubmitError<E> {}

impl<E> From<SubmitError<E>> for BatchError {
  fn from(_: SubmitError<E>) -> Self {
    BatchError::Closed
  }
}
