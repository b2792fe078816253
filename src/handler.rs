//! # Handlers
//!
//! A [`Handler`] is one batching rule: which events it claims (the matcher),
//! how they are keyed into queues, how large and how long a queue may grow,
//! and how a queue's events are combined on flush (the reducer).
//!
//! Handlers are immutable once handed to a coordinator and are evaluated in
//! the order they were supplied. Matchers and reducers are caller policy and
//! must be total over their input; the core contains their panics but does
//! not recover their intent.
//!
//! ```rust
//! use batchweave::handler::Handler;
//! use std::time::Duration;
//!
//! let joins: Handler<String> = Handler::new(10, Duration::from_secs(3))
//!   .with_name("joins")
//!   .matching(|evt: &String| evt.strip_prefix("join:").map(|team| format!("team/{team}")))
//!   .reducing(|events: Vec<String>| vec![events.join(",")]);
//! assert!(joins.validate().is_ok());
//! ```

use crate::error::{BatchError, BatchResult};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Identifies one open batch window. Produced per event by a handler's matcher.
pub type QueueKey = String;

/// Maps an event to the key of the queue it belongs to, or `None` when the
/// handler does not apply.
pub type MatchFn<E> = Arc<dyn Fn(&E) -> Option<QueueKey> + Send + Sync>;

/// Combines a non-empty, arrival-ordered batch into the events actually emitted.
pub type ReduceFn<E> = Arc<dyn Fn(Vec<E>) -> Vec<E> + Send + Sync>;

/// One batching rule.
pub struct Handler<E> {
  name: Option<String>,
  max_size: usize,
  wait: Duration,
  matcher: MatchFn<E>,
  reducer: ReduceFn<E>,
}

impl<E> Handler<E>
where
  E: 'static,
{
  /// Creates a handler with the given limits.
  ///
  /// The handler matches nothing and reduces by identity until
  /// [`matching`](Self::matching) and [`reducing`](Self::reducing) are set.
  ///
  /// # Arguments
  ///
  /// * `max_size` - Queue length that forces a flush. Must be greater than zero.
  /// * `wait` - Maximum lifetime of a queue, counted from its creation.
  pub fn new(max_size: usize, wait: Duration) -> Self {
    Self {
      name: None,
      max_size,
      wait,
      matcher: Arc::new(|_: &E| None),
      reducer: Arc::new(|events: Vec<E>| events),
    }
  }

  /// Sets the name used in logs and metrics.
  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Sets the matcher.
  pub fn matching<F>(mut self, matcher: F) -> Self
  where
    F: Fn(&E) -> Option<QueueKey> + Send + Sync + 'static,
  {
    self.matcher = Arc::new(matcher);
    self
  }

  /// Sets the reducer.
  pub fn reducing<F>(mut self, reducer: F) -> Self
  where
    F: Fn(Vec<E>) -> Vec<E> + Send + Sync + 'static,
  {
    self.reducer = Arc::new(reducer);
    self
  }
}

impl<E> Handler<E> {
  /// Returns the configured name, if any.
  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  /// Returns the flush threshold.
  pub fn max_size(&self) -> usize {
    self.max_size
  }

  /// Returns the queue lifetime.
  pub fn wait(&self) -> Duration {
    self.wait
  }

  /// Evaluates the matcher.
  pub fn match_key(&self, event: &E) -> Option<QueueKey> {
    (self.matcher)(event)
  }

  /// Applies the reducer.
  pub fn reduce(&self, events: Vec<E>) -> Vec<E> {
    (self.reducer)(events)
  }

  /// Checks the handler's limits.
  pub fn validate(&self) -> BatchResult<()> {
    if self.max_size == 0 {
      return Err(BatchError::InvalidMaxSize {
        handler: self.name.clone().unwrap_or_else(|| "unnamed".to_string()),
      });
    }
    Ok(())
  }
}

impl<E> Clone for Handler<E> {
  fn clone(&self) -> Self {
    Self {
      name: self.name.clone(),
      max_size: self.max_size,
      wait: self.wait,
      matcher: Arc::clone(&self.matcher),
      reducer: Arc::clone(&self.reducer),
    }
  }
}

impl<E> fmt::Debug for Handler<E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Handler")
      .field("name", &self.name)
      .field("max_size", &self.max_size)
      .field("wait", &self.wait)
      .finish_non_exhaustive()
  }
}

/// A handler frozen inside a running coordinator, with its resolved name.
#[derive(Debug)]
pub(crate) struct RegisteredHandler<E> {
  pub(crate) index: usize,
  pub(crate) name: String,
  pub(crate) handler: Handler<E>,
}

impl<E> RegisteredHandler<E> {
  /// Validates `handlers` and resolves default names (`handler-<index>`).
  pub(crate) fn register_all(handlers: Vec<Handler<E>>) -> BatchResult<Vec<Arc<Self>>> {
    handlers
      .into_iter()
      .enumerate()
      .map(|(index, handler)| {
        let name = handler
          .name
          .clone()
          .unwrap_or_else(|| format!("handler-{}", index));
        if handler.max_size == 0 {
          return Err(BatchError::InvalidMaxSize { handler: name });
        }
        Ok(Arc::new(Self {
          index,
          name,
          handler,
        }))
      })
      .collect()
  }
}
