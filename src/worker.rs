//! # Queue Worker
//!
//! A [`QueueWorker`] owns exactly one open batch, from the event that created
//! it to its single flush. Its life is `Open -> Flushing -> Terminated`; it
//! never reopens.
//!
//! ## Flush triggers
//!
//! While open the worker waits on three sources at once, whichever resolves
//! first wins:
//!
//! 1. **Inbound event**: appended to the buffer. Reaching the handler's
//!    `max_size` flushes through the reducer, even for a single event.
//! 2. **Deadline**: fixed at creation (`opened + wait`) and never pushed back
//!    by later arrivals. Flushes with the empty/one/many rule below.
//! 3. **Shutdown**: the coordinator's cancellation. Same rule as the deadline.
//!
//! Empty/one/many rule: an empty buffer emits nothing, a single event is
//! emitted as-is without calling the reducer, two or more are reduced.
//!
//! ## Closing the inbound buffer
//!
//! Once a trigger fires the worker closes its inbound channel and keeps
//! receiving until the channel reports its end, which includes sends that had
//! already reserved capacity. Nothing accepted is left behind. Later sends fail and hand the event back to the coordinator, which
//! opens a fresh queue for it after this one has terminated.
//!
//! ## Reducer panics
//!
//! A panicking reducer costs exactly one flush: the panic is caught, logged
//! at `error` and counted, and the worker still terminates normally so the
//! coordinator's registry stays consistent.

use crate::batch::{Batch, FlushReason};
use crate::handler::{QueueKey, RegisteredHandler};
use crate::metrics;
use chrono::{DateTime, Utc};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Registry identity of a queue: the handler that owns it plus its key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct QueueId {
  pub(crate) handler: usize,
  pub(crate) key: QueueKey,
}

/// Summary a worker returns when it terminates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct WorkerExit {
  pub(crate) id: QueueId,
  pub(crate) generation: u64,
  pub(crate) reason: FlushReason,
  /// Events the worker held when it flushed.
  pub(crate) buffered: usize,
  /// Events it handed to the sink.
  pub(crate) emitted: usize,
}

/// Owner of one open batch.
pub(crate) struct QueueWorker<E> {
  id: QueueId,
  generation: u64,
  handler: Arc<RegisteredHandler<E>>,
  buffer: Vec<E>,
  inbound: mpsc::Receiver<E>,
  output: mpsc::Sender<Batch<E>>,
  shutdown: CancellationToken,
  deadline: Instant,
  opened_at: DateTime<Utc>,
}

impl<E> QueueWorker<E>
where
  E: Send + 'static,
{
  /// Creates a worker whose buffer already holds `first`.
  ///
  /// The deadline starts now. Seeding the buffer here, before the task is
  /// spawned, means even a zero wait flushes the event that opened the queue.
  #[allow(clippy::too_many_arguments)]
  pub(crate) fn new(
    id: QueueId,
    generation: u64,
    handler: Arc<RegisteredHandler<E>>,
    first: E,
    inbound: mpsc::Receiver<E>,
    output: mpsc::Sender<Batch<E>>,
    shutdown: CancellationToken,
  ) -> Self {
    let mut buffer = Vec::with_capacity(handler.handler.max_size());
    buffer.push(first);
    Self::with_buffer(id, generation, handler, buffer, inbound, output, shutdown)
  }

  /// Creates a worker with an arbitrary starting buffer.
  #[allow(clippy::too_many_arguments)]
  pub(crate) fn with_buffer(
    id: QueueId,
    generation: u64,
    handler: Arc<RegisteredHandler<E>>,
    buffer: Vec<E>,
    inbound: mpsc::Receiver<E>,
    output: mpsc::Sender<Batch<E>>,
    shutdown: CancellationToken,
  ) -> Self {
    let deadline = Instant::now() + handler.handler.wait();
    Self {
      id,
      generation,
      handler,
      buffer,
      inbound,
      output,
      shutdown,
      deadline,
      opened_at: Utc::now(),
    }
  }

  /// Runs the worker to its single flush.
  pub(crate) async fn run(mut self) -> WorkerExit {
    let max_size = self.handler.handler.max_size();
    let deadline = sleep_until(self.deadline);
    tokio::pin!(deadline);

    let reason = if self.buffer.len() >= max_size {
      FlushReason::Size
    } else {
      loop {
        tokio::select! {
          biased;
          received = self.inbound.recv() => match received {
            Some(event) => {
              self.buffer.push(event);
              if self.buffer.len() >= max_size {
                break FlushReason::Size;
              }
            }
            // Every sender is gone: nothing more can arrive.
            None => break FlushReason::Shutdown,
          },
          _ = &mut deadline => break FlushReason::Timeout,
          _ = self.shutdown.cancelled() => break FlushReason::Shutdown,
        }
      }
    };

    // After close, recv still yields values of permits reserved before it and
    // returns None only once every such permit is used or dropped.
    self.inbound.close();
    while let Some(event) = self.inbound.recv().await {
      self.buffer.push(event);
    }

    self.flush(reason).await
  }

  async fn flush(self, reason: FlushReason) -> WorkerExit {
    let QueueWorker {
      id,
      generation,
      handler,
      buffer,
      output,
      opened_at,
      ..
    } = self;
    let buffered = buffer.len();

    let emission = match (reason, buffered) {
      (FlushReason::Size, _) => reduce(&handler, &id, buffer).map(|events| (events, true)),
      (_, 0) => None,
      (_, 1) => Some((buffer, false)),
      _ => reduce(&handler, &id, buffer).map(|events| (events, true)),
    };

    let mut emitted = 0;
    if let Some((events, reduced)) = emission {
      if !events.is_empty() {
        emitted = events.len();
        let batch = Batch {
          key: Some(id.key.clone()),
          handler: Some(handler.name.clone()),
          reason,
          opened_at,
          reduced,
          events,
        };
        if output.send(batch).await.is_err() {
          warn!(queue = %id.key, handler = %handler.name, "output sink closed, batch discarded");
          emitted = 0;
        }
      }
    }

    metrics::record_flush(&handler.name, reason);
    debug!(
      queue = %id.key,
      handler = %handler.name,
      reason = %reason,
      buffered,
      emitted,
      "queue done"
    );

    WorkerExit {
      id,
      generation,
      reason,
      buffered,
      emitted,
    }
  }
}

fn reduce<E>(handler: &RegisteredHandler<E>, id: &QueueId, events: Vec<E>) -> Option<Vec<E>> {
  match panic::catch_unwind(AssertUnwindSafe(|| handler.handler.reduce(events))) {
    Ok(reduced) => Some(reduced),
    Err(_) => {
      error!(queue = %id.key, handler = %handler.name, "reducer panicked, batch dropped");
      metrics::record_reducer_panic(&handler.name);
      None
    }
  }
}
