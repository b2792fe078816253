//! # Coordinator
//!
//! The coordinator is the single control point of the batching core. It owns
//! the registry of open queues, routes every submitted event through the
//! handlers, spawns and retires queue workers, and runs the shutdown drain.
//!
//! ## Tasks
//!
//! - **Routing loop** (one task): reads submitted events in order and makes
//!   every routing decision. All registry mutation happens here.
//! - **Queue workers** (one task per open queue): fully parallel, each owns
//!   its own buffer.
//! - **Output sink** (one task): forwards flushed batches to the publisher.
//!
//! Workers announce their termination on an internal channel; the routing
//! loop reacts by releasing the registry slot. No lock is needed because the
//! registry never leaves the routing loop.
//!
//! ## Routing
//!
//! For each event, every handler is evaluated in registration order. A
//! non-match moves on to the next handler; it never stops the evaluation.
//! For each match the event goes to the queue `(handler, key)`, opening one
//! if none is live. An event matching several handlers is enqueued once per
//! handler. An event matching none is emitted at once as a passthrough batch.
//!
//! A queue is never sent more than its handler's `max_size` events. Once
//! that many were sent the queue is sealed and will flush on size; the next
//! event for the same key waits until the sealed worker terminated and then
//! opens a fresh queue. A send that races with a worker closing on timeout
//! gets its event back and takes the same path. This keeps at most one live
//! worker per key and suspends producers naturally while a full queue drains.
//!
//! ## Shutdown
//!
//! Cancelling the shutdown token (or dropping every [`Submitter`] together
//! with the [`Coordinator`]) starts the drain:
//!
//! 1. stop admitting submissions; later `submit` calls get their event back
//!    in a [`SubmitError`],
//! 2. route the events that were already accepted,
//! 3. cancel every live worker and wait until each one has flushed,
//! 4. close the output channel and wait for the sink to forward everything,
//! 5. resolve the [`Completion`] with a [`DrainReport`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use batchweave::coordinator::Coordinator;
//! use batchweave::handler::Handler;
//! use batchweave::sink::LogPublisher;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let joins = Handler::new(10, Duration::from_secs(3))
//!   .matching(|evt: &String| evt.starts_with("join").then(|| "joins".to_string()))
//!   .reducing(|events: Vec<String>| vec![format!("{} joins", events.len())]);
//!
//! let shutdown = CancellationToken::new();
//! let coordinator = Coordinator::spawn(vec![joins], LogPublisher, shutdown.clone())?;
//! coordinator.submit("join alice".to_string()).await?;
//! coordinator.submit("typing bob".to_string()).await?;
//!
//! shutdown.cancel();
//! let report = coordinator.wait().await?;
//! println!("{} events published", report.events_published);
//! # Ok(())
//! # }
//! ```

use crate::batch::Batch;
use crate::config::CoordinatorConfig;
use crate::error::{BatchError, BatchResult, SubmitError};
use crate::handler::{Handler, QueueKey, RegisteredHandler};
use crate::metrics;
use crate::sink::{OutputSink, Publisher, SinkReport};
use crate::worker::{QueueId, QueueWorker, WorkerExit};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// What the coordinator did between shutdown and completion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
  /// Queues that were still open when the workers were cancelled.
  pub queues_drained: usize,
  /// Batches the sink received over the coordinator's lifetime.
  pub batches_published: u64,
  /// Events the sink handed to the publisher over the coordinator's lifetime.
  pub events_published: u64,
}

/// Cloneable submission handle.
pub struct Submitter<E> {
  tx: mpsc::Sender<E>,
}

impl<E> Clone for Submitter<E> {
  fn clone(&self) -> Self {
    Self {
      tx: self.tx.clone(),
    }
  }
}

impl<E> Submitter<E> {
  /// Hands an event to the routing loop.
  ///
  /// Suspends while the submit channel is full, which in turn happens while
  /// the routing loop waits for a sealed queue to drain. Fails once the
  /// coordinator stopped admitting events; the event is returned.
  pub async fn submit(&self, event: E) -> Result<(), SubmitError<E>> {
    self
      .tx
      .send(event)
      .await
      .map_err(|mpsc::error::SendError(event)| SubmitError(event))
  }

  /// True once the coordinator no longer admits events.
  pub fn is_closed(&self) -> bool {
    self.tx.is_closed()
  }
}

/// Resolves once the coordinator fully drained.
pub struct Completion {
  handle: JoinHandle<DrainReport>,
}

impl Completion {
  /// Waits for the drain to finish.
  pub async fn wait(self) -> BatchResult<DrainReport> {
    self.handle.await.map_err(|err| {
      error!(error = %err, "routing loop failed");
      BatchError::Aborted(err.to_string())
    })
  }

  /// True if the drain already finished.
  pub fn is_finished(&self) -> bool {
    self.handle.is_finished()
  }
}

/// A running batching core.
pub struct Coordinator<E> {
  submitter: Submitter<E>,
  shutdown: CancellationToken,
  completion: Completion,
}

impl<E> Coordinator<E>
where
  E: Clone + Send + 'static,
{
  /// Validates `handlers` and starts the routing loop and output sink with
  /// the default [`CoordinatorConfig`].
  ///
  /// Must be called from within a Tokio runtime.
  pub fn spawn<P>(
    handlers: Vec<Handler<E>>,
    publisher: P,
    shutdown: CancellationToken,
  ) -> BatchResult<Self>
  where
    P: Publisher<E> + 'static,
  {
    Self::spawn_with_config(handlers, publisher, shutdown, CoordinatorConfig::default())
  }

  /// Like [`spawn`](Self::spawn) with explicit channel sizing.
  pub fn spawn_with_config<P>(
    handlers: Vec<Handler<E>>,
    publisher: P,
    shutdown: CancellationToken,
    config: CoordinatorConfig,
  ) -> BatchResult<Self>
  where
    P: Publisher<E> + 'static,
  {
    config.validate()?;
    let handlers = RegisteredHandler::register_all(handlers)?;

    let (submit_tx, submit_rx) = mpsc::channel(config.submit_capacity);
    let (output_tx, output_rx) = mpsc::channel(config.output_capacity);

    let sink = tokio::spawn(OutputSink::new(output_rx, publisher).run());
    let router = Router::new(handlers, output_tx);
    let handle = tokio::spawn(router.run(submit_rx, shutdown.clone(), sink));

    Ok(Self {
      submitter: Submitter { tx: submit_tx },
      shutdown,
      completion: Completion { handle },
    })
  }
}

impl<E> Coordinator<E> {
  /// Submits one event. See [`Submitter::submit`].
  pub async fn submit(&self, event: E) -> Result<(), SubmitError<E>> {
    self.submitter.submit(event).await
  }

  /// Returns a cloneable submission handle.
  pub fn submitter(&self) -> Submitter<E> {
    self.submitter.clone()
  }

  /// Returns the token whose cancellation starts the drain.
  pub fn shutdown_token(&self) -> CancellationToken {
    self.shutdown.clone()
  }

  /// Splits into a submission handle and the completion signal.
  pub fn into_parts(self) -> (Submitter<E>, Completion) {
    (self.submitter, self.completion)
  }

  /// Releases this handle's submitter and waits for the drain.
  ///
  /// Does not cancel the shutdown token. The drain starts once the token is
  /// cancelled elsewhere or the last [`Submitter`] clone is dropped.
  pub async fn wait(self) -> BatchResult<DrainReport> {
    let Coordinator {
      submitter,
      completion,
      ..
    } = self;
    drop(submitter);
    completion.wait().await
  }

  /// Triggers the drain and waits for it.
  pub async fn shutdown(self) -> BatchResult<DrainReport> {
    self.shutdown.cancel();
    self.wait().await
  }
}

/// Registry entry for one live queue.
pub(crate) struct QueueSlot<E> {
  tx: mpsc::Sender<E>,
  /// Events sent so far; the queue is sealed once this reaches `max_size`.
  sent: usize,
  pub(crate) generation: u64,
  handle: JoinHandle<WorkerExit>,
}

/// Termination notice from a worker task.
struct Retired {
  id: QueueId,
  generation: u64,
}

/// The routing loop's state. Owned by exactly one task.
pub(crate) struct Router<E> {
  handlers: Vec<Arc<RegisteredHandler<E>>>,
  pub(crate) registry: HashMap<QueueId, QueueSlot<E>>,
  output: mpsc::Sender<Batch<E>>,
  exits_tx: mpsc::UnboundedSender<Retired>,
  exits_rx: mpsc::UnboundedReceiver<Retired>,
  pub(crate) workers_shutdown: CancellationToken,
  next_generation: u64,
}

impl<E> Router<E>
where
  E: Clone + Send + 'static,
{
  pub(crate) fn new(
    handlers: Vec<Arc<RegisteredHandler<E>>>,
    output: mpsc::Sender<Batch<E>>,
  ) -> Self {
    let (exits_tx, exits_rx) = mpsc::unbounded_channel();
    Self {
      handlers,
      registry: HashMap::new(),
      output,
      exits_tx,
      exits_rx,
      workers_shutdown: CancellationToken::new(),
      next_generation: 0,
    }
  }

  async fn run(
    mut self,
    mut inbound: mpsc::Receiver<E>,
    shutdown: CancellationToken,
    sink: JoinHandle<SinkReport>,
  ) -> DrainReport {
    loop {
      tokio::select! {
        biased;
        _ = shutdown.cancelled() => {
          info!(live_queues = self.registry.len(), "shutdown requested, draining");
          break;
        }
        Some(retired) = self.exits_rx.recv() => self.retire(retired).await,
        received = inbound.recv() => match received {
          Some(event) => self.route(event).await,
          None => {
            info!(live_queues = self.registry.len(), "all submitters dropped, draining");
            break;
          }
        },
      }
    }

    inbound.close();
    while let Some(event) = inbound.recv().await {
      self.route(event).await;
    }

    self.workers_shutdown.cancel();
    let queues_drained = self.registry.len();
    let handles: Vec<_> = self.registry.drain().map(|(_, slot)| slot.handle).collect();
    for result in futures::future::join_all(handles).await {
      log_exit(result);
    }
    metrics::record_live_queues(0);

    // Dropping the router releases the last output sender, which ends the sink.
    drop(self);
    let sink_report = match sink.await {
      Ok(report) => report,
      Err(err) => {
        error!(error = %err, "output sink failed");
        SinkReport::default()
      }
    };

    let report = DrainReport {
      queues_drained,
      batches_published: sink_report.batches,
      events_published: sink_report.events,
    };
    info!(
      queues_drained = report.queues_drained,
      events_published = report.events_published,
      "coordinator drained"
    );
    report
  }

  pub(crate) async fn route(&mut self, event: E) {
    metrics::record_submitted();

    let mut targets: Vec<(Arc<RegisteredHandler<E>>, QueueKey)> = Vec::new();
    for registered in &self.handlers {
      match panic::catch_unwind(AssertUnwindSafe(|| registered.handler.match_key(&event))) {
        Ok(Some(key)) => targets.push((Arc::clone(registered), key)),
        Ok(None) => continue,
        Err(_) => {
          error!(handler = %registered.name, "matcher panicked, treated as no match");
        }
      }
    }

    let Some((last_handler, last_key)) = targets.pop() else {
      trace!("no handler matched, passing through");
      metrics::record_passthrough();
      if self.output.send(Batch::passthrough(event)).await.is_err() {
        warn!("output sink closed, passthrough event discarded");
      }
      return;
    };

    for (handler, key) in targets {
      self.enqueue(handler, key, event.clone()).await;
    }
    self.enqueue(last_handler, last_key, event).await;
  }

  async fn enqueue(&mut self, handler: Arc<RegisteredHandler<E>>, key: QueueKey, event: E) {
    let id = QueueId {
      handler: handler.index,
      key,
    };
    let max_size = handler.handler.max_size();
    let mut event = event;

    loop {
      match self.registry.get_mut(&id) {
        None => {
          self.open(handler, id, event);
          return;
        }
        Some(slot) if slot.sent < max_size => match slot.tx.send(event).await {
          Ok(()) => {
            slot.sent += 1;
            return;
          }
          Err(mpsc::error::SendError(returned)) => {
            trace!(queue = %id.key, "queue closed before send, reopening");
            event = returned;
          }
        },
        Some(_) => trace!(queue = %id.key, "queue sealed, waiting for flush"),
      }
      self.await_termination(&id).await;
    }
  }

  fn open(&mut self, handler: Arc<RegisteredHandler<E>>, id: QueueId, first: E) {
    let generation = self.next_generation;
    self.next_generation += 1;

    let (tx, rx) = mpsc::channel(handler.handler.max_size());
    debug!(queue = %id.key, handler = %handler.name, generation, "queue opened");
    let worker = QueueWorker::new(
      id.clone(),
      generation,
      handler,
      first,
      rx,
      self.output.clone(),
      self.workers_shutdown.clone(),
    );
    let exits = self.exits_tx.clone();
    let handle = tokio::spawn(async move {
      let exit = worker.run().await;
      let _ = exits.send(Retired {
        id: exit.id.clone(),
        generation: exit.generation,
      });
      exit
    });

    self.registry.insert(
      id,
      QueueSlot {
        tx,
        sent: 1,
        generation,
        handle,
      },
    );
    metrics::record_live_queues(self.registry.len());
  }

  /// Removes the slot for `id` and waits for its worker to finish.
  async fn await_termination(&mut self, id: &QueueId) {
    if let Some(slot) = self.registry.remove(id) {
      metrics::record_live_queues(self.registry.len());
      log_exit(slot.handle.await);
    }
  }

  /// Releases the slot of a worker that announced its termination, unless the
  /// key was already reopened by a newer generation.
  async fn retire(&mut self, retired: Retired) {
    let current = self
      .registry
      .get(&retired.id)
      .is_some_and(|slot| slot.generation == retired.generation);
    if current {
      self.await_termination(&retired.id).await;
    }
  }
}

fn log_exit(result: Result<WorkerExit, JoinError>) {
  match result {
    Ok(exit) => trace!(
      queue = %exit.id.key,
      generation = exit.generation,
      reason = %exit.reason,
      buffered = exit.buffered,
      emitted = exit.emitted,
      "queue retired"
    ),
    Err(err) => error!(error = %err, "queue worker failed"),
  }
}
