//! # Output Sink and Publishers
//!
//! The output sink is the single consumer of flushed [`Batch`]es. It forwards
//! each batch's events, in order, to a [`Publisher`]. Because a flush travels
//! as one batch, events of two flushes never interleave at the publisher;
//! batches of different queues may arrive in any order.
//!
//! The publisher is an external collaborator. The sink calls it once per event
//! and never retries; failures are the publisher's business.
//!
//! ## Built-in publishers
//!
//! - [`CollectingPublisher`]: keeps every event in memory.
//! - [`ChannelPublisher`]: forwards into an unbounded channel.
//! - [`LogPublisher`]: logs each event at `info`.

use crate::batch::Batch;
use crate::metrics;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

/// Destination for emitted events.
#[async_trait]
pub trait Publisher<E>: Send + Sync
where
  E: Send + 'static,
{
  /// Delivers one event.
  async fn publish(&self, event: E);
}

#[async_trait]
impl<E, P> Publisher<E> for Arc<P>
where
  E: Send + 'static,
  P: Publisher<E> + ?Sized,
{
  async fn publish(&self, event: E) {
    (**self).publish(event).await
  }
}

/// Totals reported by the sink when its input closes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SinkReport {
  /// Batches received.
  pub batches: u64,
  /// Events handed to the publisher.
  pub events: u64,
}

/// Drains flushed batches into a publisher until every sender is dropped.
pub(crate) struct OutputSink<E, P> {
  batches: mpsc::Receiver<Batch<E>>,
  publisher: P,
}

impl<E, P> OutputSink<E, P>
where
  E: Send + 'static,
  P: Publisher<E>,
{
  pub(crate) fn new(batches: mpsc::Receiver<Batch<E>>, publisher: P) -> Self {
    Self { batches, publisher }
  }

  pub(crate) async fn run(mut self) -> SinkReport {
    let mut report = SinkReport::default();
    while let Some(batch) = self.batches.recv().await {
      trace!(
        queue = batch.key.as_deref().unwrap_or("-"),
        reason = %batch.reason,
        len = batch.len(),
        "forwarding batch"
      );
      let count = batch.len() as u64;
      for event in batch.events {
        self.publisher.publish(event).await;
      }
      report.batches += 1;
      report.events += count;
      metrics::record_published(count);
    }
    debug!(batches = report.batches, events = report.events, "output sink drained");
    report
  }
}

/// Publisher that keeps every event in memory.
///
/// Clones share the same storage, so one clone can be handed to a coordinator
/// while another is inspected.
#[derive(Debug)]
pub struct CollectingPublisher<E> {
  events: Arc<Mutex<Vec<E>>>,
}

impl<E> CollectingPublisher<E> {
  /// Creates an empty publisher.
  pub fn new() -> Self {
    Self {
      events: Arc::new(Mutex::new(Vec::new())),
    }
  }

  fn lock(&self) -> MutexGuard<'_, Vec<E>> {
    self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// Number of events published so far.
  pub fn len(&self) -> usize {
    self.lock().len()
  }

  /// True when nothing has been published.
  pub fn is_empty(&self) -> bool {
    self.lock().is_empty()
  }

  /// Removes and returns everything published so far.
  pub fn take(&self) -> Vec<E> {
    std::mem::take(&mut *self.lock())
  }
}

impl<E: Clone> CollectingPublisher<E> {
  /// Copy of everything published so far, in publish order.
  pub fn events(&self) -> Vec<E> {
    self.lock().clone()
  }
}

impl<E> Default for CollectingPublisher<E> {
  fn default() -> Self {
    Self::new()
  }
}

impl<E> Clone for CollectingPublisher<E> {
  fn clone(&self) -> Self {
    Self {
      events: Arc::clone(&self.events),
    }
  }
}

#[async_trait]
impl<E> Publisher<E> for CollectingPublisher<E>
where
  E: Send + 'static,
{
  async fn publish(&self, event: E) {
    self.lock().push(event);
  }
}

/// Publisher that forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher<E> {
  tx: mpsc::UnboundedSender<E>,
}

impl<E> ChannelPublisher<E> {
  /// Creates a publisher and the receiver its events arrive on.
  pub fn new() -> (Self, mpsc::UnboundedReceiver<E>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx }, rx)
  }

  /// Wraps an existing sender.
  pub fn from_sender(tx: mpsc::UnboundedSender<E>) -> Self {
    Self { tx }
  }
}

#[async_trait]
impl<E> Publisher<E> for ChannelPublisher<E>
where
  E: Send + 'static,
{
  async fn publish(&self, event: E) {
    if self.tx.send(event).is_err() {
      debug!("publisher channel closed, event dropped");
    }
  }
}

/// Publisher that logs every event at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

#[async_trait]
impl<E> Publisher<E> for LogPublisher
where
  E: Debug + Send + 'static,
{
  async fn publish(&self, event: E) {
    info!(event = ?event, "publish");
  }
}
