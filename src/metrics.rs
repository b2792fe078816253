//! Counters and gauges for the batching core.
//!
//! Recorded through the `metrics` facade crate. The crate installs no recorder; an
//! application that wants them exported installs one at startup (for example
//! `metrics-exporter-prometheus`). Without a recorder every call is a no-op.
//!
//! - `batchweave_events_submitted_total`: events accepted by the routing loop.
//! - `batchweave_passthrough_total`: events that matched no handler.
//! - `batchweave_flushes_total{handler,reason}`: queue flushes by cause.
//! - `batchweave_events_published_total`: events handed to the publisher.
//! - `batchweave_reducer_panics_total{handler}`: flushes dropped by a panicking reducer.
//! - `batchweave_live_queues`: queues currently open.

use crate::batch::FlushReason;
use ::metrics::{counter, gauge};

/// Records one event accepted by the routing loop.
pub fn record_submitted() {
  counter!("batchweave_events_submitted_total").increment(1);
}

/// Records one event that bypassed every handler.
pub fn record_passthrough() {
  counter!("batchweave_passthrough_total").increment(1);
}

/// Records a queue flush for the `batchweave_flushes_total` counter.
pub fn record_flush(handler: &str, reason: FlushReason) {
  counter!(
    "batchweave_flushes_total",
    "handler" => handler.to_string(),
    "reason" => reason.as_str()
  )
  .increment(1);
}

/// Records events forwarded to the publisher.
pub fn record_published(count: u64) {
  counter!("batchweave_events_published_total").increment(count);
}

/// Records a reducer panic that cost one flush.
pub fn record_reducer_panic(handler: &str) {
  counter!(
    "batchweave_reducer_panics_total",
    "handler" => handler.to_string()
  )
  .increment(1);
}

/// Sets the number of open queues.
pub fn record_live_queues(count: usize) {
  gauge!("batchweave_live_queues").set(count as f64);
}
