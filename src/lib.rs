//! # BatchWeave
//!
//! Keyed event batching for async Rust.
//!
//! BatchWeave accepts a stream of discrete events, groups related ones into
//! named batches, and hands each completed batch to a downstream publisher.
//! It is the piece that turns a burst of "user joined" notifications into a
//! single "users joined" message, bounding both downstream load and latency.
//!
//! ## Key Features
//!
//! - **Pluggable policy**: handlers decide which events batch together and how
//!   a batch collapses into output events
//! - **Dual flush triggers**: a size threshold and a fixed wait window per queue
//! - **Dynamic queues**: one task per open key, created and retired on demand
//! - **Graceful drain**: cancellation flushes every open queue before completion
//! - **Ordered output**: events of one flush reach the publisher contiguously
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batchweave::coordinator::Coordinator;
//! use batchweave::event::{Event, EventType, team_join_handler};
//! use batchweave::sink::LogPublisher;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let shutdown = CancellationToken::new();
//! let coordinator = Coordinator::spawn(vec![team_join_handler()], LogPublisher, shutdown.clone())?;
//!
//! coordinator
//!   .submit(Event::new(EventType::TeamJoin).with_team("a").with_data("u1".into()))
//!   .await?;
//!
//! shutdown.cancel();
//! coordinator.wait().await?;
//! # Ok(())
//! # }
//! ```

// Documentation enforcement - treat missing docs as errors
#![deny(missing_docs)]

/// Flushed batches and flush reasons.
pub mod batch;
/// Coordinator-level channel sizing.
pub mod config;
/// Routing loop, registry and shutdown drain.
pub mod coordinator;
/// Error types.
pub mod error;
/// Concrete realtime event type and team-join policy.
pub mod event;
/// Batching rules: matchers, reducers and limits.
pub mod handler;
/// Counters and gauges for the batching core.
pub mod metrics;
/// Output sink and publishers.
pub mod sink;
mod worker;

pub use batch::{Batch, FlushReason};
pub use config::CoordinatorConfig;
pub use coordinator::{Completion, Coordinator, DrainReport, Submitter};
pub use error::{BatchError, BatchResult, SubmitError};
pub use handler::{Handler, QueueKey};
pub use sink::{ChannelPublisher, CollectingPublisher, LogPublisher, Publisher, SinkReport};

#[cfg(test)]
mod handler_test;
