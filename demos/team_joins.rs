//! # Team Join Example
//!
//! Simulates a realtime server that pushes "user joined team" notifications.
//! One user joins teamA, an unhandled `foobar` event is sent, and a new user
//! joins teamB every second. The team-join handler coalesces each team's
//! joins into one `team_join_multiple` event per three second window.
//!
//! After ten seconds the server cancels the coordinator, which flushes every
//! open queue before completing.
//!
//! ```text
//! RUST_LOG=batchweave=debug cargo run --example team_joins
//! ```

use batchweave::coordinator::Coordinator;
use batchweave::event::{Event, EventType, team_join_handler};
use batchweave::sink::LogPublisher;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

const RUN_FOR: Duration = Duration::from_secs(10);

fn random_user_id() -> String {
  rand::thread_rng()
    .sample_iter(&Alphanumeric)
    .take(26)
    .map(char::from)
    .collect()
}

fn join(team: &str) -> Event {
  Event::new(EventType::TeamJoin)
    .with_team(team)
    .with_data(Value::String(random_user_id()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env().add_directive("batchweave=info".parse()?))
    .init();

  let shutdown = CancellationToken::new();
  let coordinator = Coordinator::spawn(vec![team_join_handler()], LogPublisher, shutdown.clone())?;
  let submitter = coordinator.submitter();

  let timer = shutdown.clone();
  tokio::spawn(async move {
    tokio::time::sleep(RUN_FOR).await;
    info!("server triggered a cancellation");
    timer.cancel();
  });

  info!("server publishing a team_join event");
  coordinator.submit(join("teamA")).await?;

  info!("server publishing an event without a handler");
  coordinator.submit(Event::new("foobar")).await?;

  let mut ticker = tokio::time::interval(Duration::from_secs(1));
  loop {
    tokio::select! {
      _ = shutdown.cancelled() => break,
      _ = ticker.tick() => {
        info!("server publishing a team_join event");
        if submitter.submit(join("teamB")).await.is_err() {
          break;
        }
      }
    }
  }

  drop(submitter);
  let report = coordinator.wait().await?;
  info!(
    queues_drained = report.queues_drained,
    events_published = report.events_published,
    "coordinator done"
  );
  Ok(())
}
