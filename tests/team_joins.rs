use batchweave::coordinator::Coordinator;
use batchweave::event::{Event, EventType, team_join_handler, team_join_handler_with};
use batchweave::sink::{ChannelPublisher, CollectingPublisher};
use batchweave::{BatchError, CoordinatorConfig, Handler};
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn join(team: &str, user: &str) -> Event {
  Event::new(EventType::TeamJoin)
    .with_team(team)
    .with_data(json!(user))
}

// Joins on one team arriving once per second collapse into a single
// team_join_multiple per three second window; other events pass through.
#[tokio::test(start_paused = true)]
async fn test_team_join_burst_is_coalesced() {
  let (publisher, mut published) = ChannelPublisher::new();
  let shutdown = CancellationToken::new();
  let coordinator =
    Coordinator::spawn(vec![team_join_handler()], publisher, shutdown.clone()).unwrap();

  coordinator.submit(Event::new("foobar")).await.unwrap();
  let passthrough = published.recv().await.unwrap();
  assert_eq!(passthrough.name, EventType::Other("foobar".to_string()));

  // Arrivals at 0s, 1s and 2s land in the window that closes at 3s.
  for user in ["u1", "u2", "u3"] {
    coordinator.submit(join("teamB", user)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
  }
  tokio::time::sleep(Duration::from_millis(100)).await;

  let combined = published.recv().await.unwrap();
  assert_eq!(combined.name, EventType::TeamJoinMultiple);
  assert_eq!(combined.team_id.as_deref(), Some("teamB"));
  assert_eq!(combined.data, json!(["u1", "u2", "u3"]));

  shutdown.cancel();
  let report = coordinator.wait().await.unwrap();
  assert_eq!(report.events_published, 2);
  assert!(published.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_lone_join_is_published_unchanged() {
  let publisher = CollectingPublisher::new();
  let coordinator = Coordinator::spawn(
    vec![team_join_handler()],
    publisher.clone(),
    CancellationToken::new(),
  )
  .unwrap();

  coordinator.submit(join("teamA", "solo")).await.unwrap();
  tokio::time::sleep(Duration::from_secs(4)).await;

  assert_eq!(publisher.events(), vec![join("teamA", "solo")]);
  coordinator.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_full_team_flushes_immediately() {
  let publisher = CollectingPublisher::new();
  let coordinator = Coordinator::spawn(
    vec![team_join_handler_with(3, Duration::from_secs(60))],
    publisher.clone(),
    CancellationToken::new(),
  )
  .unwrap();

  for user in ["u1", "u2", "u3", "u4"] {
    coordinator.submit(join("teamA", user)).await.unwrap();
  }
  tokio::time::sleep(Duration::from_millis(10)).await;

  let events = publisher.take();
  assert_eq!(events.len(), 1);
  assert_eq!(events[0].data, json!(["u1", "u2", "u3"]));

  // u4 sits alone in the next queue and drains as-is.
  coordinator.shutdown().await.unwrap();
  assert_eq!(publisher.events(), vec![join("teamA", "u4")]);
}

#[tokio::test(start_paused = true)]
async fn test_teams_are_batched_independently() {
  let publisher = CollectingPublisher::new();
  let coordinator = Coordinator::spawn(
    vec![team_join_handler()],
    publisher.clone(),
    CancellationToken::new(),
  )
  .unwrap();

  for (team, user) in [("a", "a1"), ("b", "b1"), ("a", "a2"), ("b", "b2")] {
    coordinator.submit(join(team, user)).await.unwrap();
  }
  coordinator.shutdown().await.unwrap();

  let mut events = publisher.events();
  events.sort_by(|x, y| x.team_id.cmp(&y.team_id));
  assert_eq!(events.len(), 2);
  assert_eq!(events[0].data, json!(["a1", "a2"]));
  assert_eq!(events[1].data, json!(["b1", "b2"]));
}

#[tokio::test]
async fn test_config_is_validated_before_start() {
  let result = Coordinator::spawn_with_config(
    vec![Handler::<Event>::new(1, Duration::ZERO)],
    CollectingPublisher::new(),
    CancellationToken::new(),
    CoordinatorConfig::default().with_output_capacity(0),
  );
  assert!(matches!(
    result,
    Err(BatchError::InvalidCapacity {
      name: "output_capacity"
    })
  ));
}
