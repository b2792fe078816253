//! # Realtime Events
//!
//! A concrete event type for websocket-style notifications, plus ready-made
//! policy for the common case of coalescing "user joined team" bursts.
//!
//! The batching core is generic and does not need this module; it exists so
//! that applications pushing JSON events can start from a working handler.
//!
//! ```rust
//! use batchweave::event::{Event, EventType, combine_team_joins};
//! use serde_json::json;
//!
//! let joins = vec![
//!   Event::new(EventType::TeamJoin).with_team("a").with_data(json!("u1")),
//!   Event::new(EventType::TeamJoin).with_team("a").with_data(json!("u2")),
//! ];
//! let combined = combine_team_joins(joins);
//! assert_eq!(combined.name, EventType::TeamJoinMultiple);
//! assert_eq!(combined.data, json!(["u1", "u2"]));
//! ```

use crate::handler::{Handler, QueueKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Default `max_size` of [`team_join_handler`].
pub const TEAM_JOIN_MAX_SIZE: usize = 10;

/// Default wait of [`team_join_handler`].
pub const TEAM_JOIN_WAIT: Duration = Duration::from_secs(3);

/// Kind of a realtime event. Serialized as its snake_case name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
  /// A user is typing.
  Typing,
  /// One user joined a team.
  TeamJoin,
  /// Several users joined the same team.
  TeamJoinMultiple,
  /// Any other application-defined kind.
  Other(String),
}

impl EventType {
  /// Wire name of this kind.
  pub fn as_str(&self) -> &str {
    match self {
      EventType::Typing => "typing",
      EventType::TeamJoin => "team_join",
      EventType::TeamJoinMultiple => "team_join_multiple",
      EventType::Other(name) => name,
    }
  }
}

impl From<&str> for EventType {
  fn from(name: &str) -> Self {
    match name {
      "typing" => EventType::Typing,
      "team_join" => EventType::TeamJoin,
      "team_join_multiple" => EventType::TeamJoinMultiple,
      other => EventType::Other(other.to_string()),
    }
  }
}

impl From<String> for EventType {
  fn from(name: String) -> Self {
    EventType::from(name.as_str())
  }
}

impl From<EventType> for String {
  fn from(kind: EventType) -> Self {
    kind.as_str().to_string()
  }
}

impl fmt::Display for EventType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A realtime notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
  /// Event kind.
  pub name: EventType,
  /// Team the event belongs to, if any.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub team_id: Option<String>,
  /// Arbitrary payload.
  #[serde(default)]
  pub data: Value,
}

impl Event {
  /// Creates an event with no team and a null payload.
  pub fn new(name: impl Into<EventType>) -> Self {
    Self {
      name: name.into(),
      team_id: None,
      data: Value::Null,
    }
  }

  /// Sets the team.
  pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
    self.team_id = Some(team_id.into());
    self
  }

  /// Sets the payload.
  pub fn with_data(mut self, data: Value) -> Self {
    self.data = data;
    self
  }
}

/// Queue key for team joins: `team_join:team/<team>`, one queue per team.
///
/// A join without a team is keyed under the empty team.
pub fn team_join_key(event: &Event) -> Option<QueueKey> {
  if event.name != EventType::TeamJoin {
    return None;
  }
  Some(format!(
    "team_join:team/{}",
    event.team_id.as_deref().unwrap_or_default()
  ))
}

/// Folds a batch of joins into one [`EventType::TeamJoinMultiple`] event.
///
/// The team is the first non-empty team in the batch. Joins of any other team
/// are skipped, as are payloads that are not a user id string. The result's
/// payload is the array of user ids in arrival order.
pub fn combine_team_joins(events: Vec<Event>) -> Event {
  let mut team_id: Option<String> = None;
  let mut user_ids = Vec::with_capacity(events.len());
  for event in events {
    if team_id.as_deref().unwrap_or_default().is_empty() {
      team_id = event.team_id.clone();
    }
    if event.team_id != team_id {
      continue;
    }
    if let Value::String(user_id) = event.data {
      user_ids.push(Value::String(user_id));
    }
  }
  Event {
    name: EventType::TeamJoinMultiple,
    team_id,
    data: Value::Array(user_ids),
  }
}

/// Handler coalescing team joins per team with the default limits.
pub fn team_join_handler() -> Handler<Event> {
  team_join_handler_with(TEAM_JOIN_MAX_SIZE, TEAM_JOIN_WAIT)
}

/// Handler coalescing team joins per team with explicit limits.
pub fn team_join_handler_with(max_size: usize, wait: Duration) -> Handler<Event> {
  Handler::new(max_size, wait)
    .with_name("team_join")
    .matching(team_join_key)
    .reducing(|events| vec![combine_team_joins(events)])
}
