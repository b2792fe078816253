//! # Handler Test Suite
//!
//! Builder defaults, validation, and name resolution at registration.

use crate::error::BatchError;
use crate::handler::{Handler, RegisteredHandler};
use std::time::Duration;

// ============================================================================
// Builder Tests
// ============================================================================

#[test]
fn test_new_handler_matches_nothing_and_reduces_by_identity() {
  let handler: Handler<String> = Handler::new(5, Duration::from_millis(100));

  assert_eq!(handler.match_key(&"anything".to_string()), None);
  assert_eq!(
    handler.reduce(vec!["a".to_string(), "b".to_string()]),
    vec!["a".to_string(), "b".to_string()]
  );
  assert_eq!(handler.name(), None);
  assert_eq!(handler.max_size(), 5);
  assert_eq!(handler.wait(), Duration::from_millis(100));
}

#[test]
fn test_builder_sets_policy() {
  let handler = Handler::new(3, Duration::from_secs(1))
    .with_name("lengths")
    .matching(|evt: &String| (evt.len() > 2).then(|| format!("len/{}", evt.len())))
    .reducing(|events: Vec<String>| vec![events.concat()]);

  assert_eq!(handler.name(), Some("lengths"));
  assert_eq!(handler.match_key(&"abc".to_string()), Some("len/3".to_string()));
  assert_eq!(handler.match_key(&"ab".to_string()), None);
  assert_eq!(
    handler.reduce(vec!["x".to_string(), "y".to_string()]),
    vec!["xy".to_string()]
  );
}

#[test]
fn test_clone_shares_policy() {
  let handler = Handler::new(2, Duration::ZERO)
    .with_name("upper")
    .matching(|evt: &String| Some(evt.to_uppercase()));
  let cloned = handler.clone();

  assert_eq!(cloned.name(), Some("upper"));
  assert_eq!(cloned.match_key(&"k".to_string()), Some("K".to_string()));
}

#[test]
fn test_debug_omits_closures() {
  let handler: Handler<u32> = Handler::new(4, Duration::from_secs(2)).with_name("dbg");
  let rendered = format!("{:?}", handler);
  assert!(rendered.starts_with("Handler {"));
  assert!(rendered.contains("\"dbg\""));
  assert!(rendered.contains("max_size: 4"));
  assert!(rendered.ends_with(".. }"));
}

// ============================================================================
// Validation Tests
// ============================================================================

#[test]
fn test_validate_accepts_positive_max_size() {
  let handler: Handler<u32> = Handler::new(1, Duration::ZERO);
  assert!(handler.validate().is_ok());
}

#[test]
fn test_validate_rejects_zero_max_size() {
  let handler: Handler<u32> = Handler::new(0, Duration::from_secs(1)).with_name("broken");
  assert_eq!(
    handler.validate(),
    Err(BatchError::InvalidMaxSize {
      handler: "broken".to_string()
    })
  );

  let unnamed: Handler<u32> = Handler::new(0, Duration::from_secs(1));
  assert_eq!(
    unnamed.validate(),
    Err(BatchError::InvalidMaxSize {
      handler: "unnamed".to_string()
    })
  );
}

// ============================================================================
// Registration Tests
// ============================================================================

#[test]
fn test_register_all_resolves_default_names() {
  let handlers: Vec<Handler<u32>> = vec![
    Handler::new(1, Duration::ZERO).with_name("first"),
    Handler::new(1, Duration::ZERO),
    Handler::new(1, Duration::ZERO),
  ];
  let registered = RegisteredHandler::register_all(handlers).unwrap();

  let names: Vec<&str> = registered.iter().map(|r| r.name.as_str()).collect();
  assert_eq!(names, vec!["first", "handler-1", "handler-2"]);
  let indices: Vec<usize> = registered.iter().map(|r| r.index).collect();
  assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn test_register_all_rejects_any_zero_max_size() {
  let handlers: Vec<Handler<u32>> = vec![
    Handler::new(3, Duration::ZERO),
    Handler::new(0, Duration::ZERO),
  ];
  let err = RegisteredHandler::register_all(handlers).unwrap_err();
  assert_eq!(
    err,
    BatchError::InvalidMaxSize {
      handler: "handler-1".to_string()
    }
  );
}

#[test]
fn test_register_all_accepts_empty_list() {
  let registered = RegisteredHandler::<u32>::register_all(Vec::new()).unwrap();
  assert!(registered.is_empty());
}
