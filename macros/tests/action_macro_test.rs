//! Tests for #[derive(Action)] macro

use chrono::{DateTime, Utc};
use ewm_macros::Action;

#[derive(Action, Clone, Debug, PartialEq)]
enum LifecycleAction {
    #[command]
    Publish { event_id: i64 },

    #[command]
    Ping,

    #[command]
    Reject(i64),

    #[event]
    Published {
        event_id: i64,
        published_on: DateTime<Utc>,
    },

    #[event]
    Canceled(i64),

    #[event]
    Rejected { reason: String },

    // Neither a command nor an event
    Noop,
}

#[test]
fn test_commands_identified() {
    let commands = vec![
        LifecycleAction::Publish { event_id: 1 },
        LifecycleAction::Ping,
        LifecycleAction::Reject(1),
    ];

    for command in commands {
        assert!(command.is_command(), "Expected command: {command:?}");
        assert!(!command.is_event(), "Should not be event: {command:?}");
        assert_eq!(command.event_type(), "unknown");
    }
}

#[test]
fn test_events_identified_with_versioned_type() {
    let events = vec![
        (
            LifecycleAction::Published {
                event_id: 1,
                published_on: Utc::now(),
            },
            "Published.v1",
        ),
        (LifecycleAction::Canceled(1), "Canceled.v1"),
        (
            LifecycleAction::Rejected {
                reason: "already published".to_string(),
            },
            "Rejected.v1",
        ),
    ];

    for (event, expected_type) in events {
        assert!(event.is_event(), "Expected event: {event:?}");
        assert!(!event.is_command(), "Should not be command: {event:?}");
        assert_eq!(event.event_type(), expected_type);
    }
}

#[test]
fn test_unmarked_variant_is_neither() {
    let action = LifecycleAction::Noop;
    assert!(!action.is_command());
    assert!(!action.is_event());
    assert_eq!(action.event_type(), "unknown");
}
