//! Event lifecycle, edit rules and public reads through the application services.

#![allow(clippy::unwrap_used)]

mod common;

use chrono::Duration;
use common::Fixture;
use ewm_service::{
    dto::{AdminEventFilter, PublicEventFilter, UpdateEvent},
    types::{EventId, EventState, Origin, Page, StateAction},
    EwmError,
};

fn page() -> Page {
    Page::new(0, 10).unwrap()
}

fn origin(event: EventId) -> Origin {
    Origin::new(format!("/events/{event}"), "203.0.113.7")
}

fn action(state_action: StateAction) -> UpdateEvent {
    UpdateEvent {
        state_action: Some(state_action),
        ..UpdateEvent::default()
    }
}

#[tokio::test]
async fn test_created_event_is_pending_with_defaults() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let category = fx.category("Talks").await;
    let mut new_event = fx.new_event(category, 0, true);
    new_event.participant_limit = None;
    new_event.request_moderation = None;

    let event = fx.app.events.create_event(owner, new_event).await.unwrap();

    assert_eq!(event.state, EventState::Pending);
    assert_eq!(event.created_on, fx.now);
    assert_eq!(event.published_on, None);
    assert!(!event.paid);
    assert_eq!(event.participant_limit, 0);
    assert!(event.request_moderation);
    assert_eq!(event.initiator.id, owner);
}

#[tokio::test]
async fn test_create_event_validates_input() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let category = fx.category("Talks").await;

    let mut past = fx.new_event(category, 0, true);
    past.event_date = fx.now - Duration::minutes(1);
    assert!(matches!(
        fx.app.events.create_event(owner, past).await,
        Err(EwmError::Validation(_))
    ));

    let mut short = fx.new_event(category, 0, true);
    short.annotation = "too short".into();
    assert!(matches!(
        fx.app.events.create_event(owner, short).await,
        Err(EwmError::Validation(_))
    ));

    let mut unknown = fx.new_event(category, 0, true);
    unknown.category = ewm_service::types::CategoryId::new(77);
    assert!(matches!(
        fx.app.events.create_event(owner, unknown).await,
        Err(EwmError::NotFound { entity: "Category", .. })
    ));
}

#[tokio::test]
async fn test_publish_twice_keeps_first_publication() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let event = fx.pending_event(owner, 0, true).await;

    let published = fx.app.events.publish(event).await.unwrap();
    assert_eq!(published.state, EventState::Published);
    assert_eq!(published.published_on, Some(fx.now));

    let second = fx.app.events.publish(event).await;
    assert!(matches!(second, Err(EwmError::Conflict(_))));

    let stored = fx.stored_event(event).await;
    assert_eq!(stored.state, EventState::Published);
    assert_eq!(stored.published_on, Some(fx.now));
}

#[tokio::test]
async fn test_rejected_event_cannot_be_published() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let event = fx.pending_event(owner, 0, true).await;

    assert_eq!(fx.app.events.reject(event).await.unwrap().state, EventState::Canceled);
    assert!(matches!(fx.app.events.publish(event).await, Err(EwmError::Conflict(_))));
    assert!(matches!(fx.app.events.reject(event).await, Err(EwmError::Conflict(_))));
}

#[tokio::test]
async fn test_initiator_cannot_edit_published_event() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let event = fx.published_event(owner, 0, true).await;
    let before = fx.stored_event(event).await;

    let result = fx
        .app
        .events
        .update_event_by_user(
            owner,
            event,
            UpdateEvent {
                title: Some("A different title".into()),
                paid: Some(true),
                ..UpdateEvent::default()
            },
        )
        .await;

    assert!(matches!(result, Err(EwmError::Conflict(_))));
    assert_eq!(fx.stored_event(event).await, before);
}

#[tokio::test]
async fn test_initiator_cancels_and_resubmits() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let stranger = fx.user("Stranger").await;
    let event = fx.pending_event(owner, 0, true).await;

    let foreign = fx
        .app
        .events
        .update_event_by_user(stranger, event, action(StateAction::CancelReview))
        .await;
    assert!(matches!(foreign, Err(EwmError::Conflict(_))));

    let canceled = fx
        .app
        .events
        .update_event_by_user(owner, event, action(StateAction::CancelReview))
        .await
        .unwrap();
    assert_eq!(canceled.state, EventState::Canceled);

    let resubmitted = fx
        .app
        .events
        .update_event_by_user(
            owner,
            event,
            UpdateEvent {
                title: Some("Evening lecture, second try".into()),
                state_action: Some(StateAction::SendToReview),
                ..UpdateEvent::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(resubmitted.state, EventState::Pending);
    assert_eq!(resubmitted.title, "Evening lecture, second try");

    let admin_only = fx
        .app
        .events
        .update_event_by_user(owner, event, action(StateAction::PublishEvent))
        .await;
    assert!(matches!(admin_only, Err(EwmError::Validation(_))));
}

#[tokio::test]
async fn test_admin_edit_rules() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let event = fx.pending_event(owner, 0, true).await;

    let initiator_only = fx
        .app
        .events
        .update_event_by_admin(event, action(StateAction::SendToReview))
        .await;
    assert!(matches!(initiator_only, Err(EwmError::Validation(_))));

    let past_date = fx
        .app
        .events
        .update_event_by_admin(
            event,
            UpdateEvent {
                event_date: Some(fx.now - Duration::days(1)),
                state_action: Some(StateAction::PublishEvent),
                ..UpdateEvent::default()
            },
        )
        .await;
    assert!(matches!(past_date, Err(EwmError::Validation(_))));
    assert_eq!(fx.stored_event(event).await.state, EventState::Pending);

    let unknown_category = fx
        .app
        .events
        .update_event_by_admin(
            event,
            UpdateEvent {
                category: Some(ewm_service::types::CategoryId::new(404)),
                ..UpdateEvent::default()
            },
        )
        .await;
    assert!(matches!(unknown_category, Err(EwmError::NotFound { .. })));

    let blank_title = fx
        .app
        .events
        .update_event_by_admin(
            event,
            UpdateEvent {
                title: Some("   ".into()),
                participant_limit: Some(4),
                ..UpdateEvent::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(blank_title.title, "Evening lecture");
    assert_eq!(blank_title.participant_limit, 4);
}

#[tokio::test]
async fn test_limit_cannot_drop_below_confirmed() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let event = fx.published_event(owner, 3, false).await;
    for name in ["Ann", "Ben"] {
        let guest = fx.user(name).await;
        fx.app.requests.create_request(guest, event).await.unwrap();
    }

    let lower = fx
        .app
        .events
        .update_event_by_admin(
            event,
            UpdateEvent {
                participant_limit: Some(1),
                ..UpdateEvent::default()
            },
        )
        .await;
    assert!(matches!(lower, Err(EwmError::Conflict(_))));
    assert_eq!(fx.stored_event(event).await.participant_limit, 3);
    fx.assert_invariants().await;
}

#[tokio::test]
async fn test_event_of_user_requires_initiator() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let other = fx.user("Other").await;
    let event = fx.pending_event(owner, 0, true).await;

    assert_eq!(fx.app.events.event_of_user(owner, event).await.unwrap().id, event);
    assert!(matches!(
        fx.app.events.event_of_user(other, event).await,
        Err(EwmError::Conflict(_))
    ));
    assert_eq!(fx.app.events.events_of_user(owner, page()).await.unwrap().len(), 1);
    assert!(fx.app.events.events_of_user(other, page()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_search_filters() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let pending = fx.pending_event(owner, 0, true).await;
    let published = fx.published_event(owner, 0, true).await;

    let only_published = fx
        .app
        .events
        .search_events_by_admin(
            AdminEventFilter {
                states: Some(vec!["PUBLISHED".into()]),
                ..AdminEventFilter::default()
            },
            page(),
        )
        .await
        .unwrap();
    assert_eq!(only_published.iter().map(|e| e.id).collect::<Vec<_>>(), vec![published]);

    let everything = fx
        .app
        .events
        .search_events_by_admin(AdminEventFilter::default(), page())
        .await
        .unwrap();
    assert_eq!(everything.iter().map(|e| e.id).collect::<Vec<_>>(), vec![pending, published]);

    let unknown_state = fx
        .app
        .events
        .search_events_by_admin(
            AdminEventFilter {
                states: Some(vec!["ARCHIVED".into()]),
                ..AdminEventFilter::default()
            },
            page(),
        )
        .await;
    assert!(matches!(unknown_state, Err(EwmError::Validation(_))));

    let inverted = fx
        .app
        .events
        .search_events_by_admin(
            AdminEventFilter {
                range_start: Some("2030-01-02 00:00:00".into()),
                range_end: Some("2030-01-01 00:00:00".into()),
                ..AdminEventFilter::default()
            },
            page(),
        )
        .await;
    assert!(matches!(inverted, Err(EwmError::Validation(_))));
}

#[tokio::test]
async fn test_public_read_records_hit_and_refreshes_views() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let pending = fx.pending_event(owner, 0, true).await;
    let event = fx.published_event(owner, 0, true).await;

    assert!(matches!(
        fx.app.events.published_event(pending, origin(pending)).await,
        Err(EwmError::NotFound { .. })
    ));

    let first = fx.app.events.published_event(event, origin(event)).await.unwrap();
    assert_eq!(first.views, 1);

    // Same visitor again: distinct-by-IP count stays at one
    let again = fx.app.events.published_event(event, origin(event)).await.unwrap();
    assert_eq!(again.views, 1);

    let other_visitor = Origin::new(format!("/events/{event}"), "198.51.100.1");
    let third = fx.app.events.published_event(event, other_visitor).await.unwrap();
    assert_eq!(third.views, 2);
    assert_eq!(fx.stored_event(event).await.views, 2);
    assert_eq!(fx.stats.hit_count().await, 3);
}

#[tokio::test]
async fn test_stats_outage_serves_cached_views() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let event = fx.published_event(owner, 0, true).await;
    fx.app.events.published_event(event, origin(event)).await.unwrap();

    fx.stats.set_unavailable(true);
    let cached = fx.app.events.published_event(event, origin(event)).await.unwrap();

    assert_eq!(cached.views, 1);
}

#[tokio::test]
async fn test_public_search() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let guest = fx.user("Guest").await;
    let full = fx.published_event(owner, 1, false).await;
    let open = fx.published_event(owner, 0, true).await;
    fx.pending_event(owner, 0, true).await;
    fx.app.requests.create_request(guest, full).await.unwrap();

    let listing = Origin::new("/events", "203.0.113.7");
    let all = fx
        .app
        .events
        .search_published_events(PublicEventFilter::default(), page(), listing.clone())
        .await
        .unwrap();
    assert_eq!(all.iter().map(|e| e.id).collect::<Vec<_>>(), vec![full, open]);
    assert_eq!(fx.stats.hit_count().await, 1);

    let available = fx
        .app
        .events
        .search_published_events(
            PublicEventFilter {
                only_available: true,
                text: Some("HISTORY of the CITY".into()),
                ..PublicEventFilter::default()
            },
            page(),
            listing.clone(),
        )
        .await
        .unwrap();
    assert_eq!(available.iter().map(|e| e.id).collect::<Vec<_>>(), vec![open]);

    let bad_sort = fx
        .app
        .events
        .search_published_events(
            PublicEventFilter {
                sort: Some("POPULARITY".into()),
                ..PublicEventFilter::default()
            },
            page(),
            listing,
        )
        .await;
    assert!(matches!(bad_sort, Err(EwmError::Validation(_))));
}
