//! Participation request scenarios driven through the application services.

#![allow(clippy::unwrap_used)]

mod common;

use common::Fixture;
use ewm_service::{
    dto::ResolveRequests,
    types::{RequestId, RequestStatus},
    EwmError,
};

fn batch(ids: &[RequestId], status: RequestStatus) -> ResolveRequests {
    ResolveRequests {
        request_ids: ids.to_vec(),
        status,
    }
}

#[tokio::test]
async fn test_unlimited_event_confirms_immediately() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let event = fx.published_event(owner, 0, true).await;

    for name in ["Ann", "Ben", "Cid"] {
        let guest = fx.user(name).await;
        let request = fx.app.requests.create_request(guest, event).await.unwrap();
        assert_eq!(request.status, RequestStatus::Confirmed);
    }

    assert_eq!(fx.stored_event(event).await.confirmed_requests, 3);
    fx.assert_invariants().await;
}

#[tokio::test]
async fn test_unmoderated_event_confirms_until_full() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let event = fx.published_event(owner, 1, false).await;
    let ann = fx.user("Ann").await;
    let ben = fx.user("Ben").await;

    let first = fx.app.requests.create_request(ann, event).await.unwrap();
    assert_eq!(first.status, RequestStatus::Confirmed);

    let second = fx.app.requests.create_request(ben, event).await;
    assert!(matches!(second, Err(EwmError::Conflict(_))));
    fx.assert_invariants().await;
}

#[tokio::test]
async fn test_request_for_unpublished_event_conflicts() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let guest = fx.user("Guest").await;
    let event = fx.pending_event(owner, 0, false).await;

    let result = fx.app.requests.create_request(guest, event).await;

    assert!(matches!(result, Err(EwmError::Conflict(_))));
    assert!(fx.app.requests.requests_of_user(guest).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_request_for_own_event_conflicts() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let event = fx.published_event(owner, 0, false).await;

    let result = fx.app.requests.create_request(owner, event).await;

    assert!(matches!(result, Err(EwmError::Conflict(_))));
}

#[tokio::test]
async fn test_second_request_conflicts_until_first_is_canceled() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let guest = fx.user("Guest").await;
    let event = fx.published_event(owner, 5, true).await;

    let first = fx.app.requests.create_request(guest, event).await.unwrap();
    let again = fx.app.requests.create_request(guest, event).await;
    assert!(matches!(again, Err(EwmError::Conflict(_))));

    let canceled = fx.app.requests.cancel_request(guest, first.id).await.unwrap();
    assert_eq!(canceled.status, RequestStatus::Canceled);

    let retry = fx.app.requests.create_request(guest, event).await.unwrap();
    assert_eq!(retry.status, RequestStatus::Pending);
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let fx = Fixture::new();
    let guest = fx.user("Guest").await;

    let result = fx
        .app
        .requests
        .create_request(guest, ewm_service::types::EventId::new(404))
        .await;

    assert_eq!(result.unwrap_err(), EwmError::NotFound { entity: "Event", id: 404 });
}

#[tokio::test]
async fn test_batch_confirms_in_order_and_rejects_overflow() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let event = fx.published_event(owner, 2, true).await;

    let mut ids = Vec::new();
    for name in ["Ann", "Ben", "Cid"] {
        let guest = fx.user(name).await;
        ids.push(fx.app.requests.create_request(guest, event).await.unwrap().id);
    }

    let resolution = fx
        .app
        .requests
        .resolve_requests(owner, event, batch(&ids, RequestStatus::Confirmed))
        .await
        .unwrap();

    let confirmed: Vec<_> = resolution.confirmed_requests.iter().map(|r| r.id).collect();
    let rejected: Vec<_> = resolution.rejected_requests.iter().map(|r| r.id).collect();
    assert_eq!(confirmed, vec![ids[0], ids[1]]);
    assert_eq!(rejected, vec![ids[2]]);
    assert_eq!(fx.stored_event(event).await.confirmed_requests, 2);

    // No vacancy left: the whole call fails and nothing moves
    let again = fx
        .app
        .requests
        .resolve_requests(owner, event, batch(&ids[2..], RequestStatus::Confirmed))
        .await;
    assert!(matches!(again, Err(EwmError::Conflict(_))));

    let stored = fx.request_status(ids[2]).await;
    assert_eq!(stored, RequestStatus::Rejected);
    fx.assert_invariants().await;
}

#[tokio::test]
async fn test_batch_with_resolved_request_aborts_whole() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let event = fx.published_event(owner, 5, true).await;

    let mut ids = Vec::new();
    for name in ["Ann", "Ben", "Cid"] {
        let guest = fx.user(name).await;
        ids.push(fx.app.requests.create_request(guest, event).await.unwrap().id);
    }
    fx.app
        .requests
        .resolve_requests(owner, event, batch(&ids[2..], RequestStatus::Rejected))
        .await
        .unwrap();

    let result = fx
        .app
        .requests
        .resolve_requests(owner, event, batch(&ids, RequestStatus::Confirmed))
        .await;

    assert!(matches!(result, Err(EwmError::Conflict(_))));
    assert_eq!(fx.request_status(ids[0]).await, RequestStatus::Pending);
    assert_eq!(fx.request_status(ids[1]).await, RequestStatus::Pending);
    assert_eq!(fx.stored_event(event).await.confirmed_requests, 0);
}

#[tokio::test]
async fn test_batch_rules() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let guest = fx.user("Guest").await;
    let event = fx.published_event(owner, 5, true).await;
    let other_event = fx.published_event(owner, 5, true).await;

    let mine = fx.app.requests.create_request(guest, event).await.unwrap().id;
    let foreign = fx.app.requests.create_request(guest, other_event).await.unwrap().id;

    let missing = fx
        .app
        .requests
        .resolve_requests(owner, event, batch(&[mine, RequestId::new(999)], RequestStatus::Confirmed))
        .await;
    assert!(matches!(missing, Err(EwmError::NotFound { entity: "Request", id: 999 })));

    let wrong_event = fx
        .app
        .requests
        .resolve_requests(owner, event, batch(&[mine, foreign], RequestStatus::Confirmed))
        .await;
    assert!(matches!(wrong_event, Err(EwmError::Conflict(_))));

    let duplicated = fx
        .app
        .requests
        .resolve_requests(owner, event, batch(&[mine, mine], RequestStatus::Confirmed))
        .await;
    assert!(matches!(duplicated, Err(EwmError::Validation(_))));

    let not_initiator = fx
        .app
        .requests
        .resolve_requests(guest, event, batch(&[mine], RequestStatus::Confirmed))
        .await;
    assert!(matches!(not_initiator, Err(EwmError::Conflict(_))));

    assert_eq!(fx.request_status(mine).await, RequestStatus::Pending);
}

#[tokio::test]
async fn test_batch_is_noop_without_moderation() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let guest = fx.user("Guest").await;
    let event = fx.published_event(owner, 3, false).await;
    let request = fx.app.requests.create_request(guest, event).await.unwrap();

    let resolution = fx
        .app
        .requests
        .resolve_requests(owner, event, batch(&[request.id], RequestStatus::Rejected))
        .await
        .unwrap();

    assert!(resolution.confirmed_requests.is_empty());
    assert!(resolution.rejected_requests.is_empty());
    assert_eq!(fx.request_status(request.id).await, RequestStatus::Confirmed);
}

#[tokio::test]
async fn test_unlimited_event_ignores_batch_contents() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let guest = fx.user("Guest").await;
    let event = fx.published_event(owner, 0, true).await;

    let unknown = fx
        .app
        .requests
        .resolve_requests(owner, event, batch(&[RequestId::new(999)], RequestStatus::Confirmed))
        .await
        .unwrap();
    assert!(unknown.confirmed_requests.is_empty());
    assert!(unknown.rejected_requests.is_empty());

    let empty = fx
        .app
        .requests
        .resolve_requests(owner, event, batch(&[], RequestStatus::Confirmed))
        .await
        .unwrap();
    assert!(empty.confirmed_requests.is_empty());
    assert!(empty.rejected_requests.is_empty());

    // The initiator check comes before anything in the batch
    let stranger = fx
        .app
        .requests
        .resolve_requests(guest, event, batch(&[RequestId::new(999)], RequestStatus::Confirmed))
        .await;
    assert!(matches!(stranger, Err(EwmError::Conflict(_))));
}

#[tokio::test]
async fn test_empty_batch_resolves_nothing() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let guest = fx.user("Guest").await;
    let event = fx.published_event(owner, 2, true).await;
    let request = fx.app.requests.create_request(guest, event).await.unwrap();

    let resolution = fx
        .app
        .requests
        .resolve_requests(owner, event, batch(&[], RequestStatus::Rejected))
        .await
        .unwrap();

    assert_eq!(resolution, ewm_service::dto::RequestsResolution::default());
    assert_eq!(fx.request_status(request.id).await, RequestStatus::Pending);
}

#[tokio::test]
async fn test_cancel_confirmed_request_frees_place() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let ann = fx.user("Ann").await;
    let ben = fx.user("Ben").await;
    let event = fx.published_event(owner, 1, false).await;

    let request = fx.app.requests.create_request(ann, event).await.unwrap();
    assert_eq!(fx.stored_event(event).await.confirmed_requests, 1);

    let stranger = fx.app.requests.cancel_request(ben, request.id).await;
    assert!(matches!(stranger, Err(EwmError::Conflict(_))));

    fx.app.requests.cancel_request(ann, request.id).await.unwrap();
    assert_eq!(fx.stored_event(event).await.confirmed_requests, 0);

    let ben_request = fx.app.requests.create_request(ben, event).await.unwrap();
    assert_eq!(ben_request.status, RequestStatus::Confirmed);

    // Cancelling twice is accepted
    let twice = fx.app.requests.cancel_request(ann, request.id).await.unwrap();
    assert_eq!(twice.status, RequestStatus::Canceled);
    fx.assert_invariants().await;
}

#[tokio::test]
async fn test_requests_of_event_visible_to_initiator_only() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let guest = fx.user("Guest").await;
    let event = fx.published_event(owner, 0, true).await;
    fx.app.requests.create_request(guest, event).await.unwrap();

    assert_eq!(fx.app.requests.requests_of_event(owner, event).await.unwrap().len(), 1);
    assert!(matches!(
        fx.app.requests.requests_of_event(guest, event).await,
        Err(EwmError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_storage_outage_changes_nothing() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let guest = fx.user("Guest").await;
    let event = fx.published_event(owner, 0, false).await;

    fx.storage.set_unavailable(true);
    let result = fx.app.requests.create_request(guest, event).await;
    fx.storage.set_unavailable(false);

    assert!(matches!(result, Err(EwmError::Storage(_))));
    assert!(fx.app.requests.requests_of_user(guest).await.unwrap().is_empty());
    assert_eq!(fx.stored_event(event).await.confirmed_requests, 0);
}
