//! Shared fixtures for the service integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use chrono::{DateTime, Duration, Utc};
use ewm_core::environment::Clock;
use ewm_service::{
    dto::{NewCategory, NewEvent, NewUser},
    storage::{EventQuery, Storage},
    types::{CategoryId, Event, EventId, Location, Page, RequestId, RequestStatus, UserId},
    Config, EwmApp, InMemoryStats, InMemoryStorage,
};
use ewm_testing::test_clock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Application wired to in-memory collaborators the test can inspect
pub struct Fixture {
    pub app: Arc<EwmApp>,
    pub storage: Arc<InMemoryStorage>,
    pub stats: Arc<InMemoryStats>,
    pub now: DateTime<Utc>,
    categories: AtomicUsize,
}

impl Fixture {
    pub fn new() -> Self {
        let storage = Arc::new(InMemoryStorage::new());
        let stats = Arc::new(InMemoryStats::new());
        let clock = test_clock();
        let now = clock.now();
        let app = EwmApp::new(Config::default(), storage.clone(), stats.clone(), Arc::new(clock));
        Self {
            app: Arc::new(app),
            storage,
            stats,
            now,
            categories: AtomicUsize::new(0),
        }
    }

    pub async fn user(&self, name: &str) -> UserId {
        self.app
            .users
            .create_user(NewUser {
                name: name.into(),
                email: format!("{}@example.com", name.to_lowercase()),
            })
            .await
            .unwrap()
            .id
    }

    pub async fn category(&self, name: &str) -> CategoryId {
        self.app
            .categories
            .create_category(NewCategory { name: name.into() })
            .await
            .unwrap()
            .id
    }

    pub fn new_event(&self, category: CategoryId, limit: u32, moderation: bool) -> NewEvent {
        NewEvent {
            title: "Evening lecture".into(),
            annotation: "A lecture about the history of the city".into(),
            description: "Two hours on how the old town grew around the river port".into(),
            category,
            location: Location { lat: 55.75, lon: 37.61 },
            event_date: self.now + Duration::days(7),
            paid: None,
            participant_limit: Some(limit),
            request_moderation: Some(moderation),
        }
    }

    /// PENDING event owned by `initiator`
    pub async fn pending_event(&self, initiator: UserId, limit: u32, moderation: bool) -> EventId {
        let n = self.categories.fetch_add(1, Ordering::SeqCst);
        let category = self.category(&format!("Lectures {n}")).await;
        self.app
            .events
            .create_event(initiator, self.new_event(category, limit, moderation))
            .await
            .unwrap()
            .id
    }

    /// PUBLISHED event owned by `initiator`
    pub async fn published_event(&self, initiator: UserId, limit: u32, moderation: bool) -> EventId {
        let event_id = self.pending_event(initiator, limit, moderation).await;
        self.app.events.publish(event_id).await.unwrap();
        event_id
    }

    pub async fn stored_event(&self, id: EventId) -> Event {
        self.storage.event(id).await.unwrap().unwrap()
    }

    pub async fn request_status(&self, id: RequestId) -> RequestStatus {
        self.storage.request(id).await.unwrap().unwrap().status
    }

    /// Assert both capacity invariants for every stored event
    pub async fn assert_invariants(&self) {
        let everything = Page::new(0, usize::MAX).unwrap();
        let events = self.storage.events(&EventQuery::default(), everything).await.unwrap();
        for event in events {
            let confirmed = self
                .storage
                .requests_of_event(event.id)
                .await
                .unwrap()
                .iter()
                .filter(|request| request.status == RequestStatus::Confirmed)
                .count();
            assert_eq!(
                event.confirmed_requests as usize, confirmed,
                "cached count of event {} drifted",
                event.id
            );
            assert!(
                event.participant_limit == 0 || event.confirmed_requests <= event.participant_limit,
                "event {} is over its limit: {} of {}",
                event.id,
                event.confirmed_requests,
                event.participant_limit
            );
        }
    }
}
