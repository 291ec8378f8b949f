//! Event lifecycle service: initiator, administrator and public operations.

use super::{settle, AppContext};
use crate::aggregates::event::{LifecycleAction, LifecycleEnvironment, LifecycleReducer, LifecycleState};
use crate::dto::{AdminEventFilter, EventFull, EventShort, NewEvent, PublicEventFilter, UpdateEvent};
use crate::error::EwmError;
use crate::metrics;
use crate::stats::{HitRecord, ViewsQuery};
use crate::storage::EventQuery;
use crate::types::{
    DateRange, Editor, Event, EventId, EventSort, EventState, Origin, Page, StateAction,
    UserId,
};
use std::sync::Arc;

/// Event lifecycle operations
pub struct EventService {
    ctx: Arc<AppContext>,
    reducer: LifecycleReducer,
    env: LifecycleEnvironment,
}

impl EventService {
    /// Create the service
    #[must_use]
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let env = LifecycleEnvironment::new(Arc::clone(&ctx.clock), Arc::clone(&ctx.storage));
        Self {
            ctx,
            reducer: LifecycleReducer::new(),
            env,
        }
    }

    // ========================================================================
    // Initiator operations
    // ========================================================================

    /// Create a PENDING event owned by `user_id`
    ///
    /// # Errors
    ///
    /// NotFound for an unknown user or category, Validation for bad fields.
    pub async fn create_event(&self, user_id: UserId, new_event: NewEvent) -> Result<EventFull, EwmError> {
        let initiator = self.ctx.resolver.user(user_id).await?;
        let category = self.ctx.resolver.category(new_event.category).await?;

        let event_id = self.ctx.storage.next_event_id().await?;
        let _guard = self.ctx.locks.acquire(event_id).await;

        let mut state = LifecycleState::new();
        ewm_runtime::dispatch(
            &self.reducer,
            &mut state,
            LifecycleAction::CreateEvent {
                event_id,
                initiator_id: user_id,
                draft: new_event.into(),
            },
            &self.env,
        )
        .await;
        settle(state.last_error.take())?;

        let event = state
            .events
            .remove(&event_id)
            .ok_or(EwmError::not_found("Event", event_id.value()))?;
        metrics::record_event_transition("created");
        tracing::info!(%event_id, %user_id, "Event created");

        Ok(EventFull::new(&event, &category, &initiator))
    }

    /// Events created by `user_id`
    ///
    /// # Errors
    ///
    /// NotFound for an unknown user.
    pub async fn events_of_user(&self, user_id: UserId, page: Page) -> Result<Vec<EventShort>, EwmError> {
        self.ctx.resolver.user(user_id).await?;
        let query = EventQuery {
            initiators: Some(vec![user_id]),
            ..EventQuery::default()
        };
        let events = self.ctx.storage.events(&query, page).await?;
        self.ctx.short_views(&events).await
    }

    /// One event of its initiator
    ///
    /// # Errors
    ///
    /// NotFound for unknown ids, Conflict when `user_id` is not the initiator.
    pub async fn event_of_user(&self, user_id: UserId, event_id: EventId) -> Result<EventFull, EwmError> {
        self.ctx.resolver.user(user_id).await?;
        let event = self.ctx.resolver.event(event_id).await?;
        if event.initiator_id != user_id {
            return Err(EwmError::conflict(format!(
                "User {user_id} is not the initiator of event {event_id}"
            )));
        }
        self.ctx.full_view(&event).await
    }

    /// Initiator edit, optionally cancelling or re-submitting the event
    ///
    /// # Errors
    ///
    /// NotFound for unknown ids, Conflict for a foreign or published event,
    /// Validation for bad fields or an administrator-only action.
    pub async fn update_event_by_user(
        &self,
        user_id: UserId,
        event_id: EventId,
        update: UpdateEvent,
    ) -> Result<EventFull, EwmError> {
        self.ctx.resolver.user(user_id).await?;
        self.update(event_id, Editor::Initiator(user_id), update).await
    }

    // ========================================================================
    // Administrator operations
    // ========================================================================

    /// Administrator edit, optionally publishing or rejecting the event
    ///
    /// # Errors
    ///
    /// NotFound for unknown ids, Conflict for a transition from the wrong
    /// state, Validation for bad fields or an initiator-only action.
    pub async fn update_event_by_admin(
        &self,
        event_id: EventId,
        update: UpdateEvent,
    ) -> Result<EventFull, EwmError> {
        self.update(event_id, Editor::Admin, update).await
    }

    /// Publish a PENDING event
    ///
    /// # Errors
    ///
    /// Same as [`EventService::update_event_by_admin`].
    pub async fn publish(&self, event_id: EventId) -> Result<EventFull, EwmError> {
        self.update_event_by_admin(event_id, state_change(StateAction::PublishEvent))
            .await
    }

    /// Reject a PENDING event
    ///
    /// # Errors
    ///
    /// Same as [`EventService::update_event_by_admin`].
    pub async fn reject(&self, event_id: EventId) -> Result<EventFull, EwmError> {
        self.update_event_by_admin(event_id, state_change(StateAction::RejectEvent))
            .await
    }

    /// Search over all events
    ///
    /// # Errors
    ///
    /// Validation for an unknown state name or a bad date range.
    pub async fn search_events_by_admin(
        &self,
        filter: AdminEventFilter,
        page: Page,
    ) -> Result<Vec<EventFull>, EwmError> {
        let states = filter
            .states
            .map(|names| {
                names
                    .iter()
                    .map(|name| name.parse::<EventState>())
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;
        let query = EventQuery {
            initiators: filter.users,
            states,
            categories: filter.categories,
            dates: DateRange::parse(filter.range_start.as_deref(), filter.range_end.as_deref())?,
            ..EventQuery::default()
        };

        let events = self.ctx.storage.events(&query, page).await?;
        self.ctx.full_views(&events).await
    }

    // ========================================================================
    // Public operations
    // ========================================================================

    /// A published event, recording the visit and refreshing its views
    ///
    /// # Errors
    ///
    /// NotFound unless the event exists and is PUBLISHED.
    pub async fn published_event(&self, event_id: EventId, origin: Origin) -> Result<EventFull, EwmError> {
        let event = self.ctx.resolver.event(event_id).await?;
        if event.state != EventState::Published {
            return Err(EwmError::not_found("Event", event_id.value()));
        }

        self.record_hit(origin).await;
        let event = self.refresh_views(event).await;
        self.ctx.full_view(&event).await
    }

    /// Published events matching `filter`, recording the visit and refreshing
    /// the views of every returned event
    ///
    /// # Errors
    ///
    /// Validation for an unknown sort or a bad date range.
    pub async fn search_published_events(
        &self,
        filter: PublicEventFilter,
        page: Page,
        origin: Origin,
    ) -> Result<Vec<EventShort>, EwmError> {
        let sort = filter.sort.as_deref().map(str::parse::<EventSort>).transpose()?;
        let mut dates = DateRange::parse(filter.range_start.as_deref(), filter.range_end.as_deref())?;
        if dates.is_unbounded() {
            dates.start = Some(self.ctx.clock.now());
        }
        let query = EventQuery {
            states: Some(vec![EventState::Published]),
            categories: filter.categories,
            text: filter
                .text
                .filter(|text| !text.trim().is_empty())
                .map(|text| text.to_lowercase()),
            paid: filter.paid,
            dates,
            only_available: filter.only_available,
            sort,
            ..EventQuery::default()
        };

        let events = self.ctx.storage.events(&query, page).await?;
        self.record_hit(origin).await;

        let mut refreshed = Vec::with_capacity(events.len());
        for event in events {
            refreshed.push(self.refresh_views(event).await);
        }
        self.ctx.short_views(&refreshed).await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn update(&self, event_id: EventId, editor: Editor, update: UpdateEvent) -> Result<EventFull, EwmError> {
        let (state_action, patch) = update.into_parts();
        if let Some(category_id) = patch.category_id {
            self.ctx.resolver.category(category_id).await?;
        }
        let edited = !patch.is_empty();

        let _guard = self.ctx.locks.acquire(event_id).await;
        let event = self.ctx.resolver.event(event_id).await?;
        let mut state = LifecycleState::with_event(event);

        ewm_runtime::dispatch(
            &self.reducer,
            &mut state,
            LifecycleAction::UpdateEvent {
                event_id,
                editor,
                state_action,
                patch,
            },
            &self.env,
        )
        .await;
        settle(state.last_error.take())?;

        if let Some(action) = state_action {
            metrics::record_event_transition(transition_name(action));
        }
        if edited {
            metrics::record_event_transition("edited");
        }

        let event = state
            .events
            .remove(&event_id)
            .ok_or(EwmError::not_found("Event", event_id.value()))?;
        tracing::info!(%event_id, state = %event.state, ?editor, "Event updated");

        self.ctx.full_view(&event).await
    }

    async fn record_hit(&self, origin: Origin) {
        let hit = HitRecord {
            app: self.ctx.config.app_name.clone(),
            uri: origin.uri,
            ip: origin.ip,
            timestamp: self.ctx.clock.now(),
        };
        if let Err(error) = self.ctx.stats.record_hit(hit).await {
            tracing::warn!(%error, "Failed to record hit");
        }
    }

    /// Ask the stats service for fresh views and store them if they changed.
    /// Any failure leaves the cached count in place.
    async fn refresh_views(&self, event: Event) -> Event {
        let query = ViewsQuery::for_event(&event, self.ctx.clock.now());
        let views = match self.ctx.stats.query_views(query).await {
            Ok(stats) => stats.first().map_or(0, |stats| stats.hits),
            Err(error) => {
                tracing::warn!(event_id = %event.id, %error, "Views refresh failed, serving cached views");
                metrics::record_views_refresh_failure();
                return event;
            },
        };
        if views == event.views {
            return event;
        }

        let event_id = event.id;
        let _guard = self.ctx.locks.acquire(event_id).await;
        let current = match self.ctx.resolver.event(event_id).await {
            Ok(current) => current,
            Err(error) => {
                tracing::warn!(%event_id, %error, "Event vanished during views refresh");
                return event;
            },
        };
        let mut state = LifecycleState::with_event(current);
        ewm_runtime::dispatch(
            &self.reducer,
            &mut state,
            LifecycleAction::RefreshViews { event_id, views },
            &self.env,
        )
        .await;

        if let Some(error) = state.last_error.take() {
            tracing::warn!(%event_id, %error, "Views refresh failed, serving cached views");
            metrics::record_views_refresh_failure();
            return event;
        }
        tracing::debug!(%event_id, views, "Views refreshed");
        state.events.remove(&event_id).unwrap_or(event)
    }
}

fn state_change(action: StateAction) -> UpdateEvent {
    UpdateEvent {
        state_action: Some(action),
        ..UpdateEvent::default()
    }
}

const fn transition_name(action: StateAction) -> &'static str {
    match action {
        StateAction::PublishEvent => "published",
        StateAction::RejectEvent => "rejected",
        StateAction::CancelReview => "canceled",
        StateAction::SendToReview => "sent_to_review",
    }
}
