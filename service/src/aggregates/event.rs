//! Event lifecycle aggregate.
//!
//! Owns the publication state machine (PENDING → PUBLISHED | CANCELED, with
//! the initiator's re-submission CANCELED → PENDING) and field edits. Capacity
//! bookkeeping belongs to the admission aggregate.

use crate::aggregates::rules;
use crate::error::EwmError;
use crate::storage::{ChangeSet, Storage};
use crate::types::{Editor, Event, EventDraft, EventId, EventPatch, EventState, StateAction, UserId};
use chrono::{DateTime, Utc};
use ewm_core::{effect::Effect, environment::Clock, reducer::Reducer, smallvec, SmallVec};
use ewm_macros::Action;
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// State
// ============================================================================

/// Events loaded for one unit of work
#[derive(Clone, Debug, Default)]
pub struct LifecycleState {
    /// Loaded events by id
    pub events: HashMap<EventId, Event>,
    /// Failure of the last command, if any
    pub last_error: Option<EwmError>,
}

impl LifecycleState {
    /// Empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State holding a single loaded event
    #[must_use]
    pub fn with_event(event: Event) -> Self {
        Self {
            events: HashMap::from([(event.id, event)]),
            last_error: None,
        }
    }

    /// Look up a loaded event
    #[must_use]
    pub fn get(&self, id: &EventId) -> Option<&Event> {
        self.events.get(id)
    }
}

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions for the event lifecycle aggregate
#[derive(Action, Clone, Debug)]
pub enum LifecycleAction {
    // Commands
    /// Create a new PENDING event
    #[command]
    CreateEvent {
        /// Pre-allocated identifier
        event_id: EventId,
        /// Creating user
        initiator_id: UserId,
        /// Submitted fields, defaults applied
        draft: EventDraft,
    },

    /// Edit an event, optionally moving it through the state machine first
    #[command]
    UpdateEvent {
        /// Event to edit
        event_id: EventId,
        /// Initiator or administrator
        editor: Editor,
        /// Requested transition
        state_action: Option<StateAction>,
        /// Field changes
        patch: EventPatch,
    },

    /// Store a fresh view count
    #[command]
    RefreshViews {
        /// Event whose views changed
        event_id: EventId,
        /// New count
        views: u64,
    },

    // Events
    /// Event was created
    #[event]
    EventCreated {
        /// The new event
        event: Event,
    },

    /// Event was published
    #[event]
    EventPublished {
        /// Published event
        event_id: EventId,
        /// Publication time
        published_on: DateTime<Utc>,
    },

    /// Event was rejected by an administrator
    #[event]
    EventRejected {
        /// Rejected event
        event_id: EventId,
    },

    /// Event was withdrawn by its initiator
    #[event]
    EventCanceled {
        /// Withdrawn event
        event_id: EventId,
    },

    /// Event went (back) to moderation
    #[event]
    EventSentToReview {
        /// Re-submitted event
        event_id: EventId,
    },

    /// Event fields were overwritten
    #[event]
    EventEdited {
        /// Edited event
        event_id: EventId,
        /// Applied changes
        patch: EventPatch,
    },

    /// View count was refreshed
    #[event]
    ViewsRefreshed {
        /// Event
        event_id: EventId,
        /// New count
        views: u64,
    },

    /// A command broke a rule; nothing changed
    #[event]
    CommandRejected {
        /// Why
        error: EwmError,
    },

    /// Persisting the changes failed
    #[event]
    CommitFailed {
        /// Storage error message
        error: String,
    },
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the lifecycle aggregate
#[derive(Clone)]
pub struct LifecycleEnvironment {
    /// Clock for timestamps and date checks
    pub clock: Arc<dyn Clock>,
    /// Storage the commit effects write to
    pub storage: Arc<dyn Storage>,
}

impl LifecycleEnvironment {
    /// Creates a new `LifecycleEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, storage: Arc<dyn Storage>) -> Self {
        Self { clock, storage }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the event lifecycle aggregate
#[derive(Clone, Debug, Default)]
pub struct LifecycleReducer;

impl LifecycleReducer {
    /// Creates a new `LifecycleReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Effect committing the current snapshot of `event_id`
    fn persist(
        state: &LifecycleState,
        event_id: EventId,
        env: &LifecycleEnvironment,
    ) -> SmallVec<[Effect<LifecycleAction>; 4]> {
        let Some(event) = state.get(&event_id).cloned() else {
            return SmallVec::new();
        };
        let storage = Arc::clone(&env.storage);

        smallvec![Effect::future(async move {
            match storage.commit(ChangeSet::new().with_event(event)).await {
                Ok(()) => None,
                Err(error) => Some(LifecycleAction::CommitFailed {
                    error: error.to_string(),
                }),
            }
        })]
    }

    /// Record a rule violation; no effects
    fn reject(state: &mut LifecycleState, error: EwmError) -> SmallVec<[Effect<LifecycleAction>; 4]> {
        tracing::warn!(%error, "Event command rejected");
        Self::apply_event(state, &LifecycleAction::CommandRejected { error });
        SmallVec::new()
    }

    /// Build the event from a validated draft
    fn validate_create(
        state: &LifecycleState,
        event_id: EventId,
        draft: &EventDraft,
        now: DateTime<Utc>,
    ) -> Result<(), EwmError> {
        if state.events.contains_key(&event_id) {
            return Err(EwmError::conflict(format!("Event {event_id} already exists")));
        }
        rules::validate_draft(draft, now)
    }

    /// Decide the events an update produces, validating everything first
    fn plan_update(
        state: &LifecycleState,
        event_id: EventId,
        editor: Editor,
        state_action: Option<StateAction>,
        patch: EventPatch,
        now: DateTime<Utc>,
    ) -> Result<Vec<LifecycleAction>, EwmError> {
        let event = state
            .get(&event_id)
            .ok_or(EwmError::not_found("Event", event_id.value()))?;

        if let Editor::Initiator(user_id) = editor {
            if event.initiator_id != user_id {
                return Err(EwmError::conflict(format!(
                    "User {user_id} is not the initiator of event {event_id}"
                )));
            }
            if event.state == EventState::Published {
                return Err(EwmError::conflict(format!(
                    "Event {event_id} is published and cannot be changed by its initiator"
                )));
            }
        }

        let mut planned = Vec::with_capacity(2);
        if let Some(action) = state_action {
            let target = rules::transition(event, action, editor)?;
            planned.push(match (action, target) {
                (_, EventState::Published) => LifecycleAction::EventPublished {
                    event_id,
                    published_on: now,
                },
                (StateAction::RejectEvent, _) => LifecycleAction::EventRejected { event_id },
                (_, EventState::Canceled) => LifecycleAction::EventCanceled { event_id },
                (_, EventState::Pending) => LifecycleAction::EventSentToReview { event_id },
            });
        }

        rules::validate_patch(event, &patch, now)?;
        if !patch.is_empty() {
            planned.push(LifecycleAction::EventEdited { event_id, patch });
        }
        Ok(planned)
    }

    /// Applies an event to state
    fn apply_event(state: &mut LifecycleState, action: &LifecycleAction) {
        match action {
            LifecycleAction::EventCreated { event } => {
                state.events.insert(event.id, event.clone());
                state.last_error = None;
            },
            LifecycleAction::EventPublished {
                event_id,
                published_on,
            } => {
                if let Some(event) = state.events.get_mut(event_id) {
                    event.state = EventState::Published;
                    event.published_on = Some(*published_on);
                }
                state.last_error = None;
            },
            LifecycleAction::EventRejected { event_id } | LifecycleAction::EventCanceled { event_id } => {
                if let Some(event) = state.events.get_mut(event_id) {
                    event.state = EventState::Canceled;
                }
                state.last_error = None;
            },
            LifecycleAction::EventSentToReview { event_id } => {
                if let Some(event) = state.events.get_mut(event_id) {
                    event.state = EventState::Pending;
                }
                state.last_error = None;
            },
            LifecycleAction::EventEdited { event_id, patch } => {
                if let Some(event) = state.events.get_mut(event_id) {
                    patch.apply_to(event);
                }
                state.last_error = None;
            },
            LifecycleAction::ViewsRefreshed { event_id, views } => {
                if let Some(event) = state.events.get_mut(event_id) {
                    event.views = *views;
                }
                state.last_error = None;
            },
            LifecycleAction::CommandRejected { error } => {
                state.last_error = Some(error.clone());
            },
            LifecycleAction::CommitFailed { error } => {
                state.last_error = Some(EwmError::Storage(error.clone()));
            },
            // Commands don't modify state
            LifecycleAction::CreateEvent { .. }
            | LifecycleAction::UpdateEvent { .. }
            | LifecycleAction::RefreshViews { .. } => {},
        }
    }
}

impl Reducer for LifecycleReducer {
    type State = LifecycleState;
    type Action = LifecycleAction;
    type Environment = LifecycleEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            LifecycleAction::CreateEvent {
                event_id,
                initiator_id,
                draft,
            } => {
                let now = env.clock.now();
                if let Err(error) = Self::validate_create(state, event_id, &draft, now) {
                    return Self::reject(state, error);
                }

                let event = Event {
                    id: event_id,
                    title: draft.title,
                    annotation: draft.annotation,
                    description: draft.description,
                    category_id: draft.category_id,
                    location: draft.location,
                    event_date: draft.event_date,
                    created_on: now,
                    published_on: None,
                    paid: draft.paid,
                    participant_limit: draft.participant_limit,
                    request_moderation: draft.request_moderation,
                    confirmed_requests: 0,
                    views: 0,
                    state: EventState::Pending,
                    initiator_id,
                };
                Self::apply_event(state, &LifecycleAction::EventCreated { event });
                tracing::debug!(%event_id, %initiator_id, "Event created");

                Self::persist(state, event_id, env)
            },

            LifecycleAction::UpdateEvent {
                event_id,
                editor,
                state_action,
                patch,
            } => {
                let now = env.clock.now();
                let planned =
                    match Self::plan_update(state, event_id, editor, state_action, patch, now) {
                        Ok(planned) => planned,
                        Err(error) => return Self::reject(state, error),
                    };

                if planned.is_empty() {
                    state.last_error = None;
                    return SmallVec::new();
                }
                for event in &planned {
                    tracing::debug!(%event_id, event_type = event.event_type(), "Applying lifecycle event");
                    Self::apply_event(state, event);
                }

                Self::persist(state, event_id, env)
            },

            LifecycleAction::RefreshViews { event_id, views } => {
                if state.get(&event_id).is_none() {
                    return Self::reject(state, EwmError::not_found("Event", event_id.value()));
                }
                Self::apply_event(state, &LifecycleAction::ViewsRefreshed { event_id, views });

                let storage = Arc::clone(&env.storage);
                smallvec![Effect::future(async move {
                    match storage.update_views(event_id, views).await {
                        Ok(()) => None,
                        Err(error) => Some(LifecycleAction::CommitFailed {
                            error: error.to_string(),
                        }),
                    }
                })]
            },

            // ========== Events (fed back from effects) ==========
            event => {
                Self::apply_event(state, &event);
                SmallVec::new()
            },
        }
    }
}
