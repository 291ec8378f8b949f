//! Request admission aggregate.
//!
//! State is one event together with every request made for it, loaded inside
//! the event's lock. The confirmed count is always recomputed from that
//! request set, so the cached `confirmed_requests` written back with the
//! event matches the number of CONFIRMED requests.

use crate::error::EwmError;
use crate::storage::{ChangeSet, Storage};
use crate::types::{Event, EventState, Request, RequestId, RequestStatus, UserId};
use ewm_core::{effect::Effect, environment::Clock, reducer::Reducer, smallvec, SmallVec};
use ewm_macros::Action;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

// ============================================================================
// State
// ============================================================================

/// Result of the last successful admission command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// A request was created, possibly already confirmed
    Created(Request),
    /// A batch was resolved
    Resolved {
        /// Requests confirmed by the batch, in the order supplied
        confirmed: Vec<Request>,
        /// Requests rejected by the batch, in the order supplied
        rejected: Vec<Request>,
    },
    /// A request was canceled
    Canceled(Request),
}

/// An event and all of its requests
#[derive(Clone, Debug, Default)]
pub struct AdmissionState {
    /// The event, `None` until loaded
    pub event: Option<Event>,
    /// Every request of the event
    pub requests: HashMap<RequestId, Request>,
    /// Outcome of the last successful command
    pub last_outcome: Option<AdmissionOutcome>,
    /// Failure of the last command, if any
    pub last_error: Option<EwmError>,
}

impl AdmissionState {
    /// State for `event` and its `requests`, with the confirmed count recomputed
    #[must_use]
    pub fn new(event: Event, requests: impl IntoIterator<Item = Request>) -> Self {
        let mut state = Self {
            event: Some(event),
            requests: requests.into_iter().map(|request| (request.id, request)).collect(),
            last_outcome: None,
            last_error: None,
        };
        state.recount();
        state
    }

    /// Number of CONFIRMED requests
    #[must_use]
    pub fn confirmed_count(&self) -> u32 {
        let confirmed = self
            .requests
            .values()
            .filter(|request| request.status == RequestStatus::Confirmed)
            .count();
        u32::try_from(confirmed).unwrap_or(u32::MAX)
    }

    fn recount(&mut self) {
        let confirmed = self.confirmed_count();
        if let Some(event) = self.event.as_mut() {
            event.confirmed_requests = confirmed;
        }
    }

    fn set_status(&mut self, id: RequestId, status: RequestStatus) -> Option<Request> {
        let request = self.requests.get_mut(&id)?;
        request.status = status;
        Some(request.clone())
    }
}

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions for the admission aggregate
#[derive(Action, Clone, Debug)]
pub enum AdmissionAction {
    // Commands
    /// Ask to take part in the loaded event
    #[command]
    CreateRequest {
        /// Pre-allocated identifier
        request_id: RequestId,
        /// Asking user
        requester_id: UserId,
    },

    /// Confirm or reject a batch of pending requests
    #[command]
    ResolveRequests {
        /// Caller, must be the initiator
        user_id: UserId,
        /// Requests in processing order
        request_ids: Vec<RequestId>,
        /// CONFIRMED or REJECTED
        status: RequestStatus,
    },

    /// Withdraw a request
    #[command]
    CancelRequest {
        /// Caller, must be the requester
        user_id: UserId,
        /// Request to withdraw
        request_id: RequestId,
    },

    // Events
    /// Request was created in PENDING
    #[event]
    RequestCreated {
        /// The new request
        request: Request,
    },

    /// Request was confirmed at creation because moderation is off
    #[event]
    RequestAutoConfirmed {
        /// Confirmed request
        request_id: RequestId,
    },

    /// A batch was resolved
    #[event]
    RequestsResolved {
        /// Confirmed ids in order
        confirmed: Vec<RequestId>,
        /// Rejected ids in order
        rejected: Vec<RequestId>,
    },

    /// Batch ignored because the event does not moderate requests
    #[event]
    ResolutionSkipped,

    /// Request was canceled
    #[event]
    RequestCanceled {
        /// Canceled request
        request_id: RequestId,
    },

    /// A command broke a rule; nothing changed
    #[event]
    AdmissionRejected {
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

/// Environment dependencies for the admission aggregate
#[derive(Clone)]
pub struct AdmissionEnvironment {
    /// Clock for request timestamps
    pub clock: Arc<dyn Clock>,
    /// Storage the commit effects write to
    pub storage: Arc<dyn Storage>,
}

impl AdmissionEnvironment {
    /// Creates a new `AdmissionEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, storage: Arc<dyn Storage>) -> Self {
        Self { clock, storage }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the admission aggregate
#[derive(Clone, Debug, Default)]
pub struct AdmissionReducer;

impl AdmissionReducer {
    /// Creates a new `AdmissionReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Effect committing the touched requests, and the event when its count moved
    fn persist(
        state: &AdmissionState,
        touched: &[RequestId],
        with_event: bool,
        env: &AdmissionEnvironment,
    ) -> SmallVec<[Effect<AdmissionAction>; 4]> {
        let mut changes = ChangeSet::new();
        if with_event {
            if let Some(event) = &state.event {
                changes = changes.with_event(event.clone());
            }
        }
        for id in touched {
            if let Some(request) = state.requests.get(id) {
                changes = changes.with_request(request.clone());
            }
        }
        if changes.is_empty() {
            return SmallVec::new();
        }

        let storage = Arc::clone(&env.storage);
        smallvec![Effect::future(async move {
            match storage.commit(changes).await {
                Ok(()) => None,
                Err(error) => Some(AdmissionAction::CommitFailed {
                    error: error.to_string(),
                }),
            }
        })]
    }

    fn reject(state: &mut AdmissionState, error: EwmError) -> SmallVec<[Effect<AdmissionAction>; 4]> {
        tracing::warn!(%error, "Admission command rejected");
        Self::apply_event(state, &AdmissionAction::AdmissionRejected { error });
        SmallVec::new()
    }

    fn loaded_event(state: &AdmissionState) -> Result<&Event, EwmError> {
        state
            .event
            .as_ref()
            .ok_or_else(|| EwmError::Storage("Admission state has no event loaded".into()))
    }

    /// Checks 2-5 of request creation
    fn validate_create(
        state: &AdmissionState,
        request_id: RequestId,
        requester_id: UserId,
    ) -> Result<&Event, EwmError> {
        let event = Self::loaded_event(state)?;

        if state.requests.contains_key(&request_id) {
            return Err(EwmError::conflict(format!("Request {request_id} already exists")));
        }
        if event.state != EventState::Published {
            return Err(EwmError::conflict(format!(
                "Event {} is not published, participation requests are closed",
                event.id
            )));
        }
        if event.initiator_id == requester_id {
            return Err(EwmError::conflict(format!(
                "User {requester_id} is the initiator of event {} and cannot request participation",
                event.id
            )));
        }
        let duplicate = state.requests.values().any(|request| {
            request.requester_id == requester_id && request.status != RequestStatus::Canceled
        });
        if duplicate {
            return Err(EwmError::conflict(format!(
                "User {requester_id} already has a request for event {}",
                event.id
            )));
        }
        if event.is_full_with(state.confirmed_count()) {
            return Err(EwmError::conflict(format!(
                "Event {} has reached its participant limit of {}",
                event.id, event.participant_limit
            )));
        }
        Ok(event)
    }

    /// Decide a batch, checking every rule before anything is applied
    fn plan_resolution(
        state: &AdmissionState,
        user_id: UserId,
        request_ids: &[RequestId],
        status: RequestStatus,
    ) -> Result<AdmissionAction, EwmError> {
        let event = Self::loaded_event(state)?;

        if event.initiator_id != user_id {
            return Err(EwmError::conflict(format!(
                "User {user_id} is not the initiator of event {}",
                event.id
            )));
        }
        if !event.moderates_requests() || request_ids.is_empty() {
            return Ok(AdmissionAction::ResolutionSkipped);
        }
        if !matches!(status, RequestStatus::Confirmed | RequestStatus::Rejected) {
            return Err(EwmError::validation(format!(
                "Requests can only be resolved to CONFIRMED or REJECTED, not {status}"
            )));
        }

        let mut seen = HashSet::with_capacity(request_ids.len());
        for id in request_ids {
            if !seen.insert(*id) {
                return Err(EwmError::validation(format!(
                    "Request {id} appears more than once in the batch"
                )));
            }
            if !state.requests.contains_key(id) {
                return Err(EwmError::conflict(format!(
                    "Request {id} does not belong to event {}",
                    event.id
                )));
            }
        }

        let confirmed_count = state.confirmed_count();
        if confirmed_count >= event.participant_limit {
            return Err(EwmError::conflict(format!(
                "Event {} has no vacancy left ({confirmed_count} of {} confirmed)",
                event.id, event.participant_limit
            )));
        }

        let mut vacant = event.participant_limit - confirmed_count;
        let mut confirmed = Vec::new();
        let mut rejected = Vec::new();
        for id in request_ids {
            let current = state.requests.get(id).map(|request| request.status);
            if current != Some(RequestStatus::Pending) {
                return Err(EwmError::conflict(format!(
                    "Request {id} must have status PENDING to be resolved"
                )));
            }
            if status == RequestStatus::Confirmed && vacant > 0 {
                confirmed.push(*id);
                vacant -= 1;
            } else {
                rejected.push(*id);
            }
        }
        Ok(AdmissionAction::RequestsResolved {
            confirmed,
            rejected,
        })
    }

    /// Applies an event to state
    fn apply_event(state: &mut AdmissionState, action: &AdmissionAction) {
        match action {
            AdmissionAction::RequestCreated { request } => {
                state.requests.insert(request.id, request.clone());
                state.last_outcome = Some(AdmissionOutcome::Created(request.clone()));
                state.last_error = None;
            },
            AdmissionAction::RequestAutoConfirmed { request_id } => {
                if let Some(request) = state.set_status(*request_id, RequestStatus::Confirmed) {
                    state.last_outcome = Some(AdmissionOutcome::Created(request));
                }
                state.recount();
                state.last_error = None;
            },
            AdmissionAction::RequestsResolved {
                confirmed,
                rejected,
            } => {
                let confirmed = confirmed
                    .iter()
                    .filter_map(|id| state.set_status(*id, RequestStatus::Confirmed))
                    .collect();
                let rejected = rejected
                    .iter()
                    .filter_map(|id| state.set_status(*id, RequestStatus::Rejected))
                    .collect();
                state.recount();
                state.last_outcome = Some(AdmissionOutcome::Resolved {
                    confirmed,
                    rejected,
                });
                state.last_error = None;
            },
            AdmissionAction::ResolutionSkipped => {
                state.last_outcome = Some(AdmissionOutcome::Resolved {
                    confirmed: Vec::new(),
                    rejected: Vec::new(),
                });
                state.last_error = None;
            },
            AdmissionAction::RequestCanceled { request_id } => {
                if let Some(request) = state.set_status(*request_id, RequestStatus::Canceled) {
                    state.last_outcome = Some(AdmissionOutcome::Canceled(request));
                }
                state.recount();
                state.last_error = None;
            },
            AdmissionAction::AdmissionRejected { error } => {
                state.last_outcome = None;
                state.last_error = Some(error.clone());
            },
            AdmissionAction::CommitFailed { error } => {
                state.last_outcome = None;
                state.last_error = Some(EwmError::Storage(error.clone()));
            },
            // Commands don't modify state
            AdmissionAction::CreateRequest { .. }
            | AdmissionAction::ResolveRequests { .. }
            | AdmissionAction::CancelRequest { .. } => {},
        }
    }
}

impl Reducer for AdmissionReducer {
    type State = AdmissionState;
    type Action = AdmissionAction;
    type Environment = AdmissionEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            AdmissionAction::CreateRequest {
                request_id,
                requester_id,
            } => {
                let (event_id, auto_confirm) =
                    match Self::validate_create(state, request_id, requester_id) {
                        Ok(event) => (event.id, !event.moderates_requests()),
                        Err(error) => return Self::reject(state, error),
                    };

                let request = Request {
                    id: request_id,
                    event_id,
                    requester_id,
                    created: env.clock.now(),
                    status: RequestStatus::Pending,
                };
                Self::apply_event(state, &AdmissionAction::RequestCreated { request });
                if auto_confirm {
                    Self::apply_event(state, &AdmissionAction::RequestAutoConfirmed { request_id });
                }
                tracing::debug!(%event_id, %request_id, auto_confirm, "Participation request created");

                Self::persist(state, &[request_id], auto_confirm, env)
            },

            AdmissionAction::ResolveRequests {
                user_id,
                request_ids,
                status,
            } => {
                let resolution = match Self::plan_resolution(state, user_id, &request_ids, status) {
                    Ok(resolution) => resolution,
                    Err(error) => return Self::reject(state, error),
                };
                Self::apply_event(state, &resolution);

                if let AdmissionAction::RequestsResolved {
                    confirmed,
                    rejected,
                } = &resolution
                {
                    tracing::debug!(
                        confirmed = confirmed.len(),
                        rejected = rejected.len(),
                        "Batch resolved"
                    );
                    Self::persist(state, &request_ids, !confirmed.is_empty(), env)
                } else {
                    tracing::debug!("Event does not moderate requests, batch skipped");
                    SmallVec::new()
                }
            },

            AdmissionAction::CancelRequest {
                user_id,
                request_id,
            } => {
                let Some(request) = state.requests.get(&request_id).cloned() else {
                    return Self::reject(state, EwmError::not_found("Request", request_id.value()));
                };
                if request.requester_id != user_id {
                    return Self::reject(
                        state,
                        EwmError::conflict(format!(
                            "User {user_id} is not the requester of request {request_id}"
                        )),
                    );
                }
                if request.status == RequestStatus::Canceled {
                    state.last_outcome = Some(AdmissionOutcome::Canceled(request));
                    state.last_error = None;
                    return SmallVec::new();
                }

                let was_confirmed = request.status == RequestStatus::Confirmed;
                Self::apply_event(state, &AdmissionAction::RequestCanceled { request_id });

                Self::persist(state, &[request_id], was_confirmed, env)
            },

            // ========== Events (fed back from effects) ==========
            event => {
                Self::apply_event(state, &event);
                SmallVec::new()
            },
        }
    }
}
