//! Participation request service.

use super::{settle, AppContext};
use crate::aggregates::admission::{
    AdmissionAction, AdmissionEnvironment, AdmissionOutcome, AdmissionReducer, AdmissionState,
};
use crate::dto::{ParticipationRequest, RequestsResolution, ResolveRequests};
use crate::error::EwmError;
use crate::metrics;
use crate::types::{EventId, RequestId, UserId};
use std::sync::Arc;

/// Request admission operations
pub struct RequestService {
    ctx: Arc<AppContext>,
    reducer: AdmissionReducer,
    env: AdmissionEnvironment,
}

impl RequestService {
    /// Create the service
    #[must_use]
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let env = AdmissionEnvironment::new(Arc::clone(&ctx.clock), Arc::clone(&ctx.storage));
        Self {
            ctx,
            reducer: AdmissionReducer::new(),
            env,
        }
    }

    /// Ask to take part in an event
    ///
    /// # Errors
    ///
    /// NotFound for unknown ids; Conflict when the event is not published,
    /// belongs to the caller, is full, or the caller already has a live request.
    pub async fn create_request(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<ParticipationRequest, EwmError> {
        self.ctx.resolver.user(user_id).await?;
        self.ctx.resolver.event(event_id).await?;
        let request_id = self.ctx.storage.next_request_id().await?;

        let outcome = self
            .run(
                event_id,
                AdmissionAction::CreateRequest {
                    request_id,
                    requester_id: user_id,
                },
            )
            .await?;

        match outcome {
            AdmissionOutcome::Created(request) => {
                metrics::record_requests(request.status, 1);
                tracing::info!(%event_id, %request_id, %user_id, status = %request.status, "Participation request created");
                Ok(ParticipationRequest::from(&request))
            },
            other => Err(unexpected(&other)),
        }
    }

    /// Requests made by `user_id`
    ///
    /// # Errors
    ///
    /// NotFound for an unknown user.
    pub async fn requests_of_user(&self, user_id: UserId) -> Result<Vec<ParticipationRequest>, EwmError> {
        self.ctx.resolver.user(user_id).await?;
        let requests = self.ctx.storage.requests_of_user(user_id).await?;
        Ok(requests.iter().map(ParticipationRequest::from).collect())
    }

    /// Withdraw one of the caller's requests
    ///
    /// # Errors
    ///
    /// NotFound for unknown ids, Conflict when the caller is not the requester.
    pub async fn cancel_request(
        &self,
        user_id: UserId,
        request_id: RequestId,
    ) -> Result<ParticipationRequest, EwmError> {
        self.ctx.resolver.user(user_id).await?;
        let request = self.ctx.resolver.request(request_id).await?;

        let outcome = self
            .run(
                request.event_id,
                AdmissionAction::CancelRequest {
                    user_id,
                    request_id,
                },
            )
            .await?;

        match outcome {
            AdmissionOutcome::Canceled(request) => {
                metrics::record_requests(request.status, 1);
                tracing::info!(event_id = %request.event_id, %request_id, %user_id, "Participation request canceled");
                Ok(ParticipationRequest::from(&request))
            },
            other => Err(unexpected(&other)),
        }
    }

    /// Requests for an event, visible to its initiator only
    ///
    /// # Errors
    ///
    /// NotFound for unknown ids, Conflict when the caller is not the initiator.
    pub async fn requests_of_event(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<Vec<ParticipationRequest>, EwmError> {
        self.ctx.resolver.user(user_id).await?;
        let event = self.ctx.resolver.event(event_id).await?;
        if event.initiator_id != user_id {
            return Err(EwmError::conflict(format!(
                "User {user_id} is not the initiator of event {event_id}"
            )));
        }
        let requests = self.ctx.storage.requests_of_event(event_id).await?;
        Ok(requests.iter().map(ParticipationRequest::from).collect())
    }

    /// Confirm or reject a batch of pending requests in the order supplied
    ///
    /// # Errors
    ///
    /// Conflict when the caller is not the initiator. Events without
    /// moderation, and empty batches, resolve nothing. Otherwise NotFound for
    /// unknown ids; Conflict for a foreign request, no vacancy, or a request
    /// that is not PENDING; Validation for a duplicated id or a target status
    /// other than CONFIRMED / REJECTED.
    pub async fn resolve_requests(
        &self,
        user_id: UserId,
        event_id: EventId,
        batch: ResolveRequests,
    ) -> Result<RequestsResolution, EwmError> {
        self.ctx.resolver.user(user_id).await?;
        let event = self.ctx.resolver.event(event_id).await?;
        if event.initiator_id != user_id {
            return Err(EwmError::conflict(format!(
                "User {user_id} is not the initiator of event {event_id}"
            )));
        }
        // Unmoderated events never look at the batch
        if event.moderates_requests() {
            for id in &batch.request_ids {
                self.ctx.resolver.request(*id).await?;
            }
        }

        let outcome = self
            .run(
                event_id,
                AdmissionAction::ResolveRequests {
                    user_id,
                    request_ids: batch.request_ids,
                    status: batch.status,
                },
            )
            .await?;

        match outcome {
            AdmissionOutcome::Resolved {
                confirmed,
                rejected,
            } => {
                if !confirmed.is_empty() || !rejected.is_empty() {
                    metrics::record_batch_resolution(confirmed.len(), rejected.len());
                }
                tracing::info!(
                    %event_id,
                    confirmed = confirmed.len(),
                    rejected = rejected.len(),
                    "Requests resolved"
                );
                Ok(RequestsResolution {
                    confirmed_requests: confirmed.iter().map(ParticipationRequest::from).collect(),
                    rejected_requests: rejected.iter().map(ParticipationRequest::from).collect(),
                })
            },
            other => Err(unexpected(&other)),
        }
    }

    /// Run one admission command inside the event's lock
    async fn run(&self, event_id: EventId, action: AdmissionAction) -> Result<AdmissionOutcome, EwmError> {
        let _guard = self.ctx.locks.acquire(event_id).await;

        let event = self.ctx.resolver.event(event_id).await?;
        let requests = self.ctx.storage.requests_of_event(event_id).await?;
        let mut state = AdmissionState::new(event, requests);

        ewm_runtime::dispatch(&self.reducer, &mut state, action, &self.env).await;
        settle(state.last_error.take())?;

        state
            .last_outcome
            .ok_or_else(|| EwmError::Storage("Admission command produced no outcome".into()))
    }
}

fn unexpected(outcome: &AdmissionOutcome) -> EwmError {
    EwmError::Storage(format!("Unexpected admission outcome: {outcome:?}"))
}
