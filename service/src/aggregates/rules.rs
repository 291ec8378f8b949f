//! Rules shared by the reducers and the glue services.
//!
//! Field constraints, the event transition table and patch validation.

use crate::error::EwmError;
use crate::types::{Editor, Event, EventDraft, EventPatch, EventState, StateAction};
use chrono::{DateTime, Utc};

/// Length bounds of a text field, in characters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextRule {
    /// Field name used in error messages
    pub field: &'static str,
    /// Minimum length
    pub min: usize,
    /// Maximum length
    pub max: usize,
}

impl TextRule {
    /// Check `value` against the bounds; blank text is always refused
    ///
    /// # Errors
    ///
    /// Returns [`EwmError::Validation`] naming the field.
    pub fn check(&self, value: &str) -> Result<(), EwmError> {
        if value.trim().is_empty() {
            return Err(EwmError::validation(format!(
                "Field: {}. Error: must not be blank.",
                self.field
            )));
        }
        let length = value.chars().count();
        if length < self.min || length > self.max {
            return Err(EwmError::validation(format!(
                "Field: {}. Error: length must be between {} and {}. Value length: {length}",
                self.field, self.min, self.max
            )));
        }
        Ok(())
    }

    /// Check `value` only when present
    ///
    /// # Errors
    ///
    /// Same as [`TextRule::check`].
    pub fn check_present(&self, value: Option<&str>) -> Result<(), EwmError> {
        value.map_or(Ok(()), |value| self.check(value))
    }
}

/// Event title
pub const TITLE: TextRule = TextRule { field: "title", min: 3, max: 120 };
/// Event annotation
pub const ANNOTATION: TextRule = TextRule { field: "annotation", min: 20, max: 2000 };
/// Event description
pub const DESCRIPTION: TextRule = TextRule { field: "description", min: 20, max: 7000 };
/// User name
pub const USER_NAME: TextRule = TextRule { field: "name", min: 2, max: 250 };
/// User email
pub const EMAIL: TextRule = TextRule { field: "email", min: 6, max: 254 };
/// Category name
pub const CATEGORY_NAME: TextRule = TextRule { field: "name", min: 1, max: 50 };
/// Compilation title
pub const COMPILATION_TITLE: TextRule = TextRule { field: "title", min: 1, max: 50 };
/// Comment text
pub const COMMENT_MESSAGE: TextRule = TextRule { field: "message", min: 20, max: 500 };

/// Require an event date strictly after `now`
///
/// # Errors
///
/// Returns [`EwmError::Validation`] otherwise.
pub fn ensure_future(event_date: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), EwmError> {
    if event_date <= now {
        return Err(EwmError::validation(format!(
            "Field: eventDate. Error: must be in the future. Value: {}",
            crate::dto::date_format::format(&event_date)
        )));
    }
    Ok(())
}

/// Validate a new event's fields
///
/// # Errors
///
/// Returns [`EwmError::Validation`] for the first offending field.
pub fn validate_draft(draft: &EventDraft, now: DateTime<Utc>) -> Result<(), EwmError> {
    TITLE.check(&draft.title)?;
    ANNOTATION.check(&draft.annotation)?;
    DESCRIPTION.check(&draft.description)?;
    ensure_future(draft.event_date, now)
}

/// Validate a patch against the event it would modify
///
/// # Errors
///
/// Returns [`EwmError::Validation`] for malformed fields and
/// [`EwmError::Conflict`] when a new limit is below the confirmed count.
pub fn validate_patch(event: &Event, patch: &EventPatch, now: DateTime<Utc>) -> Result<(), EwmError> {
    TITLE.check_present(patch.title.as_deref())?;
    ANNOTATION.check_present(patch.annotation.as_deref())?;
    DESCRIPTION.check_present(patch.description.as_deref())?;
    if let Some(event_date) = patch.event_date {
        ensure_future(event_date, now)?;
    }
    if let Some(limit) = patch.participant_limit {
        if limit != 0 && limit < event.confirmed_requests {
            return Err(EwmError::conflict(format!(
                "Participant limit {limit} is below the {} confirmed requests of event {}",
                event.confirmed_requests, event.id
            )));
        }
    }
    Ok(())
}

/// Target state of `action` on `event` when performed by `editor`
///
/// # Errors
///
/// Returns [`EwmError::Validation`] when the action is not available to the
/// editor and [`EwmError::Conflict`] when the event is in the wrong state.
pub fn transition(event: &Event, action: StateAction, editor: Editor) -> Result<EventState, EwmError> {
    match (editor, action) {
        (Editor::Admin, StateAction::PublishEvent) => match event.state {
            EventState::Pending => Ok(EventState::Published),
            EventState::Published => Err(EwmError::conflict(format!(
                "Event {} has already been published, cannot be published again",
                event.id
            ))),
            EventState::Canceled => Err(EwmError::conflict(format!(
                "Event {} cannot be published because it is not pending",
                event.id
            ))),
        },
        (Editor::Admin, StateAction::RejectEvent) => pending_to_canceled(event, "rejected"),
        (Editor::Initiator(_), StateAction::CancelReview) => pending_to_canceled(event, "canceled"),
        (Editor::Initiator(_), StateAction::SendToReview) => match event.state {
            EventState::Pending | EventState::Canceled => Ok(EventState::Pending),
            EventState::Published => Err(EwmError::conflict(format!(
                "Event {} is published and cannot be sent to review",
                event.id
            ))),
        },
        (Editor::Admin, action) => Err(EwmError::validation(format!(
            "State action {action} is available to the initiator only"
        ))),
        (Editor::Initiator(_), action) => Err(EwmError::validation(format!(
            "State action {action} is available to administrators only"
        ))),
    }
}

fn pending_to_canceled(event: &Event, verb: &str) -> Result<EventState, EwmError> {
    if event.state == EventState::Pending {
        Ok(EventState::Canceled)
    } else {
        Err(EwmError::conflict(format!(
            "Event {} cannot be {verb} because its state is not PENDING (current: {})",
            event.id, event.state
        )))
    }
}
