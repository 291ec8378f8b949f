//! Domain types for the event admission service.
//!
//! Identifiers, the two state machines' state enums, and the entities the
//! aggregates and glue services operate on.

use crate::dto::date_format;
use crate::error::EwmError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw identifier
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// The raw identifier
            #[must_use]
            pub const fn value(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier of a registered user
    UserId
);
entity_id!(
    /// Identifier of an event category
    CategoryId
);
entity_id!(
    /// Identifier of an event
    EventId
);
entity_id!(
    /// Identifier of a participation request
    RequestId
);
entity_id!(
    /// Identifier of an event compilation
    CompilationId
);
entity_id!(
    /// Identifier of a comment
    CommentId
);

// ============================================================================
// State machines
// ============================================================================

/// Publication state of an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventState {
    /// Awaiting moderation (initial)
    Pending,
    /// Visible to the public (terminal)
    Published,
    /// Rejected by an administrator or withdrawn by the initiator
    Canceled,
}

impl EventState {
    /// Wire name of the state
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Published => "PUBLISHED",
            Self::Canceled => "CANCELED",
        }
    }
}

impl FromStr for EventState {
    type Err = EwmError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "PENDING" => Ok(Self::Pending),
            "PUBLISHED" => Ok(Self::Published),
            "CANCELED" => Ok(Self::Canceled),
            other => Err(EwmError::validation(format!("Unknown state: {other}"))),
        }
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Approval status of a participation request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    /// Awaiting the initiator's decision
    Pending,
    /// Admitted, counts against the participant limit
    Confirmed,
    /// Refused by the initiator or by exhausted capacity
    Rejected,
    /// Withdrawn by the requester
    Canceled,
}

impl RequestStatus {
    /// Wire name of the status
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Rejected => "REJECTED",
            Self::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State transition directive carried by an event update
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateAction {
    /// Initiator re-submits the event for moderation
    SendToReview,
    /// Initiator withdraws the event
    CancelReview,
    /// Administrator publishes the event
    PublishEvent,
    /// Administrator rejects the event
    RejectEvent,
}

impl StateAction {
    /// Wire name of the action
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SendToReview => "SEND_TO_REVIEW",
            Self::CancelReview => "CANCEL_REVIEW",
            Self::PublishEvent => "PUBLISH_EVENT",
            Self::RejectEvent => "REJECT_EVENT",
        }
    }
}

impl fmt::Display for StateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is editing an event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Editor {
    /// The user who created the event
    Initiator(UserId),
    /// An administrator
    Admin,
}

// ============================================================================
// Entities
// ============================================================================

/// Geographic point of an event
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lon: f64,
}

/// Event aggregate root
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// Identifier
    pub id: EventId,
    /// Short title
    pub title: String,
    /// Summary shown in listings
    pub annotation: String,
    /// Full description
    pub description: String,
    /// Category reference
    pub category_id: CategoryId,
    /// Where the event takes place
    pub location: Location,
    /// When the event takes place
    pub event_date: DateTime<Utc>,
    /// Set once at creation
    pub created_on: DateTime<Utc>,
    /// Set once on publication
    pub published_on: Option<DateTime<Utc>>,
    /// Whether participation is paid
    pub paid: bool,
    /// Maximum confirmed participants, 0 = unlimited
    pub participant_limit: u32,
    /// Whether requests wait for the initiator's decision
    pub request_moderation: bool,
    /// Cached count of confirmed requests
    pub confirmed_requests: u32,
    /// Cached view count from the stats service
    pub views: u64,
    /// Publication state
    pub state: EventState,
    /// Creator, immutable
    pub initiator_id: UserId,
}

impl Event {
    /// Whether requests for this event need an explicit decision.
    ///
    /// Unlimited events never moderate, whatever `request_moderation` says.
    #[must_use]
    pub const fn moderates_requests(&self) -> bool {
        self.request_moderation && self.participant_limit != 0
    }

    /// Whether `confirmed` participants exhaust the limit
    #[must_use]
    pub const fn is_full_with(&self, confirmed: u32) -> bool {
        self.participant_limit != 0 && confirmed >= self.participant_limit
    }

    /// Whether the cached confirmed count exhausts the limit
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.is_full_with(self.confirmed_requests)
    }

    /// Stats URI under which views of this event are counted
    #[must_use]
    pub fn uri(&self) -> String {
        format!("/events/{}", self.id)
    }
}

/// Fields of a new event, defaults already applied
#[derive(Clone, Debug, PartialEq)]
pub struct EventDraft {
    /// Short title
    pub title: String,
    /// Summary shown in listings
    pub annotation: String,
    /// Full description
    pub description: String,
    /// Category reference
    pub category_id: CategoryId,
    /// Where the event takes place
    pub location: Location,
    /// When the event takes place
    pub event_date: DateTime<Utc>,
    /// Whether participation is paid
    pub paid: bool,
    /// Maximum confirmed participants, 0 = unlimited
    pub participant_limit: u32,
    /// Whether requests wait for the initiator's decision
    pub request_moderation: bool,
}

/// Partial update of an event; `None` leaves the field untouched
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventPatch {
    /// New title
    pub title: Option<String>,
    /// New annotation
    pub annotation: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New category
    pub category_id: Option<CategoryId>,
    /// New location
    pub location: Option<Location>,
    /// New date
    pub event_date: Option<DateTime<Utc>>,
    /// New paid flag
    pub paid: Option<bool>,
    /// New participant limit
    pub participant_limit: Option<u32>,
    /// New moderation flag
    pub request_moderation: Option<bool>,
}

impl EventPatch {
    /// Whether the patch changes nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overwrite the present fields of `event`
    pub fn apply_to(&self, event: &mut Event) {
        if let Some(title) = &self.title {
            event.title.clone_from(title);
        }
        if let Some(annotation) = &self.annotation {
            event.annotation.clone_from(annotation);
        }
        if let Some(description) = &self.description {
            event.description.clone_from(description);
        }
        if let Some(category_id) = self.category_id {
            event.category_id = category_id;
        }
        if let Some(location) = self.location {
            event.location = location;
        }
        if let Some(event_date) = self.event_date {
            event.event_date = event_date;
        }
        if let Some(paid) = self.paid {
            event.paid = paid;
        }
        if let Some(limit) = self.participant_limit {
            event.participant_limit = limit;
        }
        if let Some(moderation) = self.request_moderation {
            event.request_moderation = moderation;
        }
    }
}

/// Participation request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// Identifier
    pub id: RequestId,
    /// Requested event
    pub event_id: EventId,
    /// Requesting user, never the event's initiator
    pub requester_id: UserId,
    /// Set once at creation
    pub created: DateTime<Utc>,
    /// Approval status
    pub status: RequestStatus,
}

/// Registered user
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    /// Identifier
    pub id: UserId,
    /// Display name
    pub name: String,
    /// Unique email
    pub email: String,
}

/// Event category
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Category {
    /// Identifier
    pub id: CategoryId,
    /// Unique name
    pub name: String,
}

/// Curated list of events
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Compilation {
    /// Identifier
    pub id: CompilationId,
    /// Title
    pub title: String,
    /// Whether the compilation is pinned on the main page
    pub pinned: bool,
    /// Events in display order
    pub event_ids: Vec<EventId>,
}

/// Comment left by a user on an event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Comment {
    /// Identifier
    pub id: CommentId,
    /// Author
    pub author_id: UserId,
    /// Commented event
    pub event_id: EventId,
    /// Text
    pub message: String,
    /// When the comment was written
    pub created: DateTime<Utc>,
}

// ============================================================================
// Query helpers
// ============================================================================

/// Offset-based page
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    /// Number of records to skip
    pub from: usize,
    /// Maximum records returned
    pub size: usize,
}

impl Page {
    /// Build a page, rejecting a zero size
    ///
    /// # Errors
    ///
    /// Returns [`EwmError::Validation`] when `size` is zero.
    pub fn new(from: usize, size: usize) -> Result<Self, EwmError> {
        if size == 0 {
            return Err(EwmError::validation("Page size must be greater than zero"));
        }
        Ok(Self { from, size })
    }

    /// Apply the page to an already ordered sequence
    pub fn slice<T>(self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items.into_iter().skip(self.from).take(self.size).collect()
    }
}

/// Optional inclusive time range
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateRange {
    /// Lower bound
    pub start: Option<DateTime<Utc>>,
    /// Upper bound
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Parse `yyyy-MM-dd HH:mm:ss` bounds
    ///
    /// # Errors
    ///
    /// Returns [`EwmError::Validation`] when a bound cannot be parsed or the
    /// start lies after the end.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, EwmError> {
        let parse = |raw: Option<&str>| {
            raw.map(|value| {
                date_format::parse(value).map_err(|error| {
                    EwmError::validation(format!("Invalid date '{value}': {error}"))
                })
            })
            .transpose()
        };

        let range = Self {
            start: parse(start)?,
            end: parse(end)?,
        };
        if let (Some(start), Some(end)) = (range.start, range.end) {
            if start > end {
                return Err(EwmError::validation("Range start must not be after range end"));
            }
        }
        Ok(range)
    }

    /// Require both bounds, when present, to lie in the past
    ///
    /// # Errors
    ///
    /// Returns [`EwmError::Validation`] when a bound is after `now`.
    pub fn ensure_past(self, now: DateTime<Utc>) -> Result<Self, EwmError> {
        if self.start.is_some_and(|start| start > now) || self.end.is_some_and(|end| end > now) {
            return Err(EwmError::validation("Range bounds must be in the past"));
        }
        Ok(self)
    }

    /// Whether `moment` lies within the range
    #[must_use]
    pub fn contains(&self, moment: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| moment >= start) && self.end.is_none_or(|end| moment <= end)
    }

    /// Whether neither bound is set
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Ordering of public event listings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventSort {
    /// Soonest first
    EventDate,
    /// Most viewed first
    Views,
}

impl FromStr for EventSort {
    type Err = EwmError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "EVENT_DATE" => Ok(Self::EventDate),
            "VIEWS" => Ok(Self::Views),
            other => Err(EwmError::validation(format!("Unknown sort: {other}"))),
        }
    }
}

/// Who performed a public read, used for hit recording
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Origin {
    /// Requested URI
    pub uri: String,
    /// Caller IP address
    pub ip: String,
}

impl Origin {
    /// Create a new origin
    #[must_use]
    pub fn new(uri: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ip: ip.into(),
        }
    }
}
