//! Transfer shapes exchanged with callers.
//!
//! Field names are camelCase and timestamps use the `yyyy-MM-dd HH:mm:ss`
//! format. Conversions from domain types are pure functions; rendering an
//! event needs its category and initiator, which the caller resolves.

use crate::types::{
    Category, CategoryId, Comment, CommentId, Compilation, CompilationId, Event, EventDraft,
    EventId, EventPatch, EventState, Location, Request, RequestId, RequestStatus, StateAction,
    User, UserId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serde adapter for `yyyy-MM-dd HH:mm:ss` timestamps (interpreted as UTC)
pub mod date_format {
    use chrono::{DateTime, NaiveDateTime, ParseError, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// `strftime` pattern of the wire format
    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    /// Parse a wire timestamp
    ///
    /// # Errors
    ///
    /// Returns the chrono parse error when `value` does not match [`FORMAT`].
    pub fn parse(value: &str) -> Result<DateTime<Utc>, ParseError> {
        NaiveDateTime::parse_from_str(value, FORMAT).map(|naive| naive.and_utc())
    }

    /// Render a timestamp in wire format
    #[must_use]
    pub fn format(value: &DateTime<Utc>) -> String {
        value.format(FORMAT).to_string()
    }

    /// Serialize a timestamp
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    /// Deserialize a timestamp
    ///
    /// # Errors
    ///
    /// Fails when the input is not a string in wire format.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    /// Same format for optional timestamps
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        /// Serialize an optional timestamp
        ///
        /// # Errors
        ///
        /// Propagates serializer errors.
        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_some(&super::format(value)),
                None => serializer.serialize_none(),
            }
        }

        /// Deserialize an optional timestamp
        ///
        /// # Errors
        ///
        /// Fails when a present value is not in wire format.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| super::parse(&raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

// ============================================================================
// Outputs
// ============================================================================

/// Category as shown to callers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryView {
    /// Identifier
    pub id: CategoryId,
    /// Name
    pub name: String,
}

impl From<&Category> for CategoryView {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
        }
    }
}

/// User with contact details (admin listing)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    /// Identifier
    pub id: UserId,
    /// Name
    pub name: String,
    /// Email
    pub email: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// User reference embedded in other views
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserShort {
    /// Identifier
    pub id: UserId,
    /// Name
    pub name: String,
}

impl From<&User> for UserShort {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
        }
    }
}

/// Complete event view
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFull {
    /// Identifier
    pub id: EventId,
    /// Title
    pub title: String,
    /// Annotation
    pub annotation: String,
    /// Description
    pub description: String,
    /// Category
    pub category: CategoryView,
    /// Location
    pub location: Location,
    /// Event date
    #[serde(with = "date_format")]
    pub event_date: DateTime<Utc>,
    /// Creation time
    #[serde(with = "date_format")]
    pub created_on: DateTime<Utc>,
    /// Publication time
    #[serde(with = "date_format::option")]
    pub published_on: Option<DateTime<Utc>>,
    /// Paid participation
    pub paid: bool,
    /// Participant limit, 0 = unlimited
    pub participant_limit: u32,
    /// Moderation flag
    pub request_moderation: bool,
    /// Confirmed participants
    pub confirmed_requests: u32,
    /// Views
    pub views: u64,
    /// Publication state
    pub state: EventState,
    /// Initiator
    pub initiator: UserShort,
}

impl EventFull {
    /// Render `event` with its resolved category and initiator
    #[must_use]
    pub fn new(event: &Event, category: &Category, initiator: &User) -> Self {
        Self {
            id: event.id,
            title: event.title.clone(),
            annotation: event.annotation.clone(),
            description: event.description.clone(),
            category: category.into(),
            location: event.location,
            event_date: event.event_date,
            created_on: event.created_on,
            published_on: event.published_on,
            paid: event.paid,
            participant_limit: event.participant_limit,
            request_moderation: event.request_moderation,
            confirmed_requests: event.confirmed_requests,
            views: event.views,
            state: event.state,
            initiator: initiator.into(),
        }
    }
}

/// Event view used in listings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventShort {
    /// Identifier
    pub id: EventId,
    /// Title
    pub title: String,
    /// Annotation
    pub annotation: String,
    /// Category
    pub category: CategoryView,
    /// Event date
    #[serde(with = "date_format")]
    pub event_date: DateTime<Utc>,
    /// Paid participation
    pub paid: bool,
    /// Confirmed participants
    pub confirmed_requests: u32,
    /// Views
    pub views: u64,
    /// Initiator
    pub initiator: UserShort,
}

impl EventShort {
    /// Render `event` with its resolved category and initiator
    #[must_use]
    pub fn new(event: &Event, category: &Category, initiator: &User) -> Self {
        Self {
            id: event.id,
            title: event.title.clone(),
            annotation: event.annotation.clone(),
            category: category.into(),
            event_date: event.event_date,
            paid: event.paid,
            confirmed_requests: event.confirmed_requests,
            views: event.views,
            initiator: initiator.into(),
        }
    }
}

/// Participation request view
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipationRequest {
    /// Identifier
    pub id: RequestId,
    /// Requested event
    pub event: EventId,
    /// Requester
    pub requester: UserId,
    /// Creation time
    #[serde(with = "date_format")]
    pub created: DateTime<Utc>,
    /// Status
    pub status: RequestStatus,
}

impl From<&Request> for ParticipationRequest {
    fn from(request: &Request) -> Self {
        Self {
            id: request.id,
            event: request.event_id,
            requester: request.requester_id,
            created: request.created,
            status: request.status,
        }
    }
}

/// Outcome of a batch decision
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestsResolution {
    /// Requests confirmed by this batch, in input order
    pub confirmed_requests: Vec<ParticipationRequest>,
    /// Requests rejected by this batch, in input order
    pub rejected_requests: Vec<ParticipationRequest>,
}

/// Compilation view
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationView {
    /// Identifier
    pub id: CompilationId,
    /// Title
    pub title: String,
    /// Pinned flag
    pub pinned: bool,
    /// Events of the compilation
    pub events: Vec<EventShort>,
}

impl CompilationView {
    /// Render a compilation with its already rendered events
    #[must_use]
    pub fn new(compilation: &Compilation, events: Vec<EventShort>) -> Self {
        Self {
            id: compilation.id,
            title: compilation.title.clone(),
            pinned: compilation.pinned,
            events,
        }
    }
}

/// Comment with author and event details
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentView {
    /// Identifier
    pub id: CommentId,
    /// Author
    pub user: UserShort,
    /// Commented event
    pub event: EventShort,
    /// Text
    pub message: String,
    /// Creation time
    #[serde(with = "date_format")]
    pub created: DateTime<Utc>,
}

impl CommentView {
    /// Render a comment with its resolved author and event
    #[must_use]
    pub fn new(comment: &Comment, author: &User, event: EventShort) -> Self {
        Self {
            id: comment.id,
            user: author.into(),
            event,
            message: comment.message.clone(),
            created: comment.created,
        }
    }
}

/// Comment summary used in per-user and per-event listings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentShort {
    /// Author name
    pub user_name: String,
    /// Event title
    pub event_title: String,
    /// Text
    pub message: String,
    /// Creation time
    #[serde(with = "date_format")]
    pub created: DateTime<Utc>,
}

impl CommentShort {
    /// Summarize a comment
    #[must_use]
    pub fn new(comment: &Comment, author: &User, event: &Event) -> Self {
        Self {
            user_name: author.name.clone(),
            event_title: event.title.clone(),
            message: comment.message.clone(),
            created: comment.created,
        }
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// New event as submitted by its initiator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    /// Title
    pub title: String,
    /// Annotation
    pub annotation: String,
    /// Description
    pub description: String,
    /// Category
    pub category: CategoryId,
    /// Location
    pub location: Location,
    /// Event date
    #[serde(with = "date_format")]
    pub event_date: DateTime<Utc>,
    /// Paid participation (default false)
    #[serde(default)]
    pub paid: Option<bool>,
    /// Participant limit (default 0)
    #[serde(default)]
    pub participant_limit: Option<u32>,
    /// Moderation flag (default true)
    #[serde(default)]
    pub request_moderation: Option<bool>,
}

impl From<NewEvent> for EventDraft {
    fn from(input: NewEvent) -> Self {
        Self {
            title: input.title,
            annotation: input.annotation,
            description: input.description,
            category_id: input.category,
            location: input.location,
            event_date: input.event_date,
            paid: input.paid.unwrap_or(false),
            participant_limit: input.participant_limit.unwrap_or(0),
            request_moderation: input.request_moderation.unwrap_or(true),
        }
    }
}

/// Partial event update, optionally carrying a state action
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateEvent {
    /// New title
    pub title: Option<String>,
    /// New annotation
    pub annotation: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New category
    pub category: Option<CategoryId>,
    /// New location
    pub location: Option<Location>,
    /// New event date
    #[serde(with = "date_format::option")]
    pub event_date: Option<DateTime<Utc>>,
    /// New paid flag
    pub paid: Option<bool>,
    /// New participant limit
    pub participant_limit: Option<u32>,
    /// New moderation flag
    pub request_moderation: Option<bool>,
    /// Requested transition
    pub state_action: Option<StateAction>,
}

impl UpdateEvent {
    /// Split into the transition directive and the field patch.
    ///
    /// Blank text fields are treated as absent.
    #[must_use]
    pub fn into_parts(self) -> (Option<StateAction>, EventPatch) {
        let present = |value: Option<String>| value.filter(|text| !text.trim().is_empty());
        let patch = EventPatch {
            title: present(self.title),
            annotation: present(self.annotation),
            description: present(self.description),
            category_id: self.category,
            location: self.location,
            event_date: self.event_date,
            paid: self.paid,
            participant_limit: self.participant_limit,
            request_moderation: self.request_moderation,
        };
        (self.state_action, patch)
    }
}

/// Batch decision submitted by an event's initiator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequests {
    /// Requests to decide, in processing order
    pub request_ids: Vec<RequestId>,
    /// Target status, `CONFIRMED` or `REJECTED`
    pub status: RequestStatus,
}

/// New user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    /// Name
    pub name: String,
    /// Email
    pub email: String,
}

/// New or renamed category
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    /// Name
    pub name: String,
}

/// New compilation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompilation {
    /// Title
    pub title: String,
    /// Pinned flag (default false)
    #[serde(default)]
    pub pinned: Option<bool>,
    /// Events, unknown ids are ignored
    #[serde(default)]
    pub events: Vec<EventId>,
}

/// Partial compilation update
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateCompilation {
    /// New title
    pub title: Option<String>,
    /// New pinned flag
    pub pinned: Option<bool>,
    /// Replacement event list
    pub events: Option<Vec<EventId>>,
}

/// New or edited comment text
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    /// Text
    pub message: String,
}

/// Administrator event search parameters
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminEventFilter {
    /// Initiators to include
    pub users: Option<Vec<UserId>>,
    /// State names to include
    pub states: Option<Vec<String>>,
    /// Categories to include
    pub categories: Option<Vec<CategoryId>>,
    /// Lower bound on the event date
    pub range_start: Option<String>,
    /// Upper bound on the event date
    pub range_end: Option<String>,
}

/// Public event search parameters
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublicEventFilter {
    /// Case-insensitive text searched in annotation and description
    pub text: Option<String>,
    /// Categories to include
    pub categories: Option<Vec<CategoryId>>,
    /// Paid flag to match
    pub paid: Option<bool>,
    /// Lower bound on the event date
    pub range_start: Option<String>,
    /// Upper bound on the event date
    pub range_end: Option<String>,
    /// Only events with free places
    pub only_available: bool,
    /// `EVENT_DATE` or `VIEWS`
    pub sort: Option<String>,
}
