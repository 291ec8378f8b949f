//! Persistence seam.
//!
//! The aggregates never talk to storage directly: they describe a
//! [`ChangeSet`] and the commit effect hands it to [`Storage::commit`], which
//! must write every record in it or none of them.

use crate::error::EwmError;
use crate::types::{
    Category, CategoryId, Comment, CommentId, Compilation, CompilationId, DateRange, Event,
    EventId, EventSort, EventState, Page, Request, RequestId, User, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// In-memory implementation
pub mod memory;

pub use memory::InMemoryStorage;

/// Errors raised by a storage backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// A uniqueness constraint was violated
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The record to update does not exist
    #[error("{entity} with id={id} does not exist")]
    Missing {
        /// Entity kind
        entity: &'static str,
        /// Identifier
        id: i64,
    },

    /// The record is still referenced by others and cannot be deleted
    #[error("{0}")]
    StillReferenced(String),

    /// The backend could not be reached
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<StorageError> for EwmError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::UniqueViolation(message) | StorageError::StillReferenced(message) => {
                Self::Conflict(message)
            },
            StorageError::Missing { entity, id } => Self::NotFound { entity, id },
            StorageError::Unavailable(_) => Self::Storage(error.to_string()),
        }
    }
}

/// Records written by one atomic commit
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeSet {
    /// Events to insert or overwrite
    pub events: Vec<Event>,
    /// Requests to insert or overwrite
    pub requests: Vec<Request>,
}

impl ChangeSet {
    /// Empty change set
    #[must_use]
    pub const fn new() -> Self {
        Self {
            events: Vec::new(),
            requests: Vec::new(),
        }
    }

    /// Add an event
    #[must_use]
    pub fn with_event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    /// Add a request
    #[must_use]
    pub fn with_request(mut self, request: Request) -> Self {
        self.requests.push(request);
        self
    }

    /// Whether there is nothing to write
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.requests.is_empty()
    }
}

/// Event search criteria; `None` means "any"
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventQuery {
    /// Initiators to include
    pub initiators: Option<Vec<UserId>>,
    /// States to include
    pub states: Option<Vec<EventState>>,
    /// Categories to include
    pub categories: Option<Vec<CategoryId>>,
    /// Lower-cased text to find in annotation or description
    pub text: Option<String>,
    /// Paid flag to match
    pub paid: Option<bool>,
    /// Event date range
    pub dates: DateRange,
    /// Only events with free places
    pub only_available: bool,
    /// Ordering, by id when absent
    pub sort: Option<EventSort>,
}

impl EventQuery {
    /// Whether `event` satisfies every criterion
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        self.initiators
            .as_ref()
            .is_none_or(|ids| ids.contains(&event.initiator_id))
            && self
                .states
                .as_ref()
                .is_none_or(|states| states.contains(&event.state))
            && self
                .categories
                .as_ref()
                .is_none_or(|ids| ids.contains(&event.category_id))
            && self.text.as_ref().is_none_or(|text| {
                event.annotation.to_lowercase().contains(text)
                    || event.description.to_lowercase().contains(text)
            })
            && self.paid.is_none_or(|paid| event.paid == paid)
            && self.dates.contains(event.event_date)
            && (!self.only_available || !event.is_full())
    }
}

/// Comment search criteria
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommentQuery {
    /// Author to match
    pub author: Option<UserId>,
    /// Event to match
    pub event: Option<EventId>,
    /// Creation time range
    pub created: DateRange,
}

impl CommentQuery {
    /// Whether `comment` satisfies every criterion
    #[must_use]
    pub fn matches(&self, comment: &Comment) -> bool {
        self.author.is_none_or(|id| comment.author_id == id)
            && self.event.is_none_or(|id| comment.event_id == id)
            && self.created.contains(comment.created)
    }
}

/// Persistence operations used by the services.
///
/// Lookups return `Ok(None)` for absent records; turning that into
/// [`EwmError::NotFound`] is the resolver's job.
#[async_trait]
pub trait Storage: Send + Sync {
    // ----- events and requests -----

    /// Reserve the next event id
    async fn next_event_id(&self) -> Result<EventId, StorageError>;

    /// Reserve the next request id
    async fn next_request_id(&self) -> Result<RequestId, StorageError>;

    /// Write every record of `changes` or none of them
    async fn commit(&self, changes: ChangeSet) -> Result<(), StorageError>;

    /// Overwrite only the cached view count of an event
    async fn update_views(&self, id: EventId, views: u64) -> Result<(), StorageError>;

    /// Find an event
    async fn event(&self, id: EventId) -> Result<Option<Event>, StorageError>;

    /// Events matching `query`, ordered then paged
    async fn events(&self, query: &EventQuery, page: Page) -> Result<Vec<Event>, StorageError>;

    /// Existing events among `ids`, in the order given
    async fn events_by_ids(&self, ids: &[EventId]) -> Result<Vec<Event>, StorageError>;

    /// Find a request
    async fn request(&self, id: RequestId) -> Result<Option<Request>, StorageError>;

    /// All requests for an event, by id
    async fn requests_of_event(&self, id: EventId) -> Result<Vec<Request>, StorageError>;

    /// All requests made by a user, by id
    async fn requests_of_user(&self, id: UserId) -> Result<Vec<Request>, StorageError>;

    // ----- users -----

    /// Insert a user; the email must be unique
    async fn insert_user(&self, name: String, email: String) -> Result<User, StorageError>;

    /// Find a user
    async fn user(&self, id: UserId) -> Result<Option<User>, StorageError>;

    /// Users by id, optionally restricted to `ids`
    async fn users(&self, ids: Option<&[UserId]>, page: Page) -> Result<Vec<User>, StorageError>;

    /// Delete a user nothing references, returning whether it existed
    ///
    /// The reference check and the removal happen atomically; a user that
    /// still has events, requests or comments yields
    /// [`StorageError::StillReferenced`].
    async fn delete_user(&self, id: UserId) -> Result<bool, StorageError>;

    // ----- categories -----

    /// Insert a category; the name must be unique
    async fn insert_category(&self, name: String) -> Result<Category, StorageError>;

    /// Rename a category; the name must stay unique
    async fn update_category(&self, category: Category) -> Result<(), StorageError>;

    /// Find a category
    async fn category(&self, id: CategoryId) -> Result<Option<Category>, StorageError>;

    /// Categories by id
    async fn categories(&self, page: Page) -> Result<Vec<Category>, StorageError>;

    /// Delete a category no event uses, returning whether it existed
    ///
    /// Fails with [`StorageError::StillReferenced`] while events use it.
    async fn delete_category(&self, id: CategoryId) -> Result<bool, StorageError>;

    // ----- compilations -----

    /// Insert a compilation
    async fn insert_compilation(
        &self,
        title: String,
        pinned: bool,
        event_ids: Vec<EventId>,
    ) -> Result<Compilation, StorageError>;

    /// Overwrite a compilation
    async fn update_compilation(&self, compilation: Compilation) -> Result<(), StorageError>;

    /// Find a compilation
    async fn compilation(&self, id: CompilationId) -> Result<Option<Compilation>, StorageError>;

    /// Compilations by id, optionally filtered on the pinned flag
    async fn compilations(
        &self,
        pinned: Option<bool>,
        page: Page,
    ) -> Result<Vec<Compilation>, StorageError>;

    /// Delete a compilation, returning whether it existed
    async fn delete_compilation(&self, id: CompilationId) -> Result<bool, StorageError>;

    // ----- comments -----

    /// Insert a comment
    async fn insert_comment(
        &self,
        author_id: UserId,
        event_id: EventId,
        message: String,
        created: DateTime<Utc>,
    ) -> Result<Comment, StorageError>;

    /// Overwrite a comment
    async fn update_comment(&self, comment: Comment) -> Result<(), StorageError>;

    /// Find a comment
    async fn comment(&self, id: CommentId) -> Result<Option<Comment>, StorageError>;

    /// Comments matching `query`, by id
    async fn comments(&self, query: &CommentQuery, page: Page) -> Result<Vec<Comment>, StorageError>;

    /// Delete a comment, returning whether it existed
    async fn delete_comment(&self, id: CommentId) -> Result<bool, StorageError>;
}
