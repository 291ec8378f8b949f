//! Entity lookups that fail with `NotFound`.

use crate::error::EwmError;
use crate::storage::Storage;
use crate::types::{
    Category, CategoryId, Comment, CommentId, Compilation, CompilationId, Event, EventId, Request,
    RequestId, User, UserId,
};
use std::sync::Arc;

/// Resolves ids into entities, turning absence into [`EwmError::NotFound`]
#[derive(Clone)]
pub struct EntityResolver {
    storage: Arc<dyn Storage>,
}

impl EntityResolver {
    /// Create a resolver over `storage`
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// # Errors
    ///
    /// [`EwmError::NotFound`] when absent, [`EwmError::Storage`] on backend failure.
    pub async fn user(&self, id: UserId) -> Result<User, EwmError> {
        self.storage
            .user(id)
            .await?
            .ok_or(EwmError::not_found("User", id.value()))
    }

    /// # Errors
    ///
    /// [`EwmError::NotFound`] when absent, [`EwmError::Storage`] on backend failure.
    pub async fn category(&self, id: CategoryId) -> Result<Category, EwmError> {
        self.storage
            .category(id)
            .await?
            .ok_or(EwmError::not_found("Category", id.value()))
    }

    /// # Errors
    ///
    /// [`EwmError::NotFound`] when absent, [`EwmError::Storage`] on backend failure.
    pub async fn event(&self, id: EventId) -> Result<Event, EwmError> {
        self.storage
            .event(id)
            .await?
            .ok_or(EwmError::not_found("Event", id.value()))
    }

    /// # Errors
    ///
    /// [`EwmError::NotFound`] when absent, [`EwmError::Storage`] on backend failure.
    pub async fn request(&self, id: RequestId) -> Result<Request, EwmError> {
        self.storage
            .request(id)
            .await?
            .ok_or(EwmError::not_found("Request", id.value()))
    }

    /// # Errors
    ///
    /// [`EwmError::NotFound`] when absent, [`EwmError::Storage`] on backend failure.
    pub async fn compilation(&self, id: CompilationId) -> Result<Compilation, EwmError> {
        self.storage
            .compilation(id)
            .await?
            .ok_or(EwmError::not_found("Compilation", id.value()))
    }

    /// # Errors
    ///
    /// [`EwmError::NotFound`] when absent, [`EwmError::Storage`] on backend failure.
    pub async fn comment(&self, id: CommentId) -> Result<Comment, EwmError> {
        self.storage
            .comment(id)
            .await?
            .ok_or(EwmError::not_found("Comment", id.value()))
    }
}
