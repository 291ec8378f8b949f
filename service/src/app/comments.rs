//! Comments on events.

use super::AppContext;
use crate::aggregates::rules::COMMENT_MESSAGE;
use crate::dto::{CommentShort, CommentView, EventShort, NewComment};
use crate::error::EwmError;
use crate::storage::CommentQuery;
use crate::types::{Comment, CommentId, DateRange, EventId, Page, User, UserId};
use std::sync::Arc;

/// Comment operations
pub struct CommentService {
    ctx: Arc<AppContext>,
}

impl CommentService {
    /// Create the service
    #[must_use]
    pub const fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Comment on an event
    ///
    /// # Errors
    ///
    /// NotFound for unknown ids, Validation for a bad message.
    pub async fn create_comment(
        &self,
        user_id: UserId,
        event_id: EventId,
        new_comment: NewComment,
    ) -> Result<CommentView, EwmError> {
        COMMENT_MESSAGE.check(&new_comment.message)?;
        let author = self.ctx.resolver.user(user_id).await?;
        let event = self.ctx.resolver.event(event_id).await?;

        let comment = self
            .ctx
            .storage
            .insert_comment(user_id, event_id, new_comment.message, self.ctx.clock.now())
            .await?;
        tracing::info!(comment_id = %comment.id, %event_id, %user_id, "Comment created");

        let event = self.ctx.short_views(std::slice::from_ref(&event)).await?;
        render(&comment, &author, event)
    }

    /// Change the text of one's own comment; blank text keeps the old one
    ///
    /// # Errors
    ///
    /// NotFound for unknown ids, Conflict when the caller is not the author,
    /// Validation for a bad message.
    pub async fn update_comment(
        &self,
        user_id: UserId,
        comment_id: CommentId,
        update: NewComment,
    ) -> Result<CommentView, EwmError> {
        let mut comment = self.ctx.resolver.comment(comment_id).await?;
        let author = self.ctx.resolver.user(user_id).await?;
        ensure_author(&comment, user_id)?;

        if !update.message.trim().is_empty() {
            COMMENT_MESSAGE.check(&update.message)?;
            comment.message = update.message;
            self.ctx.storage.update_comment(comment.clone()).await?;
            tracing::info!(%comment_id, %user_id, "Comment updated");
        }

        let event = self.ctx.resolver.event(comment.event_id).await?;
        let event = self.ctx.short_views(std::slice::from_ref(&event)).await?;
        render(&comment, &author, event)
    }

    /// Delete one's own comment
    ///
    /// # Errors
    ///
    /// NotFound for unknown ids, Conflict when the caller is not the author.
    pub async fn delete_own_comment(&self, user_id: UserId, comment_id: CommentId) -> Result<(), EwmError> {
        let comment = self.ctx.resolver.comment(comment_id).await?;
        self.ctx.resolver.user(user_id).await?;
        ensure_author(&comment, user_id)?;
        self.delete(comment_id).await
    }

    /// Delete any comment
    ///
    /// # Errors
    ///
    /// NotFound for an unknown comment.
    pub async fn delete_comment(&self, comment_id: CommentId) -> Result<(), EwmError> {
        self.ctx.resolver.comment(comment_id).await?;
        self.delete(comment_id).await
    }

    /// Comments written by a user
    ///
    /// # Errors
    ///
    /// NotFound for an unknown user, Validation for a bad range.
    pub async fn comments_of_user(
        &self,
        user_id: UserId,
        range: DateRange,
        page: Page,
    ) -> Result<Vec<CommentShort>, EwmError> {
        self.ctx.resolver.user(user_id).await?;
        let query = CommentQuery {
            author: Some(user_id),
            created: range.ensure_past(self.ctx.clock.now())?,
            ..CommentQuery::default()
        };
        self.shorts(&query, page).await
    }

    /// Comments on an event
    ///
    /// # Errors
    ///
    /// NotFound for an unknown event, Validation for a bad range.
    pub async fn comments_of_event(
        &self,
        event_id: EventId,
        range: DateRange,
        page: Page,
    ) -> Result<Vec<CommentShort>, EwmError> {
        self.ctx.resolver.event(event_id).await?;
        let query = CommentQuery {
            event: Some(event_id),
            created: range.ensure_past(self.ctx.clock.now())?,
            ..CommentQuery::default()
        };
        self.shorts(&query, page).await
    }

    /// All comments, for administrators
    ///
    /// # Errors
    ///
    /// Validation for a bad range.
    pub async fn comments(&self, range: DateRange, page: Page) -> Result<Vec<CommentView>, EwmError> {
        let query = CommentQuery {
            created: range.ensure_past(self.ctx.clock.now())?,
            ..CommentQuery::default()
        };
        let comments = self.ctx.storage.comments(&query, page).await?;

        let mut views = Vec::with_capacity(comments.len());
        for comment in &comments {
            let author = self.ctx.resolver.user(comment.author_id).await?;
            let event = self.ctx.resolver.event(comment.event_id).await?;
            let event = self.ctx.short_views(std::slice::from_ref(&event)).await?;
            views.push(render(comment, &author, event)?);
        }
        Ok(views)
    }

    async fn shorts(&self, query: &CommentQuery, page: Page) -> Result<Vec<CommentShort>, EwmError> {
        let comments = self.ctx.storage.comments(query, page).await?;
        let mut shorts = Vec::with_capacity(comments.len());
        for comment in &comments {
            let author = self.ctx.resolver.user(comment.author_id).await?;
            let event = self.ctx.resolver.event(comment.event_id).await?;
            shorts.push(CommentShort::new(comment, &author, &event));
        }
        Ok(shorts)
    }

    async fn delete(&self, comment_id: CommentId) -> Result<(), EwmError> {
        if !self.ctx.storage.delete_comment(comment_id).await? {
            return Err(EwmError::not_found("Comment", comment_id.value()));
        }
        tracing::info!(%comment_id, "Comment deleted");
        Ok(())
    }
}

fn render(comment: &Comment, author: &User, mut events: Vec<EventShort>) -> Result<CommentView, EwmError> {
    let event = events
        .pop()
        .ok_or(EwmError::not_found("Event", comment.event_id.value()))?;
    Ok(CommentView::new(comment, author, event))
}

fn ensure_author(comment: &Comment, user_id: UserId) -> Result<(), EwmError> {
    if comment.author_id != user_id {
        return Err(EwmError::conflict(format!(
            "User {user_id} is not the author of comment {}",
            comment.id
        )));
    }
    Ok(())
}
