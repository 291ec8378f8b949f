//! Curated event compilations.

use super::AppContext;
use crate::aggregates::rules::COMPILATION_TITLE;
use crate::dto::{CompilationView, NewCompilation, UpdateCompilation};
use crate::error::EwmError;
use crate::types::{Compilation, CompilationId, EventId, Page};
use std::sync::Arc;

/// Compilation operations
pub struct CompilationService {
    ctx: Arc<AppContext>,
}

impl CompilationService {
    /// Create the service
    #[must_use]
    pub const fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Create a compilation; unknown event ids are dropped
    ///
    /// # Errors
    ///
    /// Validation for a bad title.
    pub async fn create_compilation(&self, new: NewCompilation) -> Result<CompilationView, EwmError> {
        COMPILATION_TITLE.check(&new.title)?;
        let event_ids = self.known_events(&new.events).await?;

        let compilation = self
            .ctx
            .storage
            .insert_compilation(new.title, new.pinned.unwrap_or(false), event_ids)
            .await?;
        tracing::info!(compilation_id = %compilation.id, events = compilation.event_ids.len(), "Compilation created");
        self.render(&compilation).await
    }

    /// Partially update a compilation
    ///
    /// # Errors
    ///
    /// NotFound for an unknown compilation, Validation for a bad title.
    pub async fn update_compilation(
        &self,
        compilation_id: CompilationId,
        update: UpdateCompilation,
    ) -> Result<CompilationView, EwmError> {
        COMPILATION_TITLE.check_present(update.title.as_deref())?;
        let mut compilation = self.ctx.resolver.compilation(compilation_id).await?;

        if let Some(title) = update.title {
            compilation.title = title;
        }
        if let Some(pinned) = update.pinned {
            compilation.pinned = pinned;
        }
        if let Some(events) = update.events {
            compilation.event_ids = self.known_events(&events).await?;
        }

        self.ctx.storage.update_compilation(compilation.clone()).await?;
        tracing::info!(%compilation_id, "Compilation updated");
        self.render(&compilation).await
    }

    /// Remove a compilation
    ///
    /// # Errors
    ///
    /// NotFound for an unknown compilation.
    pub async fn delete_compilation(&self, compilation_id: CompilationId) -> Result<(), EwmError> {
        if !self.ctx.storage.delete_compilation(compilation_id).await? {
            return Err(EwmError::not_found("Compilation", compilation_id.value()));
        }
        tracing::info!(%compilation_id, "Compilation deleted");
        Ok(())
    }

    /// Compilations, optionally only pinned or unpinned ones
    ///
    /// # Errors
    ///
    /// NotFound when a referenced category or user vanished.
    pub async fn compilations(
        &self,
        pinned: Option<bool>,
        page: Page,
    ) -> Result<Vec<CompilationView>, EwmError> {
        let compilations = self.ctx.storage.compilations(pinned, page).await?;
        let mut views = Vec::with_capacity(compilations.len());
        for compilation in &compilations {
            views.push(self.render(compilation).await?);
        }
        Ok(views)
    }

    /// One compilation
    ///
    /// # Errors
    ///
    /// NotFound for an unknown compilation.
    pub async fn compilation(&self, compilation_id: CompilationId) -> Result<CompilationView, EwmError> {
        let compilation = self.ctx.resolver.compilation(compilation_id).await?;
        self.render(&compilation).await
    }

    async fn known_events(&self, ids: &[EventId]) -> Result<Vec<EventId>, EwmError> {
        let mut known = Vec::with_capacity(ids.len());
        for event in self.ctx.storage.events_by_ids(ids).await? {
            if !known.contains(&event.id) {
                known.push(event.id);
            }
        }
        Ok(known)
    }

    async fn render(&self, compilation: &Compilation) -> Result<CompilationView, EwmError> {
        let events = self.ctx.storage.events_by_ids(&compilation.event_ids).await?;
        let events = self.ctx.short_views(&events).await?;
        Ok(CompilationView::new(compilation, events))
    }
}
