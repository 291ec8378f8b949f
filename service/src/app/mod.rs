//! Application services - the imperative shell around the reducers.
//!
//! Every mutating operation on an event follows the same steps:
//! 1. Resolve referenced entities (NotFound)
//! 2. Acquire the event's lock
//! 3. Load aggregate state from storage
//! 4. Dispatch the command and let the commit effect run
//! 5. Translate `last_error` / `last_outcome` into the result
//!
//! The CRUD glue (users, categories, compilations, comments) goes straight to
//! storage.

mod catalog;
mod comments;
mod compilations;
mod events;
mod requests;
mod resolver;

pub use catalog::{CategoryService, UserService};
pub use comments::CommentService;
pub use compilations::CompilationService;
pub use events::EventService;
pub use requests::RequestService;
pub use resolver::EntityResolver;

use crate::config::Config;
use crate::dto::{EventFull, EventShort};
use crate::error::EwmError;
use crate::stats::{InMemoryStats, StatsClient};
use crate::storage::{InMemoryStorage, Storage};
use crate::types::{Category, CategoryId, Event, EventId, User, UserId};
use ewm_core::environment::{Clock, SystemClock};
use ewm_runtime::KeyedLocks;
use std::collections::HashMap;
use std::sync::Arc;

/// Turn a reducer's recorded failure into a result
fn settle(last_error: Option<EwmError>) -> Result<(), EwmError> {
    last_error.map_or(Ok(()), Err)
}

/// Dependencies shared by every service
pub struct AppContext {
    /// Persistence
    pub storage: Arc<dyn Storage>,
    /// View statistics
    pub stats: Arc<dyn StatsClient>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// NotFound-raising lookups
    pub resolver: EntityResolver,
    /// Serializes all work on one event
    pub locks: KeyedLocks<EventId>,
    /// Configuration
    pub config: Config,
}

impl AppContext {
    /// Wire the context together
    #[must_use]
    pub fn new(
        config: Config,
        storage: Arc<dyn Storage>,
        stats: Arc<dyn StatsClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            resolver: EntityResolver::new(Arc::clone(&storage)),
            locks: KeyedLocks::with_prune_threshold(config.lock_prune_threshold),
            storage,
            stats,
            clock,
            config,
        }
    }

    /// Full view of one event
    ///
    /// # Errors
    ///
    /// [`EwmError::NotFound`] when the category or initiator vanished.
    pub async fn full_view(&self, event: &Event) -> Result<EventFull, EwmError> {
        let category = self.resolver.category(event.category_id).await?;
        let initiator = self.resolver.user(event.initiator_id).await?;
        Ok(EventFull::new(event, &category, &initiator))
    }

    /// Full views of several events, looking each category and user up once
    ///
    /// # Errors
    ///
    /// [`EwmError::NotFound`] when a category or initiator vanished.
    pub async fn full_views(&self, events: &[Event]) -> Result<Vec<EventFull>, EwmError> {
        let mut refs = References::default();
        let mut views = Vec::with_capacity(events.len());
        for event in events {
            let (category, initiator) = refs.load(self, event).await?;
            views.push(EventFull::new(event, &category, &initiator));
        }
        Ok(views)
    }

    /// Short views of several events, looking each category and user up once
    ///
    /// # Errors
    ///
    /// [`EwmError::NotFound`] when a category or initiator vanished.
    pub async fn short_views(&self, events: &[Event]) -> Result<Vec<EventShort>, EwmError> {
        let mut refs = References::default();
        let mut views = Vec::with_capacity(events.len());
        for event in events {
            let (category, initiator) = refs.load(self, event).await?;
            views.push(EventShort::new(event, &category, &initiator));
        }
        Ok(views)
    }
}

/// Categories and users already fetched while rendering a list
#[derive(Default)]
struct References {
    categories: HashMap<CategoryId, Category>,
    users: HashMap<UserId, User>,
}

impl References {
    async fn load(&mut self, ctx: &AppContext, event: &Event) -> Result<(Category, User), EwmError> {
        let category = match self.categories.get(&event.category_id) {
            Some(category) => category.clone(),
            None => {
                let category = ctx.resolver.category(event.category_id).await?;
                self.categories.insert(category.id, category.clone());
                category
            },
        };
        let user = match self.users.get(&event.initiator_id) {
            Some(user) => user.clone(),
            None => {
                let user = ctx.resolver.user(event.initiator_id).await?;
                self.users.insert(user.id, user.clone());
                user
            },
        };
        Ok((category, user))
    }
}

/// The whole application: one service per area
pub struct EwmApp {
    /// Shared dependencies
    pub context: Arc<AppContext>,
    /// Event lifecycle operations
    pub events: EventService,
    /// Participation request operations
    pub requests: RequestService,
    /// User administration
    pub users: UserService,
    /// Category administration
    pub categories: CategoryService,
    /// Compilations
    pub compilations: CompilationService,
    /// Comments
    pub comments: CommentService,
}

impl EwmApp {
    /// Build the application over the given collaborators
    #[must_use]
    pub fn new(
        config: Config,
        storage: Arc<dyn Storage>,
        stats: Arc<dyn StatsClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        tracing::info!(app = %config.app_name, "Initializing application services");
        let context = Arc::new(AppContext::new(config, storage, stats, clock));
        Self {
            events: EventService::new(Arc::clone(&context)),
            requests: RequestService::new(Arc::clone(&context)),
            users: UserService::new(Arc::clone(&context)),
            categories: CategoryService::new(Arc::clone(&context)),
            compilations: CompilationService::new(Arc::clone(&context)),
            comments: CommentService::new(Arc::clone(&context)),
            context,
        }
    }

    /// Application backed by in-memory storage and stats and the system clock
    #[must_use]
    pub fn in_memory(config: Config) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryStorage::new()),
            Arc::new(InMemoryStats::new()),
            Arc::new(SystemClock),
        )
    }
}
