//! In-memory [`Storage`] used by tests and the demo binary.
//!
//! All tables sit behind one `RwLock`, so a [`ChangeSet`] commit is atomic
//! with respect to every other call.

use super::{ChangeSet, CommentQuery, EventQuery, Storage, StorageError};
use crate::types::{
    Category, CategoryId, Comment, CommentId, Compilation, CompilationId, Event, EventId,
    EventSort, Page, Request, RequestId, User, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Sequences {
    user: i64,
    category: i64,
    event: i64,
    request: i64,
    compilation: i64,
    comment: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    categories: BTreeMap<CategoryId, Category>,
    events: BTreeMap<EventId, Event>,
    requests: BTreeMap<RequestId, Request>,
    compilations: BTreeMap<CompilationId, Compilation>,
    comments: BTreeMap<CommentId, Comment>,
    sequences: Sequences,
}

/// Storage backed by ordered maps
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
}

impl InMemoryStorage {
    /// Create empty storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent commit fail with [`StorageError::Unavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("in-memory storage switched off".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn next_event_id(&self) -> Result<EventId, StorageError> {
        let mut tables = self.tables.write().await;
        Ok(EventId::new(next(&mut tables.sequences.event)))
    }

    async fn next_request_id(&self) -> Result<RequestId, StorageError> {
        let mut tables = self.tables.write().await;
        Ok(RequestId::new(next(&mut tables.sequences.request)))
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), StorageError> {
        self.ensure_available()?;
        let mut tables = self.tables.write().await;

        for request in &changes.requests {
            let event_known = tables.events.contains_key(&request.event_id)
                || changes.events.iter().any(|event| event.id == request.event_id);
            if !event_known {
                return Err(StorageError::Missing {
                    entity: "Event",
                    id: request.event_id.value(),
                });
            }
        }

        for event in &changes.events {
            if !tables.users.contains_key(&event.initiator_id) {
                return Err(StorageError::Missing {
                    entity: "User",
                    id: event.initiator_id.value(),
                });
            }
            if !tables.categories.contains_key(&event.category_id) {
                return Err(StorageError::Missing {
                    entity: "Category",
                    id: event.category_id.value(),
                });
            }
        }
        for request in &changes.requests {
            if !tables.users.contains_key(&request.requester_id) {
                return Err(StorageError::Missing {
                    entity: "User",
                    id: request.requester_id.value(),
                });
            }
        }

        let (events, requests) = (changes.events.len(), changes.requests.len());
        for event in changes.events {
            tables.events.insert(event.id, event);
        }
        for request in changes.requests {
            tables.requests.insert(request.id, request);
        }
        tracing::trace!(events, requests, "Change set committed");
        Ok(())
    }

    async fn update_views(&self, id: EventId, views: u64) -> Result<(), StorageError> {
        self.ensure_available()?;
        let mut tables = self.tables.write().await;
        let event = tables.events.get_mut(&id).ok_or(StorageError::Missing {
            entity: "Event",
            id: id.value(),
        })?;
        event.views = views;
        Ok(())
    }

    async fn event(&self, id: EventId) -> Result<Option<Event>, StorageError> {
        Ok(self.tables.read().await.events.get(&id).cloned())
    }

    async fn events(&self, query: &EventQuery, page: Page) -> Result<Vec<Event>, StorageError> {
        let tables = self.tables.read().await;
        let mut events: Vec<Event> = tables
            .events
            .values()
            .filter(|event| query.matches(event))
            .cloned()
            .collect();

        match query.sort {
            Some(EventSort::EventDate) => events.sort_by_key(|event| (event.event_date, event.id)),
            Some(EventSort::Views) => {
                events.sort_by(|a, b| b.views.cmp(&a.views).then(a.id.cmp(&b.id)));
            },
            None => {},
        }
        Ok(page.slice(events))
    }

    async fn events_by_ids(&self, ids: &[EventId]) -> Result<Vec<Event>, StorageError> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.events.get(id).cloned())
            .collect())
    }

    async fn request(&self, id: RequestId) -> Result<Option<Request>, StorageError> {
        Ok(self.tables.read().await.requests.get(&id).cloned())
    }

    async fn requests_of_event(&self, id: EventId) -> Result<Vec<Request>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .requests
            .values()
            .filter(|request| request.event_id == id)
            .cloned()
            .collect())
    }

    async fn requests_of_user(&self, id: UserId) -> Result<Vec<Request>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables
            .requests
            .values()
            .filter(|request| request.requester_id == id)
            .cloned()
            .collect())
    }

    async fn insert_user(&self, name: String, email: String) -> Result<User, StorageError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|user| user.email == email) {
            return Err(StorageError::UniqueViolation(format!(
                "User with email {email} already exists"
            )));
        }
        let user = User {
            id: UserId::new(next(&mut tables.sequences.user)),
            name,
            email,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn users(&self, ids: Option<&[UserId]>, page: Page) -> Result<Vec<User>, StorageError> {
        let tables = self.tables.read().await;
        let users = tables
            .users
            .values()
            .filter(|user| ids.is_none_or(|ids| ids.contains(&user.id)))
            .cloned();
        Ok(page.slice(users))
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, StorageError> {
        let mut tables = self.tables.write().await;
        let referenced = tables.events.values().any(|event| event.initiator_id == id)
            || tables.requests.values().any(|request| request.requester_id == id)
            || tables.comments.values().any(|comment| comment.author_id == id);
        if referenced {
            return Err(StorageError::StillReferenced(format!(
                "User {id} still has events, requests or comments"
            )));
        }
        Ok(tables.users.remove(&id).is_some())
    }

    async fn insert_category(&self, name: String) -> Result<Category, StorageError> {
        let mut tables = self.tables.write().await;
        if tables.categories.values().any(|category| category.name == name) {
            return Err(StorageError::UniqueViolation(format!(
                "Category with name {name} already exists"
            )));
        }
        let category = Category {
            id: CategoryId::new(next(&mut tables.sequences.category)),
            name,
        };
        tables.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn update_category(&self, category: Category) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        if !tables.categories.contains_key(&category.id) {
            return Err(StorageError::Missing {
                entity: "Category",
                id: category.id.value(),
            });
        }
        let taken = tables
            .categories
            .values()
            .any(|other| other.id != category.id && other.name == category.name);
        if taken {
            return Err(StorageError::UniqueViolation(format!(
                "Category with name {} already exists",
                category.name
            )));
        }
        tables.categories.insert(category.id, category);
        Ok(())
    }

    async fn category(&self, id: CategoryId) -> Result<Option<Category>, StorageError> {
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn categories(&self, page: Page) -> Result<Vec<Category>, StorageError> {
        let tables = self.tables.read().await;
        Ok(page.slice(tables.categories.values().cloned()))
    }

    async fn delete_category(&self, id: CategoryId) -> Result<bool, StorageError> {
        let mut tables = self.tables.write().await;
        if tables.events.values().any(|event| event.category_id == id) {
            return Err(StorageError::StillReferenced(format!("Category {id} is not empty")));
        }
        Ok(tables.categories.remove(&id).is_some())
    }

    async fn insert_compilation(
        &self,
        title: String,
        pinned: bool,
        event_ids: Vec<EventId>,
    ) -> Result<Compilation, StorageError> {
        let mut tables = self.tables.write().await;
        let compilation = Compilation {
            id: CompilationId::new(next(&mut tables.sequences.compilation)),
            title,
            pinned,
            event_ids,
        };
        tables.compilations.insert(compilation.id, compilation.clone());
        Ok(compilation)
    }

    async fn update_compilation(&self, compilation: Compilation) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        if !tables.compilations.contains_key(&compilation.id) {
            return Err(StorageError::Missing {
                entity: "Compilation",
                id: compilation.id.value(),
            });
        }
        tables.compilations.insert(compilation.id, compilation);
        Ok(())
    }

    async fn compilation(&self, id: CompilationId) -> Result<Option<Compilation>, StorageError> {
        Ok(self.tables.read().await.compilations.get(&id).cloned())
    }

    async fn compilations(
        &self,
        pinned: Option<bool>,
        page: Page,
    ) -> Result<Vec<Compilation>, StorageError> {
        let tables = self.tables.read().await;
        let compilations = tables
            .compilations
            .values()
            .filter(|compilation| pinned.is_none_or(|pinned| compilation.pinned == pinned))
            .cloned();
        Ok(page.slice(compilations))
    }

    async fn delete_compilation(&self, id: CompilationId) -> Result<bool, StorageError> {
        Ok(self.tables.write().await.compilations.remove(&id).is_some())
    }

    async fn insert_comment(
        &self,
        author_id: UserId,
        event_id: EventId,
        message: String,
        created: DateTime<Utc>,
    ) -> Result<Comment, StorageError> {
        let mut tables = self.tables.write().await;
        let comment = Comment {
            id: CommentId::new(next(&mut tables.sequences.comment)),
            author_id,
            event_id,
            message,
            created,
        };
        tables.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn update_comment(&self, comment: Comment) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        if !tables.comments.contains_key(&comment.id) {
            return Err(StorageError::Missing {
                entity: "Comment",
                id: comment.id.value(),
            });
        }
        tables.comments.insert(comment.id, comment);
        Ok(())
    }

    async fn comment(&self, id: CommentId) -> Result<Option<Comment>, StorageError> {
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn comments(&self, query: &CommentQuery, page: Page) -> Result<Vec<Comment>, StorageError> {
        let tables = self.tables.read().await;
        let comments = tables
            .comments
            .values()
            .filter(|comment| query.matches(comment))
            .cloned();
        Ok(page.slice(comments))
    }

    async fn delete_comment(&self, id: CommentId) -> Result<bool, StorageError> {
        Ok(self.tables.write().await.comments.remove(&id).is_some())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{EventState, Location, RequestStatus};
    use chrono::TimeZone;

    fn event(id: EventId) -> Event {
        let at = Utc.with_ymd_and_hms(2030, 1, 1, 10, 0, 0).unwrap();
        Event {
            id,
            title: "Concert".into(),
            annotation: "Annotation long enough".into(),
            description: "Description long enough".into(),
            category_id: CategoryId::new(1),
            location: Location { lat: 0.0, lon: 0.0 },
            event_date: at,
            created_on: at,
            published_on: None,
            paid: false,
            participant_limit: 0,
            request_moderation: true,
            confirmed_requests: 0,
            views: 0,
            state: EventState::Pending,
            initiator_id: UserId::new(1),
        }
    }

    #[tokio::test]
    async fn failed_commit_writes_nothing() {
        let storage = InMemoryStorage::new();
        let id = storage.next_event_id().await.unwrap();
        let orphan = Request {
            id: RequestId::new(1),
            event_id: EventId::new(99),
            requester_id: UserId::new(2),
            created: Utc::now(),
            status: RequestStatus::Pending,
        };

        let result = storage
            .commit(ChangeSet::new().with_event(event(id)).with_request(orphan))
            .await;

        assert!(matches!(result, Err(StorageError::Missing { entity: "Event", id: 99 })));
        assert!(storage.event(id).await.unwrap().is_none());
    }

    /// Storage holding user 1 and category 1, the references of [`event`]
    async fn seeded() -> InMemoryStorage {
        let storage = InMemoryStorage::new();
        storage.insert_user("Ann".into(), "ann@example.com".into()).await.unwrap();
        storage.insert_category("Concerts".into()).await.unwrap();
        storage
    }

    #[tokio::test]
    async fn views_update_touches_only_views() {
        let storage = seeded().await;
        let id = storage.next_event_id().await.unwrap();
        storage.commit(ChangeSet::new().with_event(event(id))).await.unwrap();

        storage.update_views(id, 42).await.unwrap();

        let stored = storage.event(id).await.unwrap().unwrap();
        assert_eq!(stored.views, 42);
        assert_eq!(stored.state, EventState::Pending);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_unique_violation() {
        let storage = InMemoryStorage::new();
        storage.insert_user("Ann".into(), "ann@example.com".into()).await.unwrap();

        let again = storage.insert_user("Ann".into(), "ann@example.com".into()).await;
        assert!(matches!(again, Err(StorageError::UniqueViolation(_))));
    }

    #[tokio::test]
    async fn referenced_records_are_not_deleted() {
        let storage = seeded().await;
        let id = storage.next_event_id().await.unwrap();
        storage.commit(ChangeSet::new().with_event(event(id))).await.unwrap();

        let user = storage.delete_user(UserId::new(1)).await;
        let category = storage.delete_category(CategoryId::new(1)).await;

        assert!(matches!(user, Err(StorageError::StillReferenced(_))));
        assert!(matches!(category, Err(StorageError::StillReferenced(_))));
        assert!(storage.user(UserId::new(1)).await.unwrap().is_some());
        assert!(storage.category(CategoryId::new(1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn commit_after_delete_leaves_no_orphan() {
        let storage = seeded().await;
        assert!(storage.delete_category(CategoryId::new(1)).await.unwrap());
        assert!(!storage.delete_category(CategoryId::new(1)).await.unwrap());

        let id = storage.next_event_id().await.unwrap();
        let result = storage.commit(ChangeSet::new().with_event(event(id))).await;

        assert!(matches!(result, Err(StorageError::Missing { entity: "Category", id: 1 })));
        assert!(storage.event(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn switched_off_storage_refuses_commits() {
        let storage = InMemoryStorage::new();
        storage.set_unavailable(true);
        let id = storage.next_event_id().await.unwrap();

        let result = storage.commit(ChangeSet::new().with_event(event(id))).await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
    }
}
