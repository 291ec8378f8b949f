//! Users, categories, compilations and comments.

#![allow(clippy::unwrap_used)]

mod common;

use chrono::Duration;
use common::Fixture;
use ewm_service::{
    dto::{NewCategory, NewComment, NewCompilation, NewUser, UpdateCompilation},
    types::{CategoryId, CommentId, CompilationId, DateRange, EventId, Page, UserId},
    EwmError,
};

fn page() -> Page {
    Page::new(0, 10).unwrap()
}

fn message(text: &str) -> NewComment {
    NewComment { message: text.into() }
}

const REVIEW: &str = "Great venue and a very clear speaker";

#[tokio::test]
async fn test_user_registration_rules() {
    let fx = Fixture::new();
    let ann = fx.user("Ann").await;

    let duplicate = fx
        .app
        .users
        .create_user(NewUser {
            name: "Another Ann".into(),
            email: "ann@example.com".into(),
        })
        .await;
    assert!(matches!(duplicate, Err(EwmError::Conflict(_))));

    let malformed = fx
        .app
        .users
        .create_user(NewUser {
            name: "Bob".into(),
            email: "bob.example.com".into(),
        })
        .await;
    assert!(matches!(malformed, Err(EwmError::Validation(_))));

    let blank = fx
        .app
        .users
        .create_user(NewUser {
            name: "  ".into(),
            email: "blank@example.com".into(),
        })
        .await;
    assert!(matches!(blank, Err(EwmError::Validation(_))));

    let listed = fx.app.users.users(Some(vec![ann, UserId::new(99)]), page()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].email, "ann@example.com");
}

#[tokio::test]
async fn test_user_deletion() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let idle = fx.user("Idle").await;
    fx.pending_event(owner, 0, true).await;

    assert!(matches!(fx.app.users.delete_user(owner).await, Err(EwmError::Conflict(_))));
    fx.app.users.delete_user(idle).await.unwrap();
    assert_eq!(
        fx.app.users.delete_user(idle).await,
        Err(EwmError::NotFound { entity: "User", id: idle.value() })
    );
    assert_eq!(fx.app.users.users(None, page()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_category_rules() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let concerts = fx.category("Concerts").await;
    let talks = fx.category("Talks").await;

    let duplicate = fx
        .app
        .categories
        .create_category(NewCategory { name: "Concerts".into() })
        .await;
    assert!(matches!(duplicate, Err(EwmError::Conflict(_))));

    let taken = fx
        .app
        .categories
        .update_category(talks, NewCategory { name: "Concerts".into() })
        .await;
    assert!(matches!(taken, Err(EwmError::Conflict(_))));

    let renamed = fx
        .app
        .categories
        .update_category(talks, NewCategory { name: "Lectures".into() })
        .await
        .unwrap();
    assert_eq!(renamed.name, "Lectures");
    assert_eq!(fx.app.categories.category(talks).await.unwrap().name, "Lectures");

    fx.app
        .events
        .create_event(owner, fx.new_event(concerts, 0, true))
        .await
        .unwrap();
    assert!(matches!(
        fx.app.categories.delete_category(concerts).await,
        Err(EwmError::Conflict(_))
    ));
    fx.app.categories.delete_category(talks).await.unwrap();
    assert!(matches!(
        fx.app.categories.category(CategoryId::new(404)).await,
        Err(EwmError::NotFound { .. })
    ));
    assert_eq!(fx.app.categories.categories(page()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_compilations() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let first = fx.published_event(owner, 0, true).await;
    let second = fx.published_event(owner, 0, true).await;

    let created = fx
        .app
        .compilations
        .create_compilation(NewCompilation {
            title: "Weekend picks".into(),
            pinned: None,
            events: vec![first, EventId::new(404), first],
        })
        .await
        .unwrap();
    assert!(!created.pinned);
    assert_eq!(created.events.iter().map(|e| e.id).collect::<Vec<_>>(), vec![first]);

    let updated = fx
        .app
        .compilations
        .update_compilation(
            created.id,
            UpdateCompilation {
                pinned: Some(true),
                events: Some(vec![second]),
                ..UpdateCompilation::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Weekend picks");
    assert!(updated.pinned);
    assert_eq!(updated.events.iter().map(|e| e.id).collect::<Vec<_>>(), vec![second]);

    fx.app
        .compilations
        .create_compilation(NewCompilation {
            title: "Archive".into(),
            pinned: Some(false),
            events: Vec::new(),
        })
        .await
        .unwrap();
    let pinned = fx.app.compilations.compilations(Some(true), page()).await.unwrap();
    assert_eq!(pinned.len(), 1);
    assert_eq!(fx.app.compilations.compilations(None, page()).await.unwrap().len(), 2);

    fx.app.compilations.delete_compilation(created.id).await.unwrap();
    assert!(matches!(
        fx.app.compilations.delete_compilation(created.id).await,
        Err(EwmError::NotFound { .. })
    ));
    assert!(matches!(
        fx.app.compilations.compilation(CompilationId::new(404)).await,
        Err(EwmError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_comment_authoring() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let author = fx.user("Author").await;
    let other = fx.user("Other").await;
    let event = fx.published_event(owner, 0, true).await;

    let short = fx.app.comments.create_comment(author, event, message("meh")).await;
    assert!(matches!(short, Err(EwmError::Validation(_))));

    let comment = fx
        .app
        .comments
        .create_comment(author, event, message(REVIEW))
        .await
        .unwrap();
    assert_eq!(comment.user.id, author);
    assert_eq!(comment.event.id, event);

    let foreign = fx
        .app
        .comments
        .update_comment(other, comment.id, message("Somebody else's opinion here"))
        .await;
    assert!(matches!(foreign, Err(EwmError::Conflict(_))));

    let blank = fx
        .app
        .comments
        .update_comment(author, comment.id, message("   "))
        .await
        .unwrap();
    assert_eq!(blank.message, REVIEW);

    let edited = fx
        .app
        .comments
        .update_comment(author, comment.id, message("Great venue, the speaker was a bit fast"))
        .await
        .unwrap();
    assert_eq!(edited.message, "Great venue, the speaker was a bit fast");

    assert!(matches!(
        fx.app.comments.delete_own_comment(other, comment.id).await,
        Err(EwmError::Conflict(_))
    ));
    fx.app.comments.delete_own_comment(author, comment.id).await.unwrap();
    assert!(matches!(
        fx.app.comments.delete_comment(comment.id).await,
        Err(EwmError::NotFound { .. })
    ));
    assert!(matches!(
        fx.app.comments.delete_comment(CommentId::new(404)).await,
        Err(EwmError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_comment_listings() {
    let fx = Fixture::new();
    let owner = fx.user("Owner").await;
    let author = fx.user("Author").await;
    let event = fx.published_event(owner, 0, true).await;
    let other_event = fx.published_event(owner, 0, true).await;
    fx.app.comments.create_comment(author, event, message(REVIEW)).await.unwrap();
    fx.app
        .comments
        .create_comment(owner, other_event, message("Thanks to everyone who came by"))
        .await
        .unwrap();

    let by_author = fx
        .app
        .comments
        .comments_of_user(author, DateRange::default(), page())
        .await
        .unwrap();
    assert_eq!(by_author.len(), 1);
    assert_eq!(by_author[0].user_name, "Author");
    assert_eq!(by_author[0].event_title, "Evening lecture");

    let on_event = fx
        .app
        .comments
        .comments_of_event(other_event, DateRange::default(), page())
        .await
        .unwrap();
    assert_eq!(on_event.len(), 1);
    assert_eq!(on_event[0].message, "Thanks to everyone who came by");

    let everything = fx.app.comments.comments(DateRange::default(), page()).await.unwrap();
    assert_eq!(everything.len(), 2);

    let future = DateRange {
        start: None,
        end: Some(fx.now + Duration::days(1)),
    };
    assert!(matches!(
        fx.app.comments.comments(future, page()).await,
        Err(EwmError::Validation(_))
    ));

    let before_any = DateRange {
        start: None,
        end: Some(fx.now - Duration::days(1)),
    };
    assert!(fx.app.comments.comments(before_any, page()).await.unwrap().is_empty());
}
