//! Event admission demo
//!
//! Runs a short scenario against in-memory storage:
//! - An organizer creates an event with two places and an administrator publishes it
//! - Three users ask to take part
//! - The organizer confirms all three in one batch; the third is rejected
//! - A visitor reads the public event page
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=debug cargo run --bin demo
//! ```

use anyhow::Context;
use chrono::{Duration, Utc};
use ewm_service::{
    dto::{NewCategory, NewEvent, NewUser, ResolveRequests},
    metrics::register_business_metrics,
    types::{Location, Origin, RequestStatus},
    Config, EwmApp,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    register_business_metrics();

    println!("\n============================================");
    println!("   Event Admission - Live Demo");
    println!("============================================\n");

    let app = EwmApp::in_memory(config);

    // ========== Setup ==========

    let organizer = app
        .users
        .create_user(NewUser {
            name: "Olga Organizer".into(),
            email: "olga@example.com".into(),
        })
        .await?;
    let category = app
        .categories
        .create_category(NewCategory {
            name: "Concerts".into(),
        })
        .await?;

    let mut guests = Vec::new();
    for (name, email) in [
        ("Anna", "anna@example.com"),
        ("Boris", "boris@example.com"),
        ("Vera", "vera@example.com"),
    ] {
        guests.push(
            app.users
                .create_user(NewUser {
                    name: name.into(),
                    email: email.into(),
                })
                .await?,
        );
    }
    println!("1. Registered organizer {} and {} guests", organizer.id, guests.len());

    // ========== Event lifecycle ==========

    let event = app
        .events
        .create_event(
            organizer.id,
            NewEvent {
                title: "Chamber music evening".into(),
                annotation: "Strings and piano in the small hall".into(),
                description: "A quartet plays Haydn and Shostakovich, followed by a piano trio".into(),
                category: category.id,
                location: Location { lat: 55.76, lon: 37.62 },
                event_date: Utc::now() + Duration::days(14),
                paid: Some(true),
                participant_limit: Some(2),
                request_moderation: Some(true),
            },
        )
        .await?;
    println!("2. Created event {} in state {}", event.id, event.state);

    let event = app.events.publish(event.id).await?;
    println!("3. Published event {} at {:?}", event.id, event.published_on);

    match app.events.publish(event.id).await {
        Err(error) => println!("   Publishing again fails: {} ({})", error, error.status_name()),
        Ok(_) => println!("   Publishing again unexpectedly succeeded"),
    }

    // ========== Admission ==========

    let mut request_ids = Vec::new();
    for guest in &guests {
        let request = app.requests.create_request(guest.id, event.id).await?;
        println!("4. {} asked to join: request {} is {}", guest.name, request.id, request.status);
        request_ids.push(request.id);
    }

    let resolution = app
        .requests
        .resolve_requests(
            organizer.id,
            event.id,
            ResolveRequests {
                request_ids,
                status: RequestStatus::Confirmed,
            },
        )
        .await?;
    println!(
        "5. Batch resolved: {} confirmed, {} rejected",
        resolution.confirmed_requests.len(),
        resolution.rejected_requests.len()
    );

    // ========== Public read ==========

    let public = app
        .events
        .published_event(event.id, Origin::new(format!("/events/{}", event.id), "192.0.2.10"))
        .await?;
    println!(
        "6. Public page: {} confirmed of {}, {} views",
        public.confirmed_requests, public.participant_limit, public.views
    );

    let body = serde_json::to_string_pretty(&public).context("rendering event")?;
    println!("\n{body}\n");

    Ok(())
}
