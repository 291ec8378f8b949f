//! Explore With Me - event lifecycle and participation request admission
//!
//! Organizers publish events with a participant limit; other users ask to
//! take part. The service must never confirm more participants than an
//! event's limit, even when the initiator resolves requests in batches and
//! several callers act on the same event at once.
//!
//! # Architecture
//!
//! ```text
//!   caller ──► app services (shell) ──► EntityResolver ──► Storage
//!                    │
//!                    │ KeyedLocks<EventId>: one unit of work per event
//!                    ▼
//!   ┌────────────────────────┐   ┌────────────────────────┐
//!   │   LifecycleReducer     │   │   AdmissionReducer     │
//!   │ PENDING → PUBLISHED    │   │ PENDING → CONFIRMED    │
//!   │         → CANCELED     │   │         → REJECTED     │
//!   │ field edits            │   │         → CANCELED     │
//!   └────────────────────────┘   └────────────────────────┘
//!                    │ Effect::Future
//!                    ▼
//!           Storage::commit(ChangeSet)   (all or nothing)
//! ```
//!
//! # Key Invariants
//!
//! For every event, at all times:
//!
//! ```text
//! confirmed_requests == count(requests where status == CONFIRMED)
//! participant_limit == 0 || confirmed_requests <= participant_limit
//! ```
//!
//! Both hold because every admission decision runs inside the event's lock,
//! recomputes the confirmed count from the requests it loaded, and commits the
//! event together with the touched requests.
//!
//! # Usage
//!
//! ```no_run
//! use ewm_service::{Config, EwmApp};
//!
//! let app = EwmApp::in_memory(Config::default());
//! # drop(app);
//! ```
//!
//! See the [aggregates] module for the reducers and their tests.

#![forbid(unsafe_code)]

pub mod aggregates;
pub mod app;
pub mod config;
pub mod dto;
pub mod error;
pub mod metrics;
pub mod stats;
pub mod storage;
pub mod types;

pub use app::EwmApp;
pub use config::Config;
pub use error::{ApiError, EwmError};
pub use stats::{InMemoryStats, StatsClient};
pub use storage::{InMemoryStorage, Storage};
