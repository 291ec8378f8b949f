//! Aggregate reducers for the event platform.
//!
//! - Event: publication state machine and field edits
//! - Admission: participation requests and the batch confirmation algorithm
//! - Rules: field constraints and the transition table shared with the services

pub mod admission;
pub mod event;
pub mod rules;

pub use admission::{AdmissionAction, AdmissionOutcome, AdmissionReducer, AdmissionState};
pub use event::{LifecycleAction, LifecycleReducer, LifecycleState};
