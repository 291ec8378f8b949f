//! Business metrics for the event admission service.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `ewm_events_total{transition}` - Event lifecycle transitions (created, published, rejected, canceled, sent_to_review, edited)
//! - `ewm_requests_total{status}` - Participation requests by resulting status
//! - `ewm_batch_resolutions_total` - Batch decisions applied by initiators
//! - `ewm_views_refresh_failures_total` - Public reads served with cached views
//!
//! Recording without an installed recorder is a no-op.

use crate::types::RequestStatus;
use metrics::describe_counter;

/// Initialize and register all business metrics descriptions.
///
/// Call once at startup, before any metrics are recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "ewm_events_total",
        "Total number of event lifecycle transitions by kind"
    );
    describe_counter!(
        "ewm_requests_total",
        "Total number of participation requests by resulting status"
    );
    describe_counter!(
        "ewm_batch_resolutions_total",
        "Total number of batch request decisions applied"
    );
    describe_counter!(
        "ewm_views_refresh_failures_total",
        "Total number of public reads that fell back to cached views"
    );

    tracing::info!("Business metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record an event lifecycle transition.
pub fn record_event_transition(transition: &'static str) {
    metrics::counter!("ewm_events_total", "transition" => transition).increment(1);
    tracing::debug!(transition, "Recorded event transition metric");
}

/// Record requests reaching `status`.
pub fn record_requests(status: RequestStatus, count: usize) {
    if count == 0 {
        return;
    }
    metrics::counter!("ewm_requests_total", "status" => status.as_str())
        .increment(u64::try_from(count).unwrap_or(u64::MAX));
}

/// Record an applied batch decision.
pub fn record_batch_resolution(confirmed: usize, rejected: usize) {
    metrics::counter!("ewm_batch_resolutions_total").increment(1);
    record_requests(RequestStatus::Confirmed, confirmed);
    record_requests(RequestStatus::Rejected, rejected);
    tracing::debug!(confirmed, rejected, "Recorded batch resolution metric");
}

/// Record a public read that could not refresh views.
pub fn record_views_refresh_failure() {
    metrics::counter!("ewm_views_refresh_failures_total").increment(1);
}
