//! View statistics collaborator.
//!
//! Public event reads record a hit and then ask for the number of distinct
//! visitors of the event URI. Only the call contract matters here; the
//! counting itself belongs to the stats service.

use crate::types::Event;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors raised by a stats client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatsError {
    /// The stats service could not be reached
    #[error("Stats service unavailable: {0}")]
    Unavailable(String),
}

/// One recorded access
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitRecord {
    /// Application that served the request
    pub app: String,
    /// Requested URI
    pub uri: String,
    /// Caller IP
    pub ip: String,
    /// Access time
    #[serde(with = "crate::dto::date_format")]
    pub timestamp: DateTime<Utc>,
}

/// View count request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewsQuery {
    /// Lower bound
    pub start: DateTime<Utc>,
    /// Upper bound
    pub end: DateTime<Utc>,
    /// URIs to count, all when empty
    pub uris: Vec<String>,
    /// Count each IP once
    pub unique: bool,
}

impl ViewsQuery {
    /// All-time distinct visitors of one event up to `now`
    #[must_use]
    pub fn for_event(event: &Event, now: DateTime<Utc>) -> Self {
        Self {
            start: DateTime::<Utc>::UNIX_EPOCH,
            end: now,
            uris: vec![event.uri()],
            unique: true,
        }
    }
}

/// Aggregated hits of one URI
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewStats {
    /// Application name
    pub app: String,
    /// URI
    pub uri: String,
    /// Hit count
    pub hits: u64,
}

/// Client of the stats service
#[async_trait]
pub trait StatsClient: Send + Sync {
    /// Record one access
    async fn record_hit(&self, hit: HitRecord) -> Result<(), StatsError>;

    /// Count hits per URI, most hit first
    async fn query_views(&self, query: ViewsQuery) -> Result<Vec<ViewStats>, StatsError>;
}

/// Stats kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryStats {
    hits: RwLock<Vec<HitRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryStats {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with [`StatsError::Unavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of hits recorded so far
    pub async fn hit_count(&self) -> usize {
        self.hits.read().await.len()
    }

    fn ensure_available(&self) -> Result<(), StatsError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StatsError::Unavailable("in-memory stats switched off".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl StatsClient for InMemoryStats {
    async fn record_hit(&self, hit: HitRecord) -> Result<(), StatsError> {
        self.ensure_available()?;
        self.hits.write().await.push(hit);
        Ok(())
    }

    async fn query_views(&self, query: ViewsQuery) -> Result<Vec<ViewStats>, StatsError> {
        self.ensure_available()?;
        let hits = self.hits.read().await;

        let mut grouped: BTreeMap<(&str, &str), Vec<&str>> = BTreeMap::new();
        for hit in hits.iter() {
            let in_range = hit.timestamp >= query.start && hit.timestamp <= query.end;
            let wanted = query.uris.is_empty() || query.uris.contains(&hit.uri);
            if in_range && wanted {
                grouped
                    .entry((hit.app.as_str(), hit.uri.as_str()))
                    .or_default()
                    .push(hit.ip.as_str());
            }
        }

        let mut stats: Vec<ViewStats> = grouped
            .into_iter()
            .map(|((app, uri), ips)| {
                let hits = if query.unique {
                    ips.iter().collect::<HashSet<_>>().len()
                } else {
                    ips.len()
                };
                ViewStats {
                    app: app.to_string(),
                    uri: uri.to_string(),
                    hits: u64::try_from(hits).unwrap_or(u64::MAX),
                }
            })
            .collect();
        stats.sort_by(|a, b| b.hits.cmp(&a.hits));
        Ok(stats)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{CategoryId, EventId, EventState, Location, UserId};

    fn hit(uri: &str, ip: &str) -> HitRecord {
        HitRecord {
            app: "ewm-service".into(),
            uri: uri.into(),
            ip: ip.into(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn unique_views_count_each_ip_once() {
        let stats = InMemoryStats::new();
        for ip in ["10.0.0.1", "10.0.0.1", "10.0.0.2"] {
            stats.record_hit(hit("/events/1", ip)).await.unwrap();
        }
        stats.record_hit(hit("/events/2", "10.0.0.3")).await.unwrap();

        let views = stats
            .query_views(ViewsQuery {
                start: DateTime::<Utc>::UNIX_EPOCH,
                end: Utc::now(),
                uris: vec!["/events/1".into()],
                unique: true,
            })
            .await
            .unwrap();

        assert_eq!(views.len(), 1);
        assert_eq!(views[0].hits, 2);
    }

    #[test]
    fn views_query_targets_event_uri() {
        let now = Utc::now();
        let event = Event {
            id: EventId::new(42),
            title: "Film club".into(),
            annotation: "Black and white classics every Thursday".into(),
            description: "A screening followed by a short discussion over tea".into(),
            category_id: CategoryId::new(1),
            location: Location { lat: 55.75, lon: 37.61 },
            event_date: now,
            created_on: now,
            published_on: Some(now),
            paid: false,
            participant_limit: 0,
            request_moderation: true,
            confirmed_requests: 0,
            views: 0,
            state: EventState::Published,
            initiator_id: UserId::new(1),
        };

        let query = ViewsQuery::for_event(&event, now);

        assert_eq!(query.uris, vec!["/events/42".to_string()]);
        assert_eq!(query.uris[0], event.uri());
        assert_eq!(query.start, DateTime::<Utc>::UNIX_EPOCH);
        assert!(query.unique);
    }

    #[tokio::test]
    async fn unavailable_stats_fail_calls() {
        let stats = InMemoryStats::new();
        stats.set_unavailable(true);

        assert!(stats.record_hit(hit("/events", "10.0.0.1")).await.is_err());
        assert_eq!(stats.hit_count().await, 0);
    }
}
