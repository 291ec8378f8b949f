//! Per-key async locks.
//!
//! Capacity decisions for an event are only correct if no two units of work
//! read and write the same event concurrently. `KeyedLocks` hands out one
//! async mutex per key; holders of different keys never contend.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Default number of idle slots tolerated before the map is pruned
pub const DEFAULT_PRUNE_THRESHOLD: usize = 1024;

/// A map of lazily created async mutexes, one per key.
///
/// The guard returned by [`KeyedLocks::acquire`] owns its slot, so it can be
/// held across `.await` points and moved into spawned tasks.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    slots: Mutex<HashMap<K, Arc<Mutex<()>>>>,
    prune_threshold: usize,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    /// Create an empty lock map with the default prune threshold
    #[must_use]
    pub fn new() -> Self {
        Self::with_prune_threshold(DEFAULT_PRUNE_THRESHOLD)
    }

    /// Create an empty lock map that prunes idle slots once it holds more
    /// than `prune_threshold` entries
    #[must_use]
    pub fn with_prune_threshold(prune_threshold: usize) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            prune_threshold: prune_threshold.max(1),
        }
    }

    /// Wait for exclusive access to `key`.
    pub async fn acquire(&self, key: K) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().await;
            if slots.len() >= self.prune_threshold {
                // A slot referenced only by the map has no holder and no waiter.
                slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            }
            Arc::clone(
                slots
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };

        tracing::trace!(?key, "Waiting for keyed lock");
        slot.lock_owned().await
    }

    /// Number of slots currently tracked (held, awaited or idle)
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Whether no slot is tracked
    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }
}

impl<K> Default for KeyedLocks<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}
