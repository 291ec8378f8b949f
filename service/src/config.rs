//! Configuration management for the event admission service.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Application name reported with every recorded hit
    pub app_name: String,
    /// Idle per-event lock slots tolerated before pruning
    pub lock_prune_threshold: usize,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Unparsable values fall back to their defaults.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            app_name: lookup("EWM_APP_NAME").unwrap_or(defaults.app_name),
            lock_prune_threshold: lookup("EWM_LOCK_PRUNE_THRESHOLD")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.lock_prune_threshold),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "ewm-service".to_string(),
            lock_prune_threshold: ewm_runtime::locks::DEFAULT_PRUNE_THRESHOLD,
            log_level: "info".to_string(),
        }
    }
}
