//! Failure kinds surfaced by every operation.
//!
//! Business rules fail with [`EwmError::NotFound`], [`EwmError::Conflict`] or
//! [`EwmError::Validation`]. Infrastructure errors from storage or the stats
//! service are converted into [`EwmError::Storage`] at the boundary.

use crate::dto::date_format;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by the application services
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EwmError {
    /// Referenced entity does not exist
    #[error("{entity} with id={id} was not found")]
    NotFound {
        /// Entity kind ("Event", "User", ...)
        entity: &'static str,
        /// Missing identifier
        id: i64,
    },

    /// Business rule violation
    #[error("{0}")]
    Conflict(String),

    /// Malformed or logically invalid input
    #[error("{0}")]
    Validation(String),

    /// Persistence or collaborator failure
    #[error("Storage error: {0}")]
    Storage(String),
}

impl EwmError {
    /// Shorthand for [`EwmError::NotFound`]
    #[must_use]
    pub const fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Shorthand for [`EwmError::Conflict`]
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Shorthand for [`EwmError::Validation`]
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// HTTP-style status code for this failure kind
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Conflict(_) => 409,
            Self::Validation(_) => 400,
            Self::Storage(_) => 500,
        }
    }

    /// Status name reported in [`ApiError::status`]
    #[must_use]
    pub const fn status_name(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Validation(_) => "BAD_REQUEST",
            Self::Storage(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Short reason phrase for this failure kind
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "The required object was not found.",
            Self::Conflict(_) => "For the requested operation the conditions are not met.",
            Self::Validation(_) => "Incorrectly made request.",
            Self::Storage(_) => "Internal server error.",
        }
    }
}

/// Error body handed to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Status name (`NOT_FOUND`, `CONFLICT`, ...)
    pub status: String,
    /// Short reason phrase
    pub reason: String,
    /// Detailed message
    pub message: String,
    /// When the error was produced
    #[serde(with = "date_format")]
    pub timestamp: DateTime<Utc>,
}

impl ApiError {
    /// Build the error body for `error` at `timestamp`
    #[must_use]
    pub fn new(error: &EwmError, timestamp: DateTime<Utc>) -> Self {
        Self {
            status: error.status_name().to_string(),
            reason: error.reason().to_string(),
            message: error.to_string(),
            timestamp,
        }
    }
}
