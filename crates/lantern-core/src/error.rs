use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lifecycle::StoreLifecycleState;

/// Broad error category used for user-facing handling and retry decisions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StoreErrorCategory {
    /// Invalid input, unknown room, or other configuration issue.
    Config,
    /// Transient network or transport failure reported by the client.
    Network,
    /// Rate-limited by the homeserver.
    RateLimited,
    /// Host platform failure (location source, storage).
    Platform,
    /// Internal store bug or invariant break.
    Internal,
}

/// Stable store error payload surfaced to callers of the query facade.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct StoreError {
    /// High-level error category.
    pub category: StoreErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl StoreError {
    /// Construct a new store error.
    pub fn new(
        category: StoreErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Build a standard invalid-lifecycle-transition error.
    pub fn invalid_lifecycle(current: StoreLifecycleState, action: impl Into<String>) -> Self {
        let action = action.into();
        Self::new(
            StoreErrorCategory::Internal,
            "invalid_lifecycle_transition",
            format!("cannot run '{action}' while store is in state {current:?}"),
        )
    }
}

/// Map HTTP status codes from the client collaborator to error categories.
pub fn classify_http_status(status: u16) -> StoreErrorCategory {
    match status {
        408 | 429 => StoreErrorCategory::RateLimited,
        400..=499 => StoreErrorCategory::Config,
        500..=599 => StoreErrorCategory::Network,
        _ => StoreErrorCategory::Internal,
    }
}
