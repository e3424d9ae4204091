//! Errors surfaced by lifecycle operations.

use tally_core::{EntityKind, TransitionError};
use tally_storage::StorageError;

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Errors returned by the [`LifecycleController`](crate::LifecycleController).
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// A referenced id is absent from the store
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of record
        kind: EntityKind,
        /// Requested id
        id: String,
    },

    /// The entity's status does not allow the operation
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    /// The conditional update lost a race twice in a row
    #[error("{kind} {id} was modified concurrently")]
    StaleState {
        /// Kind of record
        kind: EntityKind,
        /// Record id
        id: String,
    },

    /// The entity has been archived and no longer changes
    #[error("{kind} {id} is archived")]
    Archived {
        /// Kind of record
        kind: EntityKind,
        /// Record id
        id: String,
    },

    /// A unique name is already taken
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// Malformed input
    #[error("invalid input: {0}")]
    Validation(String),

    /// Underlying storage failure
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl LifecycleError {
    pub(crate) fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn archived(kind: EntityKind, id: impl ToString) -> Self {
        Self::Archived {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<StorageError> for LifecycleError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { kind, id } => Self::NotFound { kind, id },
            StorageError::Stale { kind, id } => Self::StaleState { kind, id },
            StorageError::Conflict(msg) => Self::Duplicate(msg),
            other => Self::Storage(other),
        }
    }
}
