//! Error types for the lifecycle engine
//!
//! Validation failures are not errors here: they come back from the engine
//! as a structured rejection. Everything in this module propagates to the
//! caller unchanged, except [`NotificationError`], which is only logged.

use super::status::Phase;

/// Failure raised by a persistence collaborator
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested row does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// The backing store failed
    #[error("store failure: {0:#}")]
    Backend(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Backend(err.into())
    }
}

/// Failure of a lifecycle operation
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Token is not part of the phase's vocabulary
    #[error("unknown {phase} status '{token}'")]
    UnknownStatus { phase: Phase, token: String },

    /// Submitted attributes or status belong to a different phase
    #[error("update for {expected} carried {found} data")]
    PhaseMismatch { expected: Phase, found: Phase },

    /// Project or phase record absent
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Underlying store failed; nothing is compensated
    #[error("persistence failure: {0:#}")]
    Persistence(anyhow::Error),
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::Backend(e) => Self::Persistence(e),
        }
    }
}

/// Failure to publish a change event
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// Nobody is listening on the channel
    #[error("no subscribers for event")]
    NoSubscribers,
}
