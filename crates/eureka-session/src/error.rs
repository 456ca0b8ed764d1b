//! Error types for the session store.

use eureka_core::error::EurekaError;

/// Errors from a session backend.
///
/// Any of these means the store itself is unusable; callers treat them as
/// fatal for the request.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    #[error("session lock poisoned: {0}")]
    LockPoisoned(String),
}

impl From<SessionError> for EurekaError {
    fn from(err: SessionError) -> Self {
        EurekaError::Session(err.to_string())
    }
}
