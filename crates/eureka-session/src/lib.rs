//! Session persistence for the Eureka routing core.
//!
//! [`SessionStore`] is the contract any backend satisfies (in-memory map,
//! external cache, ...). [`SessionLocks`] serializes the per-token
//! load/mutate/save sequence independently of the backend.

pub mod error;
pub mod locks;
pub mod store;

use async_trait::async_trait;
use chrono::Duration;
use eureka_core::types::{SessionContext, SessionToken, Timestamp};

pub use error::SessionError;
pub use locks::{SessionGuard, SessionLocks};
pub use store::InMemorySessionStore;

/// Maps a session token to its context.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Return the stored context, or a fresh zero-valued one if `token` is
    /// unknown or expired.
    async fn load(&self, token: &SessionToken) -> Result<SessionContext, SessionError>;

    /// Overwrite the context stored under `token`.
    async fn save(&self, token: &SessionToken, context: SessionContext) -> Result<(), SessionError>;

    /// Remove every session idle for longer than `ttl` at `now`.
    ///
    /// Returns the number of sessions removed.
    async fn evict_expired(&self, now: Timestamp, ttl: Duration) -> Result<usize, SessionError>;
}
