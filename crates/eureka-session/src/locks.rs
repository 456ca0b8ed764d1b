//! Per-token mutual exclusion for the load/mutate/save cycle.
//!
//! Requests for different tokens proceed in parallel; requests for the same
//! token queue on an async mutex owned by that token.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use eureka_core::types::SessionToken;
use tokio::sync::OwnedMutexGuard;

use crate::error::SessionError;

/// Held for the duration of one orchestration cycle.
pub struct SessionGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Registry of per-token async locks.
#[derive(Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<SessionToken, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `token`.
    pub async fn acquire(&self, token: &SessionToken) -> Result<SessionGuard, SessionError> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|e| SessionError::LockPoisoned(e.to_string()))?;
            Arc::clone(locks.entry(token.clone()).or_default())
        };
        let guard = lock.lock_owned().await;
        Ok(SessionGuard { _guard: guard })
    }

    /// Drop registry entries nobody holds or waits on.
    ///
    /// Returns the number of entries removed.
    pub fn prune(&self) -> usize {
        let mut locks = match self.locks.lock() {
            Ok(l) => l,
            Err(e) => {
                tracing::error!("Session lock registry poisoned: {}", e);
                return 0;
            }
        };
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }

    /// Number of tokens currently tracked.
    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
