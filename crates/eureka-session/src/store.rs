//! In-memory session store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Duration;
use eureka_core::types::{SessionContext, SessionToken, Timestamp};

use crate::error::SessionError;
use crate::SessionStore;

/// Session store backed by a `HashMap` behind a `RwLock`.
///
/// Sessions idle for longer than `ttl` are invisible to `load` even before
/// `evict_expired` physically removes them.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionToken, SessionContext>>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Build a store from a TTL expressed in minutes.
    pub fn with_ttl_minutes(minutes: u32) -> Self {
        Self::new(Duration::minutes(i64::from(minutes)))
    }

    /// Number of stored sessions, expired or not.
    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::with_ttl_minutes(30)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, token: &SessionToken) -> Result<SessionContext, SessionError> {
        let now = Timestamp::now();
        let sessions = self
            .sessions
            .read()
            .map_err(|e| SessionError::LockPoisoned(e.to_string()))?;

        match sessions.get(token) {
            Some(ctx) if !ctx.last_activity_at.is_older_than(self.ttl, now) => Ok(ctx.clone()),
            Some(_) => {
                tracing::debug!(token = %token, "Stored session expired, starting fresh");
                Ok(SessionContext::new(token.clone(), now))
            }
            None => Ok(SessionContext::new(token.clone(), now)),
        }
    }

    async fn save(&self, token: &SessionToken, context: SessionContext) -> Result<(), SessionError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| SessionError::LockPoisoned(e.to_string()))?;
        sessions.insert(token.clone(), context);
        Ok(())
    }

    async fn evict_expired(&self, now: Timestamp, ttl: Duration) -> Result<usize, SessionError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| SessionError::LockPoisoned(e.to_string()))?;
        let before = sessions.len();
        sessions.retain(|_, ctx| !ctx.last_activity_at.is_older_than(ttl, now));
        Ok(before - sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eureka_core::types::{ActiveTask, HistoryEntry};

    fn token(s: &str) -> SessionToken {
        SessionToken::new(s)
    }

    // ---- load ----

    #[tokio::test]
    async fn test_load_unknown_token_is_fresh() {
        let store = InMemorySessionStore::default();
        let ctx = store.load(&token("a")).await.unwrap();
        assert_eq!(ctx.token, token("a"));
        assert_eq!(ctx.active_task(), ActiveTask::None);
        assert!(ctx.history.is_empty());
        // load does not insert
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = InMemorySessionStore::default();
        let mut ctx = store.load(&token("a")).await.unwrap();
        ctx.push_history(HistoryEntry::user("hello"), 10);
        store.save(&token("a"), ctx.clone()).await.unwrap();

        let loaded = store.load(&token("a")).await.unwrap();
        assert_eq!(loaded, ctx);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_save_is_idempotent_overwrite() {
        let store = InMemorySessionStore::default();
        let ctx = store.load(&token("a")).await.unwrap();
        store.save(&token("a"), ctx.clone()).await.unwrap();
        store.save(&token("a"), ctx.clone()).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.load(&token("a")).await.unwrap(), ctx);
    }

    #[tokio::test]
    async fn test_load_expired_session_is_fresh() {
        let store = InMemorySessionStore::with_ttl_minutes(30);
        let mut ctx = SessionContext::new(token("a"), Timestamp::now());
        ctx.push_history(HistoryEntry::user("old"), 10);
        ctx.last_activity_at = Timestamp(Timestamp::now().0 - 31 * 60);
        store.save(&token("a"), ctx).await.unwrap();

        let loaded = store.load(&token("a")).await.unwrap();
        assert!(loaded.history.is_empty());
    }

    // ---- evict_expired ----

    #[tokio::test]
    async fn test_evict_expired_removes_only_stale() {
        let store = InMemorySessionStore::default();
        let now = Timestamp(10_000);
        let ttl = Duration::seconds(100);

        let mut stale = SessionContext::new(token("stale"), Timestamp(9_000));
        stale.touch(Timestamp(9_000));
        let fresh = SessionContext::new(token("fresh"), Timestamp(9_950));
        let boundary = SessionContext::new(token("boundary"), Timestamp(9_900));

        store.save(&token("stale"), stale).await.unwrap();
        store.save(&token("fresh"), fresh).await.unwrap();
        store.save(&token("boundary"), boundary).await.unwrap();

        let removed = store.evict_expired(now, ttl).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_evict_on_empty_store() {
        let store = InMemorySessionStore::default();
        let removed = store
            .evict_expired(Timestamp::now(), Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn test_save_after_eviction_recreates_entry() {
        let store = InMemorySessionStore::default();
        let ctx = SessionContext::new(token("a"), Timestamp(0));
        store.save(&token("a"), ctx.clone()).await.unwrap();
        store
            .evict_expired(Timestamp(10_000), Duration::seconds(1))
            .await
            .unwrap();
        assert!(store.is_empty());

        // An in-flight request saving after eviction simply recreates the entry.
        store.save(&token("a"), ctx).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    // ---- Concurrency ----

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_distinct_tokens() {
        use std::sync::Arc;

        let store = Arc::new(InMemorySessionStore::default());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let t = token(&format!("t{}", i));
                let ctx = store.load(&t).await.unwrap();
                store.save(&t, ctx).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.len(), 16);
    }
}
