//! Session persistence behind a narrow trait.
//!
//! Conversations live in a TTL keyed-value store: one [`Session`] per
//! customer, refreshed on every turn and dropped after the idle window.
//! The in-memory backend is the default deployment and the test harness;
//! a Redis-backed impl can slot in behind the same trait.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sofra_core::{CustomerId, Session};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session store backend failure: {0}")]
    Backend(String),
}

/// Keyed by customer id, last write wins. A `get` after the TTL elapses
/// behaves exactly like a missing key, so callers never see a stale
/// conversation.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, customer_id: &CustomerId) -> Result<Option<Session>, SessionStoreError>;

    /// Stores the session and restarts its idle clock.
    async fn put(&self, session: Session, ttl: Duration) -> Result<(), SessionStoreError>;

    async fn delete(&self, customer_id: &CustomerId) -> Result<(), SessionStoreError>;
}

/// Process-local store. Expiry is lazy: reads treat a past-deadline entry
/// as absent, and each write sweeps whatever already lapsed so an idle
/// process does not hoard dead sessions.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, (Session, Instant)>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, customer_id: &CustomerId) -> Result<Option<Session>, SessionStoreError> {
        let now = Instant::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(customer_id.as_str()) {
                Some((session, deadline)) if *deadline > now => return Ok(Some(session.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired: upgrade to a write lock and re-check, another turn may
        // have refreshed the entry in between.
        let mut sessions = self.sessions.write().await;
        if let Some((_, deadline)) = sessions.get(customer_id.as_str()) {
            if *deadline <= now {
                sessions.remove(customer_id.as_str());
            }
        }
        Ok(None)
    }

    async fn put(&self, session: Session, ttl: Duration) -> Result<(), SessionStoreError> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, (_, deadline)| *deadline > now);
        sessions.insert(session.customer_id.as_str().to_string(), (session, now + ttl));
        Ok(())
    }

    async fn delete(&self, customer_id: &CustomerId) -> Result<(), SessionStoreError> {
        self.sessions.write().await.remove(customer_id.as_str());
        Ok(())
    }
}
